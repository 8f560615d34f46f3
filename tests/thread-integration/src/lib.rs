//! Fixture builders shared by the thread integration tests.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use souk_common::message::{Message, MessageId};

/// Fixed reference instant so fixtures are reproducible.
pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T09:00:00Z")
        .expect("valid fixture timestamp")
        .with_timezone(&Utc)
}

/// `t0` plus `secs` seconds, formatted the way the CMS emits it.
pub fn at(secs: i64) -> String {
    (t0() + Duration::seconds(secs)).to_rfc3339()
}

/// Fluent builder over [`Message`] for readable fixtures.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// A confirmed message from the local user (sender 1) to `counterpart`.
    pub fn confirmed(id: i64, counterpart: u64) -> Self {
        Self {
            message: Message {
                id: Some(MessageId::Number(id)),
                document_id: Some(format!("msg{id:04}")),
                counterpart_id: Some(counterpart as f64),
                sender_id: Some(1),
                content: Some(format!("message {id}")),
                ..Default::default()
            },
        }
    }

    /// An optimistic placeholder carrying `token` as its correlation token.
    pub fn provisional(token: &str, counterpart: u64) -> Self {
        Self {
            message: Message {
                id: Some(MessageId::Text("NaN".into())),
                document_id: Some("temp".into()),
                counterpart_id: Some(counterpart as f64),
                sender_id: Some(1),
                correlation_token: Some(token.to_string()),
                content: Some(format!("draft {token}")),
                ..Default::default()
            },
        }
    }

    pub fn raw_counterpart(mut self, raw: f64) -> Self {
        self.message.counterpart_id = Some(raw);
        self
    }

    pub fn sender(mut self, sender: u64) -> Self {
        self.message.sender_id = Some(sender);
        self
    }

    /// Drop the correlation token, forcing time-window matching.
    pub fn without_token(mut self) -> Self {
        self.message.correlation_token = None;
        self
    }

    pub fn listing(mut self, listing: &str) -> Self {
        self.message.listing_document_id = Some(listing.to_string());
        self
    }

    pub fn at(mut self, secs: i64) -> Self {
        self.message.created_at = Some(at(secs));
        self
    }

    pub fn created_at(mut self, raw: &str) -> Self {
        self.message.created_at = Some(raw.to_string());
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.message.correlation_token = Some(token.to_string());
        self
    }

    pub fn content(mut self, content: &str) -> Self {
        self.message.content = Some(content.to_string());
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

/// A batch in the CMS wire shape, for tests that exercise deserialization.
pub fn wire_batch() -> serde_json::Value {
    json!([
        {
            "id": 101,
            "documentId": "abx91",
            "counterpartId": 12,
            "listingDocumentId": "venue-harbour-hall",
            "createdAt": at(0),
            "content": "Is the hall free on the 14th?",
            "sender": {"id": 1, "username": "organiser"}
        },
        {
            "id": "NaN",
            "documentId": "temp",
            "counterpartId": 12,
            "senderId": 1,
            "listingDocumentId": "venue-harbour-hall",
            "createdAt": at(30),
            "correlationToken": "c-1",
            "content": "We'd need it from 6pm"
        },
        {
            "id": 102,
            "documentId": "abx92",
            "counterpartId": -3,
            "createdAt": at(40)
        },
        {
            "id": 103,
            "documentId": "abx93",
            "counterpartId": 12,
            "listingDocumentId": "  ",
            "createdAt": at(60),
            "content": "General question about parking"
        }
    ])
}
