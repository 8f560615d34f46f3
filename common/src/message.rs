use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::identity::CounterpartId;
use crate::timestamp;

/// Identifier values that mark a locally created, not yet confirmed message.
pub const PROVISIONAL_MARKERS: [&str; 3] = ["temp", "0", "NaN"];

/// Server-assigned message id. The CMS emits numbers, but optimistic
/// placeholders and older payloads carry strings (or `NaN`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{n}"),
            MessageId::Float(n) => write!(f, "{n}"),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        MessageId::Number(n)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId::Text(s.to_string())
    }
}

/// A chat message between the local user and a counterpart.
///
/// Everything beyond the identity, routing and timing fields is opaque and
/// carried through untouched, including unknown keys (kept in `extra`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Raw counterpart identity as delivered; see [`Message::counterpart`].
    /// Numeric strings are accepted; any other non-null value decodes as NaN.
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub counterpart_id: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_sender",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Client nonce echoed back by the server on confirmation, when supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    /// Validated counterpart, or `None` if the message is unassignable.
    pub fn counterpart(&self) -> Option<CounterpartId> {
        self.counterpart_id.and_then(CounterpartId::from_raw)
    }

    /// Listing context with surrounding whitespace removed; blank means none.
    pub fn listing(&self) -> Option<&str> {
        self.listing_document_id
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// `createdAt` in epoch milliseconds, `0` when absent or malformed.
    pub fn created_at_millis(&self) -> i64 {
        timestamp::epoch_millis(self.created_at.as_deref())
    }

    /// Canonical identifier used for de-duplication of confirmed messages.
    ///
    /// Provisional messages have no durable identity and always yield `None`.
    pub fn identity(&self) -> Option<String> {
        if is_provisional(self) {
            return None;
        }
        self.document_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .or_else(|| self.id.as_ref().map(|id| id.to_string()))
    }
}

/// Whether a message is an optimistic placeholder awaiting server confirmation.
///
/// The `documentId` is checked, falling back to the string form of `id` when
/// the former is absent or blank. A message with neither is treated as confirmed.
pub fn is_provisional(message: &Message) -> bool {
    let document_id = message
        .document_id
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let marker = match (document_id, &message.id) {
        (Some(doc), _) => doc.to_string(),
        (None, Some(id)) => id.to_string().trim().to_string(),
        (None, None) => return false,
    };
    PROVISIONAL_MARKERS.contains(&marker.as_str())
}

// A single malformed field must not reject the whole batch it arrived in.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => Some(s.trim().parse().unwrap_or(f64::NAN)),
        Some(_) => Some(f64::NAN),
    })
}

fn lenient_sender<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
