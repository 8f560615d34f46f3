use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::CounterpartId;
use crate::message::Message;

/// Stable key grouping messages into one conversation.
///
/// `"{counterpart}-{listing}"` for listing-scoped conversations, `"{counterpart}"`
/// for general inquiries. The same counterpart under two listings yields two keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key of the message's conversation, or `None` if its counterpart is unassignable.
    pub fn for_message(message: &Message) -> Option<Self> {
        message
            .counterpart()
            .map(|counterpart| resolve_conversation_key(counterpart, message.listing()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the conversation key for a counterpart and optional listing.
///
/// The listing is trimmed first; a blank listing resolves the same as none.
pub fn resolve_conversation_key(
    counterpart: CounterpartId,
    listing_document_id: Option<&str>,
) -> ConversationKey {
    match listing_document_id.map(str::trim).filter(|l| !l.is_empty()) {
        Some(listing) => ConversationKey(format!("{counterpart}-{listing}")),
        None => ConversationKey(counterpart.to_string()),
    }
}
