pub mod config;
pub mod conversation;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod listing;
pub mod message;
pub mod thread;
pub mod timestamp;

pub use conversation::{resolve_conversation_key, ConversationKey};
pub use listing::{compute_preferred_listings, PreferredListing};
pub use message::{is_provisional, Message};
pub use thread::{InboxState, MergeReport, ThreadAssembler, ThreadView};
