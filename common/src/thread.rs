//! Thread assembly: folds batches of raw messages into ordered, de-duplicated
//! conversations and reconciles optimistic placeholders with their confirmations.
//!
//! Merge rules per message:
//! - unassignable counterpart: dropped and counted, never retained
//! - provisional: a re-delivery of a pending placeholder overwrites it; a
//!   placeholder that was already confirmed or failed is ignored; otherwise it
//!   is kept as a new pending entry, or claims an earlier unclaimed
//!   confirmation with a matching fingerprint
//! - confirmed: LWW over an existing entry with the same identity, otherwise
//!   replaces the oldest pending entry with a matching fingerprint, otherwise
//!   inserted
//!
//! Every touched conversation is re-sorted by `(createdAt, arrival)` after the
//! batch, and retired placeholders older than the retention are forgotten.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{FingerprintConfig, DEFAULT_RETIRED_RETENTION_MS};
use crate::conversation::{resolve_conversation_key, ConversationKey};
use crate::error::ConfigError;
use crate::fingerprint::{FieldFingerprinter, Fingerprint, Fingerprinter};
use crate::identity::CounterpartId;
use crate::listing::{compute_preferred_listings, PreferredListing};
use crate::message::{is_provisional, Message};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    message: Message,
    provisional: bool,
    identity: Option<String>,
    fingerprint: Fingerprint,
    /// Signature of the placeholder this entry is (pending) or replaced
    /// (confirmed). A confirmed entry with none can still absorb a late one.
    draft: Option<Fingerprint>,
    created_at: i64,
    /// Arrival sequence; tie-break for equal timestamps.
    seq: u64,
}

impl Entry {
    fn matches(&self, fingerprint: &Fingerprint, created_at: i64) -> bool {
        self.fingerprint.matches(self.created_at, fingerprint, created_at)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Conversation {
    counterpart: CounterpartId,
    listing: Option<String>,
    entries: Vec<Entry>,
    /// Signatures of placeholders that were confirmed or failed, with their `createdAt`.
    retired: BTreeMap<Fingerprint, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Inserted,
    Updated,
    Superseded,
    Ignored,
}

/// Exact identity of one optimistic send: its correlation token, or failing
/// that its sender, raw `createdAt` and content. Re-deliveries of the same
/// placeholder share it; two drafts sent close together do not.
fn draft_signature(message: &Message) -> Fingerprint {
    let token = message
        .correlation_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = token {
        return Fingerprint::from_parts([("token", token)]);
    }
    let sender = message.sender_id.map(|s| s.to_string()).unwrap_or_default();
    Fingerprint::from_parts([
        ("sender", sender.as_str()),
        ("created", message.created_at.as_deref().unwrap_or_default()),
        ("content", message.content.as_deref().unwrap_or_default()),
    ])
}

impl Conversation {
    fn new(counterpart: CounterpartId, listing: Option<String>) -> Self {
        Self {
            counterpart,
            listing,
            entries: Vec::new(),
            retired: BTreeMap::new(),
        }
    }

    fn absorb(&mut self, message: Message, fingerprint: Fingerprint, next_seq: &mut u64) -> Outcome {
        let created_at = message.created_at_millis();

        if is_provisional(&message) {
            let draft = draft_signature(&message);
            if self.retired.contains_key(&draft) {
                return Outcome::Ignored;
            }
            if let Some(pending) = self
                .entries
                .iter_mut()
                .find(|e| e.provisional && e.draft.as_ref() == Some(&draft))
            {
                pending.message = message;
                pending.fingerprint = fingerprint;
                pending.created_at = created_at;
                return Outcome::Updated;
            }
            // Confirmation overtook its own placeholder.
            if let Some(echo) = self
                .entries
                .iter_mut()
                .filter(|e| !e.provisional && e.draft.is_none() && e.matches(&fingerprint, created_at))
                .min_by_key(|e| e.seq)
            {
                echo.draft = Some(draft.clone());
                self.retired.insert(draft, created_at);
                return Outcome::Ignored;
            }
            self.entries.push(Entry {
                message,
                provisional: true,
                identity: None,
                fingerprint,
                draft: Some(draft),
                created_at,
                seq: take_seq(next_seq),
            });
            return Outcome::Inserted;
        }

        let identity = message.identity();
        let existing = match identity.as_deref() {
            Some(id) => self
                .entries
                .iter()
                .position(|e| e.identity.as_deref() == Some(id)),
            // No durable id at all: only an exact re-delivery counts as a duplicate.
            None => self
                .entries
                .iter()
                .position(|e| !e.provisional && e.identity.is_none() && e.message == message),
        };
        if let Some(idx) = existing {
            let entry = &mut self.entries[idx];
            entry.message = message;
            entry.fingerprint = fingerprint;
            entry.created_at = created_at;
            return Outcome::Updated;
        }

        if let Some(pending) = self
            .entries
            .iter_mut()
            .filter(|e| e.provisional && e.matches(&fingerprint, created_at))
            .min_by_key(|e| e.seq)
        {
            if let Some(draft) = pending.draft.clone() {
                self.retired.insert(draft, pending.created_at);
            }
            pending.message = message;
            pending.provisional = false;
            pending.identity = identity;
            pending.fingerprint = fingerprint;
            pending.created_at = created_at;
            return Outcome::Superseded;
        }

        self.entries.push(Entry {
            message,
            provisional: false,
            identity,
            fingerprint,
            draft: None,
            created_at,
            seq: take_seq(next_seq),
        });
        Outcome::Inserted
    }

    /// Drop the pending entry for `draft` and never accept it again.
    fn retire(&mut self, draft: Fingerprint, created_at: i64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.provisional && e.draft.as_ref() == Some(&draft)));
        self.retired.insert(draft, created_at);
        self.entries.len() != before
    }

    /// Forget retired placeholders created before `cutoff`.
    fn prune_retired(&mut self, cutoff: i64) {
        self.retired.retain(|_, created_at| *created_at >= cutoff);
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| (e.created_at, e.seq));
    }
}

fn take_seq(next_seq: &mut u64) -> u64 {
    let seq = *next_seq;
    *next_seq += 1;
    seq
}

/// Per-batch merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// New entries (confirmed or provisional).
    pub inserted: usize,
    /// Re-deliveries folded into an existing entry (last write wins).
    pub updated: usize,
    /// Provisional entries replaced by their confirmation.
    pub superseded: usize,
    /// Provisional messages whose confirmation or failure was already seen.
    pub ignored: usize,
    /// Messages with no assignable counterpart.
    pub dropped: usize,
}

impl MergeReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Superseded => self.superseded += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

/// A message as shown in a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadMessage {
    #[serde(flatten)]
    pub message: Message,
    pub provisional: bool,
}

/// Snapshot of one thread. Owned, so it stays valid across later merges.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub key: ConversationKey,
    pub counterpart: CounterpartId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_document_id: Option<String>,
    /// Most recently active listing for the counterpart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<PreferredListing>,
    pub messages: Vec<ThreadMessage>,
}

/// Running conversation state owned by a single writer.
///
/// Holds only what the engine needs for reconciliation; nothing is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxState {
    conversations: BTreeMap<ConversationKey, Conversation>,
    next_seq: u64,
    /// Newest `createdAt` merged so far; retention is measured back from it.
    newest: i64,
}

impl InboxState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations with at least one live message.
    pub fn len(&self) -> usize {
        self.live().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn conversation_keys(&self) -> Vec<ConversationKey> {
        self.live().map(|(key, _)| key.clone()).collect()
    }

    /// Ordered, de-duplicated messages and label for one conversation.
    pub fn thread(&self, key: &ConversationKey) -> Option<ThreadView> {
        let conversation = self.conversations.get(key).filter(|c| !c.entries.is_empty())?;
        let label = self.preferred_listing(conversation.counterpart);
        Some(view(key.clone(), conversation, label))
    }

    /// Every live conversation, in key order.
    pub fn threads(&self) -> Vec<ThreadView> {
        let preferred = self.preferred_listings();
        self.live()
            .map(|(key, c)| view(key.clone(), c, preferred.get(&c.counterpart).cloned()))
            .collect()
    }

    /// The displayed thread for a counterpart: all of its conversations folded
    /// together, labelled by the preferred listing.
    pub fn merged_thread(&self, counterpart: CounterpartId) -> Option<ThreadView> {
        let mut entries: Vec<&Entry> = self
            .conversations
            .values()
            .filter(|c| c.counterpart == counterpart)
            .flat_map(|c| c.entries.iter())
            .collect();
        if entries.is_empty() {
            return None;
        }
        entries.sort_by_key(|e| (e.created_at, e.seq));

        Some(ThreadView {
            key: resolve_conversation_key(counterpart, None),
            counterpart,
            listing_document_id: None,
            label: self.preferred_listing(counterpart),
            messages: entries.into_iter().map(thread_message).collect(),
        })
    }

    /// Preferred listing per counterpart over every retained message, in arrival order.
    pub fn preferred_listings(&self) -> BTreeMap<CounterpartId, PreferredListing> {
        let mut entries: Vec<&Entry> = self
            .conversations
            .values()
            .flat_map(|c| c.entries.iter())
            .collect();
        entries.sort_by_key(|e| e.seq);
        compute_preferred_listings(entries.into_iter().map(|e| &e.message), |m| m.counterpart_id)
    }

    /// Preferred listing for one counterpart, folding only its own messages.
    fn preferred_listing(&self, counterpart: CounterpartId) -> Option<PreferredListing> {
        let mut entries: Vec<&Entry> = self
            .conversations
            .values()
            .filter(|c| c.counterpart == counterpart)
            .flat_map(|c| c.entries.iter())
            .collect();
        entries.sort_by_key(|e| e.seq);
        compute_preferred_listings(entries.into_iter().map(|e| &e.message), |m| m.counterpart_id)
            .remove(&counterpart)
    }

    fn live(&self) -> impl Iterator<Item = (&ConversationKey, &Conversation)> {
        self.conversations.iter().filter(|(_, c)| !c.entries.is_empty())
    }

    fn absorb(
        &mut self,
        key: ConversationKey,
        counterpart: CounterpartId,
        message: Message,
        fingerprint: Fingerprint,
    ) -> Outcome {
        let listing = message.listing().map(str::to_string);
        self.newest = self.newest.max(message.created_at_millis());
        let conversation = self
            .conversations
            .entry(key)
            .or_insert_with(|| Conversation::new(counterpart, listing));
        conversation.absorb(message, fingerprint, &mut self.next_seq)
    }

    /// Forget retired placeholders older than `retention_ms` before the newest
    /// message, then drop conversations left with nothing to remember.
    fn prune(&mut self, retention_ms: i64) {
        let cutoff = self.newest.saturating_sub(retention_ms);
        self.conversations.retain(|_, c| {
            c.prune_retired(cutoff);
            !c.entries.is_empty() || !c.retired.is_empty()
        });
    }
}

fn thread_message(entry: &Entry) -> ThreadMessage {
    ThreadMessage {
        message: entry.message.clone(),
        provisional: entry.provisional,
    }
}

fn view(key: ConversationKey, conversation: &Conversation, label: Option<PreferredListing>) -> ThreadView {
    ThreadView {
        key,
        counterpart: conversation.counterpart,
        listing_document_id: conversation.listing.clone(),
        label,
        messages: conversation.entries.iter().map(thread_message).collect(),
    }
}

/// Merges message batches into an [`InboxState`].
///
/// Merges are not synchronized; callers serialize them per state.
#[derive(Debug, Clone)]
pub struct ThreadAssembler<F = FieldFingerprinter> {
    fingerprinter: F,
    retention_ms: i64,
}

impl ThreadAssembler {
    pub fn new(config: FingerprintConfig) -> Result<Self, ConfigError> {
        let retention_ms = config.retired_retention_ms;
        Ok(Self {
            fingerprinter: FieldFingerprinter::new(config)?,
            retention_ms,
        })
    }
}

impl Default for ThreadAssembler {
    fn default() -> Self {
        Self::with_fingerprinter(FieldFingerprinter::default())
    }
}

impl<F: Fingerprinter> ThreadAssembler<F> {
    pub fn with_fingerprinter(fingerprinter: F) -> Self {
        Self {
            fingerprinter,
            retention_ms: DEFAULT_RETIRED_RETENTION_MS,
        }
    }

    /// How long confirmed or failed placeholders are remembered, so that a
    /// replay within that span is still ignored.
    pub fn with_retention(mut self, retention_ms: i64) -> Result<Self, ConfigError> {
        if retention_ms <= 0 {
            return Err(ConfigError::InvalidRetention(retention_ms));
        }
        self.retention_ms = retention_ms;
        Ok(self)
    }

    /// Merge a batch and hand back the new state along with the counters.
    /// `report.dropped` is the number of unassignable messages.
    pub fn merge_batch<I>(&self, mut state: InboxState, batch: I) -> (InboxState, MergeReport)
    where
        I: IntoIterator<Item = Message>,
    {
        let report = self.merge_into(&mut state, batch);
        (state, report)
    }

    /// In-place form of [`ThreadAssembler::merge_batch`].
    pub fn merge_into<I>(&self, state: &mut InboxState, batch: I) -> MergeReport
    where
        I: IntoIterator<Item = Message>,
    {
        let mut report = MergeReport::default();
        let mut touched = BTreeSet::new();

        for message in batch {
            let Some(counterpart) = message.counterpart() else {
                debug!(
                    counterpart_id = ?message.counterpart_id,
                    document_id = ?message.document_id,
                    "dropping message with unassignable counterpart"
                );
                report.dropped += 1;
                continue;
            };
            let key = resolve_conversation_key(counterpart, message.listing());
            let fingerprint = self.fingerprinter.fingerprint(&message);
            let outcome = state.absorb(key.clone(), counterpart, message, fingerprint);
            if matches!(outcome, Outcome::Superseded | Outcome::Ignored) {
                trace!(%key, ?outcome, "reconciled provisional message");
            }
            report.record(outcome);
            touched.insert(key);
        }

        for key in &touched {
            if let Some(conversation) = state.conversations.get_mut(key) {
                conversation.sort();
            }
        }
        state.prune(self.retention_ms);

        debug!(
            conversations = touched.len(),
            inserted = report.inserted,
            updated = report.updated,
            superseded = report.superseded,
            ignored = report.ignored,
            dropped = report.dropped,
            "merged message batch"
        );
        report
    }

    /// Retire a provisional message after the transport reported a terminal
    /// send failure. Returns `true` if a pending entry was removed.
    pub fn report_failure(&self, state: &mut InboxState, message: &Message) -> bool {
        let Some(key) = ConversationKey::for_message(message) else {
            return false;
        };
        match state.conversations.get_mut(&key) {
            Some(conversation) => {
                conversation.retire(draft_signature(message), message.created_at_millis())
            }
            None => false,
        }
    }
}
