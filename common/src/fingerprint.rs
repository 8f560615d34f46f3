use std::fmt;

use sha2::{Digest, Sha256};

use crate::config::FingerprintConfig;
use crate::error::ConfigError;
use crate::message::Message;

/// Digest matching an optimistic message to its server-confirmed counterpart.
///
/// An exact fingerprint matches whenever the digests agree. A windowed one
/// (see [`Fingerprint::within`]) also requires the two messages' `createdAt`
/// values to be at most the window apart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint {
    digest: String,
    window_ms: Option<i64>,
}

impl Fingerprint {
    /// Hash labelled parts into an exact fingerprint. Each part is
    /// length-prefixed so adjacent values can never run together.
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut hasher = Sha256::new();
        for (label, value) in parts {
            hasher.update(label.as_bytes());
            hasher.update(b"=");
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value.as_bytes());
            hasher.update(b";");
        }
        Fingerprint {
            digest: hex::encode(hasher.finalize()),
            window_ms: None,
        }
    }

    /// Restrict matches to messages created at most `window_ms` apart.
    pub fn within(mut self, window_ms: i64) -> Self {
        self.window_ms = Some(window_ms.max(0));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }

    pub fn window_ms(&self) -> Option<i64> {
        self.window_ms
    }

    /// Whether a message fingerprinted as `self` at `created_at` and one
    /// fingerprinted as `other` at `other_created_at` are the same send.
    pub fn matches(&self, created_at: i64, other: &Fingerprint, other_created_at: i64) -> bool {
        if self.digest != other.digest {
            return false;
        }
        match self.window_ms.max(other.window_ms) {
            Some(window) => created_at.abs_diff(other_created_at) <= window.unsigned_abs(),
            None => true,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

/// Source of fingerprints for provisional/confirmed reconciliation.
///
/// Any `Fn(&Message) -> Fingerprint` closure is a fingerprinter, so callers
/// with their own correlation scheme can plug it in directly.
pub trait Fingerprinter {
    fn fingerprint(&self, message: &Message) -> Fingerprint;
}

impl<F> Fingerprinter for F
where
    F: Fn(&Message) -> Fingerprint,
{
    fn fingerprint(&self, message: &Message) -> Fingerprint {
        self(message)
    }
}

/// Default fingerprinter driven by [`FingerprintConfig`].
#[derive(Debug, Clone, Default)]
pub struct FieldFingerprinter {
    config: FingerprintConfig,
}

impl FieldFingerprinter {
    pub fn new(config: FingerprintConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }
}

impl Fingerprinter for FieldFingerprinter {
    fn fingerprint(&self, message: &Message) -> Fingerprint {
        let cfg = &self.config;
        let counterpart = message.counterpart().map(|c| c.to_string()).unwrap_or_default();
        let listing = message.listing().unwrap_or_default();

        let token = message
            .correlation_token
            .as_deref()
            .map(str::trim)
            .filter(|t| cfg.use_correlation_token && !t.is_empty());

        let sender = message.sender_id.map(|s| s.to_string()).unwrap_or_default();

        if let Some(token) = token {
            let mut parts = Vec::with_capacity(4);
            if cfg.include_sender {
                parts.push(("sender", sender.as_str()));
            }
            if cfg.include_counterpart {
                parts.push(("counterpart", counterpart.as_str()));
            }
            if cfg.include_listing {
                parts.push(("listing", listing));
            }
            parts.push(("token", token));
            return Fingerprint::from_parts(parts);
        }

        let mut parts = Vec::with_capacity(4);
        if cfg.include_sender {
            parts.push(("sender", sender.as_str()));
        }
        parts.push(("counterpart", counterpart.as_str()));
        parts.push(("listing", listing));
        if cfg.include_content {
            parts.push(("content", message.content.as_deref().unwrap_or_default()));
        }
        Fingerprint::from_parts(parts).within(cfg.match_window_ms)
    }
}
