use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default tolerance for matching an optimistic message to its confirmation
/// by time when no correlation token is available.
pub const DEFAULT_MATCH_WINDOW_MS: i64 = 60_000;

/// How long a confirmed or failed placeholder is remembered, measured back
/// from the newest `createdAt` seen.
pub const DEFAULT_RETIRED_RETENTION_MS: i64 = 60 * 60 * 1000;

/// Which fields make up a message fingerprint.
///
/// With a correlation token present, the fingerprint is built from the token
/// plus the enabled sender/counterpart/listing fields. Without one, it falls
/// back to sender (when enabled), counterpart and listing, plus the content
/// when `include_content` is set. Fallback fingerprints only match when the
/// two `createdAt` values are at most `match_window_ms` apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FingerprintConfig {
    pub include_sender: bool,
    pub include_counterpart: bool,
    pub include_listing: bool,
    pub use_correlation_token: bool,
    /// Only consulted on the fallback path.
    pub include_content: bool,
    pub match_window_ms: i64,
    pub retired_retention_ms: i64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            include_sender: true,
            include_counterpart: true,
            include_listing: true,
            use_correlation_token: true,
            include_content: false,
            match_window_ms: DEFAULT_MATCH_WINDOW_MS,
            retired_retention_ms: DEFAULT_RETIRED_RETENTION_MS,
        }
    }
}

impl FingerprintConfig {
    /// Parse a (possibly partial) JSON config; omitted fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: FingerprintConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.match_window_ms <= 0 {
            return Err(ConfigError::InvalidMatchWindow(self.match_window_ms));
        }
        if self.retired_retention_ms <= 0 {
            return Err(ConfigError::InvalidRetention(self.retired_retention_ms));
        }
        Ok(())
    }
}
