use thiserror::Error;

/// Rejected assembler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fingerprint match window must be positive, got {0} ms")]
    InvalidMatchWindow(i64),
    #[error("retired fingerprint retention must be positive, got {0} ms")]
    InvalidRetention(i64),
    #[error("invalid fingerprint config: {0}")]
    Parse(#[from] serde_json::Error),
}
