//! Error types for Pactchain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Malformed transaction, block or agreement request. Recoverable,
    /// reported to the caller, no state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Balance or available-balance check failed.
    #[error("insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: f64, available: f64 },

    /// Signature missing, unknown sender key, or verification failure.
    /// Treated as a rejection, not a crash.
    #[error("signature error: {0}")]
    Signature(String),

    /// Post-mining verification or full-chain validation failure. The
    /// offending block must not be appended.
    #[error("chain integrity error: {0}")]
    ChainIntegrity(String),

    /// Low-level cryptographic failure (key parsing, digest construction).
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Operation referenced an unknown escrow agreement id.
    #[error("escrow agreement not found: {0}")]
    EscrowNotFound(String),

    /// Canonical serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be parsed or failed validation.
    #[error("config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for ChainError {
    fn from(err: hex::FromHexError) -> Self {
        ChainError::Crypto(format!("invalid hex: {}", err))
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
