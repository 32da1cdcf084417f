//! Error types for Inscribe
//!
//! Provides a unified error type for ledger calls and the inscription driver,
//! split into transient failures (recovered by re-reading remote state or
//! retrying) and fatal ones (surfaced to the caller immediately).

use thiserror::Error;

/// Result type alias for Inscribe operations
pub type Result<T> = std::result::Result<T, InscribeError>;

/// Unified error type for Inscribe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InscribeError {
    // ===== Transient Remote Errors =====
    #[error("Transient remote error: {0}")]
    Transient(String),

    #[error("Rate limited by remote service")]
    RateLimited,

    #[error("Remote rejected request: {0}")]
    Rejected(String),

    // ===== Fatal Remote Errors =====
    #[error("Signer is not an authorized writer for {0}")]
    Unauthorized(String),

    #[error("Address {address} does not match its expected derivation")]
    DerivationMismatch { address: String },

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Payer cannot cover fees or rent: {0}")]
    InsufficientFunds(String),

    // ===== Validation Errors =====
    #[error("Invalid associated tag: {0}")]
    InvalidTag(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Chunk too large: {size} bytes (max: {max})")]
    ChunkTooLarge { size: usize, max: usize },

    // ===== Driver Outcomes =====
    #[error("Allocation stalled at {length}/{target} bytes after {rounds} rounds without progress")]
    GrowStalled {
        target: usize,
        length: usize,
        rounds: u32,
    },

    #[error("Write at offset {offset} failed after {attempts} attempts: {last_error}")]
    WriteFailed {
        offset: usize,
        attempts: u32,
        last_error: String,
    },

    #[error("Content still differs after {rounds} verification rounds ({pending} chunks pending)")]
    VerificationStalled { rounds: u32, pending: usize },

    #[error("Inscription cancelled")]
    Cancelled,

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(String),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InscribeError {
    /// Whether retrying the same call (or re-deriving remaining work) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InscribeError::Transient(_) | InscribeError::RateLimited | InscribeError::Rejected(_)
        )
    }
}

impl From<std::io::Error> for InscribeError {
    fn from(err: std::io::Error) -> Self {
        InscribeError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InscribeError::WriteFailed {
            offset: 1000,
            attempts: 8,
            last_error: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Write at offset 1000 failed after 8 attempts: timeout"
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(InscribeError::RateLimited.is_retryable());
        assert!(InscribeError::Transient("connection reset".into()).is_retryable());
        assert!(InscribeError::Rejected("blockhash not found".into()).is_retryable());

        assert!(!InscribeError::Unauthorized("acct".into()).is_retryable());
        assert!(!InscribeError::DerivationMismatch {
            address: "acct".into()
        }
        .is_retryable());
        assert!(!InscribeError::NotFound("acct".into()).is_retryable());
        assert!(!InscribeError::AlreadyInitialized("shard".into()).is_retryable());
        assert!(!InscribeError::InsufficientFunds("payer".into()).is_retryable());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InscribeError = io_err.into();
        assert!(matches!(err, InscribeError::Io(_)));
    }
}
