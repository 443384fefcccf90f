//! Error types for the account manager

use std::time::Duration;

use thiserror::Error;

use crate::chain::Chain;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to compute an address for an account index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("Derivation index {index} exceeds maximum {max}")]
    IndexOutOfRange { index: u32, max: u32 },

    #[error("No key material loaded for {0}")]
    MissingKeyMaterial(Chain),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Failure to read a balance from a chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceQueryError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Balance query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Malformed balance response: {0}")]
    MalformedResponse(String),
}

/// Main error type for the account manager
#[derive(Error, Debug)]
pub enum Error {
    // Adapter errors
    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Balance query error: {0}")]
    BalanceQuery(#[from] BalanceQueryError),

    // Store errors
    #[error("Duplicate account {address} on {chain}")]
    DuplicateAccount { chain: Chain, address: String },

    #[error("Duplicate account index {index} on {chain}")]
    DuplicateIndex { chain: Chain, index: u32 },

    #[error("Account not found: {address} on {chain}")]
    AccountNotFound { chain: Chain, address: String },

    // Input errors
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    // Setup errors
    #[error("Key material error: {0}")]
    KeyMaterial(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable (transient network failure)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BalanceQuery(_))
    }

    /// Check if this error means the per-chain serialization was violated
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Error::DuplicateAccount { .. } | Error::DuplicateIndex { .. }
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Account task failed: {}", e))
    }
}

impl From<bip39::Error> for Error {
    fn from(e: bip39::Error) -> Self {
        Error::KeyMaterial(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let network: Error = BalanceQueryError::NetworkUnavailable("down".into()).into();
        assert!(network.is_retryable());
        assert!(!network.is_defect());

        let derivation: Error = DerivationError::MissingKeyMaterial(Chain::Solana).into();
        assert!(!derivation.is_retryable());

        let duplicate = Error::DuplicateIndex {
            chain: Chain::Polygon,
            index: 3,
        };
        assert!(duplicate.is_defect());
        assert!(!duplicate.is_retryable());
    }

    #[test]
    fn test_timeout_message() {
        let err = BalanceQueryError::Timeout(Duration::from_millis(2500));
        assert_eq!(
            err.to_string(),
            "Balance query timed out after 2500ms"
        );
    }
}
