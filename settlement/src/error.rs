//! Error types for settlement

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Custody core error (balances, limits, repositories)
    #[error(transparent)]
    Core(#[from] custody_core::Error),

    /// Request currency differs from the target account's currency
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),

    /// Malformed transfer request (same-account transfer, illegal transition)
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Transfer does not exist
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
