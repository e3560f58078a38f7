//! Error types for the custody core

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{AccountId, Currency};

/// Result type for custody operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custody core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount is zero, negative, or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Available balance cannot cover the requested amount
    #[error("Insufficient funds on {account_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Affected account
        account_id: AccountId,
        /// Requested amount
        requested: Decimal,
        /// Available balance at the time of the check
        available: Decimal,
    },

    /// Currency is not on the relevant allow-list
    #[error("Currency {currency} not allowed for {scope}")]
    CurrencyNotAllowed {
        /// Offending currency
        currency: Currency,
        /// Partner or client the allow-list belongs to
        scope: String,
    },

    /// Operation limit rejection
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Generic repository miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Account is blocked pending manual review
    #[error("Account {0} is blocked pending manual review")]
    AccountBlocked(AccountId),

    /// Account was closed; closed accounts refuse mutation
    #[error("Account {0} is closed")]
    AccountClosed(AccountId),

    /// Invariant violation detected; fatal for the affected account
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
}
