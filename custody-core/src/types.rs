//! Core domain types for the custody ledger
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money, no floats)
//! - Explicit status lifecycles (entities are closed, never deleted)
//! - Serde serialization at the edges

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a prefixed, time-ordered identifier (`PTN-0192...`).
///
/// UUIDv7 keeps IDs monotonically distinguishable across the process.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7().simple())
}

/// Partner identifier (top-level tenant)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartnerId(String);

impl PartnerId {
    /// Create new partner ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh partner ID
    pub fn generate() -> Self {
        Self(prefixed_id("PTN"))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client identifier (end-user of a partner)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Create new client ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh client ID
    pub fn generate() -> Self {
        Self(prefixed_id("CLT"))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh account ID carrying the currency code
    pub fn generate(currency: Currency) -> Self {
        Self(format!("ACC-{}-{}", currency.code(), Uuid::now_v7().simple()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Swiss Franc
    CHF,
    /// UAE Dirham
    AED,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::AED => "AED",
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "CHF" => Ok(Currency::CHF),
            "AED" => Ok(Currency::AED),
            other => Err(crate::Error::NotFound(format!(
                "unknown currency code: {other}"
            ))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Partner lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerStatus {
    /// Partner may operate
    Active,
    /// Partner disabled
    Inactive,
}

/// Top-level tenant owning clients and their accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    /// Partner ID
    pub partner_id: PartnerId,

    /// Display name
    pub name: String,

    /// OAuth-style client ID for API credentials
    pub client_id: String,

    /// SHA-256 hex of the client secret; the secret itself is never stored
    pub client_secret_hash: String,

    /// Currencies this partner may operate in
    pub allowed_currencies: Vec<Currency>,

    /// Optional webhook endpoint for out-of-band notifications
    pub webhook_url: Option<String>,

    /// Lifecycle status
    pub status: PartnerStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Credentials returned exactly once, at partner creation
#[derive(Debug, Clone, Serialize)]
pub struct PartnerCredentials {
    /// Partner ID
    pub partner_id: PartnerId,
    /// API client ID
    pub client_id: String,
    /// Plaintext secret — surfaced only here, never persisted
    pub client_secret: String,
}

/// Request to create a partner
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePartner {
    /// Display name
    pub name: String,
    /// Currency allow-list
    pub allowed_currencies: Vec<Currency>,
    /// Optional webhook endpoint
    pub webhook_url: Option<String>,
}

/// Client business type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    /// Fintech platform
    Fintech,
    /// Payment service provider
    Psp,
    /// Wallet provider
    Wallet,
    /// Exchange
    Exchange,
}

/// Client lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    /// Client may operate
    Active,
    /// Client disabled
    Inactive,
    /// Client suspended pending review
    Suspended,
}

/// End-user of a partner; owns zero or more accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Client ID
    pub client_id: ClientId,

    /// Owning partner
    pub partner_id: PartnerId,

    /// The partner's own identifier for this client
    pub external_client_id: String,

    /// Legal name
    pub legal_name: String,

    /// ISO country code
    pub country: String,

    /// Business type
    pub client_type: ClientType,

    /// Currencies this client may hold accounts in
    pub allowed_currencies: Vec<Currency>,

    /// Lifecycle status
    pub status: ClientStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Request to create a client under a partner
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    /// The partner's own identifier for this client
    pub external_client_id: String,
    /// Legal name
    pub legal_name: String,
    /// ISO country code
    pub country: String,
    /// Business type
    pub client_type: ClientType,
    /// Currency allow-list (must be within the partner's)
    pub allowed_currencies: Vec<Currency>,
}

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Account may be mutated
    Active,
    /// Frozen after a detected invariant violation; manual review required
    Blocked,
    /// Closed via status flag; accounts are never hard-deleted
    Closed,
}

/// Reservation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Funds held in `reserved_balance`
    Reserved,
    /// Finalized; funds left the account
    Confirmed,
    /// Returned to `available_balance`
    Released,
}

/// An earmark of funds on a single account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation ID
    pub id: String,
    /// Reserved amount
    pub amount: Decimal,
    /// Caller-supplied reference for the pending operation
    pub reference: String,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Per-currency custody account
///
/// Invariant: `balance == available_balance + reserved_balance`,
/// all three non-negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub account_id: AccountId,

    /// Owning client
    pub client_id: ClientId,

    /// Account currency
    pub currency: Currency,

    /// Total balance
    pub balance: Decimal,

    /// Portion immediately usable for debits and reservations
    pub available_balance: Decimal,

    /// Portion earmarked for pending operations
    pub reserved_balance: Decimal,

    /// Lifecycle status
    pub status: AccountStatus,

    /// Reservations held against this account
    pub reservations: Vec<Reservation>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Timestamp of the last balance-affecting operation
    pub last_transaction_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Check the balance split invariant
    pub fn split_ok(&self) -> bool {
        self.balance == self.available_balance + self.reserved_balance
            && self.balance >= Decimal::ZERO
            && self.available_balance >= Decimal::ZERO
            && self.reserved_balance >= Decimal::ZERO
    }

    /// Three-way balance view
    pub fn balance_snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            account_id: self.account_id.clone(),
            currency: self.currency,
            balance: self.balance,
            available_balance: self.available_balance,
            reserved_balance: self.reserved_balance,
            last_updated: self.updated_at,
        }
    }
}

/// Request to create an account for a client
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccount {
    /// Owning client
    pub client_id: ClientId,
    /// Account currency
    pub currency: Currency,
    /// Optional seed balance (defaults to zero)
    pub initial_balance: Option<Decimal>,
}

/// Point-in-time balance view returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSnapshot {
    /// Account ID
    pub account_id: AccountId,
    /// Account currency
    pub currency: Currency,
    /// Total balance
    pub balance: Decimal,
    /// Available portion
    pub available_balance: Decimal,
    /// Reserved portion
    pub reserved_balance: Decimal,
    /// Last update timestamp
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account(balance: i64, available: i64, reserved: i64) -> Account {
        Account {
            account_id: AccountId::new("ACC-USD-1"),
            client_id: ClientId::new("CLT-1"),
            currency: Currency::USD,
            balance: Decimal::from(balance),
            available_balance: Decimal::from(available),
            reserved_balance: Decimal::from(reserved),
            status: AccountStatus::Active,
            reservations: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_transaction_at: None,
        }
    }

    #[test]
    fn test_split_invariant() {
        assert!(test_account(1000, 700, 300).split_ok());
        assert!(!test_account(1000, 700, 200).split_ok());
        assert!(!test_account(100, 200, -100).split_ok());
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!("AED".parse::<Currency>().unwrap(), Currency::AED);
        assert!("XXX".parse::<Currency>().is_err());
    }

    #[test]
    fn test_prefixed_ids_are_distinct() {
        let a = AccountId::generate(Currency::USD);
        let b = AccountId::generate(Currency::USD);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("ACC-USD-"));
    }
}
