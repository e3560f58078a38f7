//! Custody Ledger Core
//!
//! Account balances with an available/reserved split, per-account
//! operation limits, a hash-chained audit log, and derived alerts.
//!
//! # Invariants
//!
//! - Balance split: `balance == available + reserved`, all non-negative
//! - Per-account serialization: single-account mutations never interleave
//! - Audit chain: entries are hash-linked and order-verifiable
//! - Accounts are closed via status flag, never hard-deleted

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod alerts;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod limits;
pub mod repository;
pub mod store;
pub mod types;

// Re-exports
pub use alerts::{Alert, AlertEngine, AlertType, Severity};
pub use audit::{AuditLog, EntryType, TransactionLogEntry};
pub use config::{AlertConfig, AuditConfig, CoreConfig};
pub use error::{Error, Result};
pub use limits::{LimitDecision, LimitsEngine, OperationLimit};
pub use repository::{
    AccountRepository, ClientRepository, InMemoryAccountRepository, InMemoryClientRepository,
    InMemoryPartnerRepository, PartnerRepository,
};
pub use store::AccountStore;
pub use types::{
    Account, AccountId, AccountStatus, BalanceSnapshot, Client, ClientId, ClientStatus,
    ClientType, CreateAccount, CreateClient, CreatePartner, Currency, Partner,
    PartnerCredentials, PartnerId, PartnerStatus, Reservation, ReservationStatus,
};
