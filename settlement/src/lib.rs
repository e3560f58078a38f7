//! Partner transfer settlement over the custody core.
//!
//! This crate orchestrates partner-submitted transfers across custody
//! accounts: idempotent submission, a strict lifecycle state machine
//! (`PENDING -> PROCESSING -> SETTLED | REJECTED | FAILED`), limit
//! evaluation, atomic two-leg balance movement under per-account locks,
//! and audit/alert emission.
//!
//! The custody invariants themselves (balance split, hash-chained audit
//! log, daily limit rollover) live in `custody_core`; this crate adds
//! the transfer lifecycle and the partner-facing operations around it.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod repository;
pub mod types;

pub use config::Config;
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use locks::{AccountLocks, TransferGuards};
pub use repository::{Claim, InMemoryTransferRepository, TransferRepository};
pub use types::{
    CashTransferDetails, ExternalDestination, Transfer, TransferDestination, TransferId,
    TransferMethod, TransferRequest, TransferState,
};
