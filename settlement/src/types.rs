//! Transfer types and state machine

use chrono::{DateTime, Utc};
use custody_core::types::prefixed_id;
use custody_core::{AccountId, Currency, PartnerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Transfer identifier (system-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(String);

impl TransferId {
    /// Create new transfer ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh transfer ID
    pub fn generate() -> Self {
        Self(prefixed_id("TRF"))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transfer state machine
///
/// `Pending` and `Processing` are transient; `Settled`, `Rejected` and
/// `Failed` are terminal and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// Accepted, not yet executing
    Pending,
    /// Executing, or awaiting the external settlement leg
    Processing,
    /// Terminal: effect is final within the ledger
    Settled,
    /// Terminal: refused before any balance mutation
    Rejected,
    /// Terminal: execution failed; balances compensated
    Failed,
}

impl TransferState {
    /// True for `Settled`, `Rejected`, `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Settled | TransferState::Rejected | TransferState::Failed
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Pending => "PENDING",
            TransferState::Processing => "PROCESSING",
            TransferState::Settled => "SETTLED",
            TransferState::Rejected => "REJECTED",
            TransferState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Settlement instruction target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDestination {
    /// Another account inside the ledger
    Internal(AccountId),
    /// An outside institution; the credit leg executes out-of-band
    External(ExternalDestination),
}

impl TransferDestination {
    /// Internal destination account, if any
    pub fn internal_account(&self) -> Option<&AccountId> {
        match self {
            TransferDestination::Internal(id) => Some(id),
            TransferDestination::External(_) => None,
        }
    }

    /// True for external destinations
    pub fn is_external(&self) -> bool {
        matches!(self, TransferDestination::External(_))
    }
}

/// Descriptor of an external settlement target, enough for manual
/// out-of-band execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDestination {
    /// Receiving institution name
    pub institution: String,
    /// Receiving account number or IBAN
    pub account_number: String,
    /// Beneficiary legal name
    pub beneficiary_name: String,
    /// Optional external reference
    pub reference: Option<String>,
}

/// Transfer rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMethod {
    /// Internal API transfer
    Api,
    /// Wire transfer
    Wire,
    /// ACH
    Ach,
    /// SEPA
    Sepa,
}

/// Standard cash-transfer descriptor carried on every transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashTransferDetails {
    /// Sender legal name
    pub sending_name: String,
    /// Sending institution
    pub sending_institution: String,
    /// Receiver legal name
    pub receiving_name: String,
    /// Receiving institution
    pub receiving_institution: String,
    /// Rail
    pub method: TransferMethod,
    /// Transfer purpose
    pub purpose: String,
}

/// A transfer submission from a partner
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    /// Partner-supplied idempotency key, unique per partner
    pub transfer_request_id: String,
    /// Source account
    pub from_account_id: AccountId,
    /// Internal account or external descriptor
    pub destination: TransferDestination,
    /// Amount to move
    pub amount: Decimal,
    /// Currency the source is debited in
    pub sending_currency: Currency,
    /// Currency the destination receives
    pub receiving_currency: Currency,
    /// Free-form description
    pub description: String,
    /// Optional cash-transfer descriptor
    pub details: Option<CashTransferDetails>,
}

/// One settlement instruction and its lifecycle record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// System-generated ID
    pub transfer_id: TransferId,

    /// Submitting partner
    pub partner_id: PartnerId,

    /// Partner-supplied idempotency key
    pub transfer_request_id: String,

    /// Source account
    pub from_account_id: AccountId,

    /// Destination
    pub destination: TransferDestination,

    /// Amount
    pub amount: Decimal,

    /// Sending currency
    pub sending_currency: Currency,

    /// Receiving currency
    pub receiving_currency: Currency,

    /// Current state
    pub state: TransferState,

    /// Reason for `Rejected`/`Failed`
    pub failure_reason: Option<String>,

    /// Whether the amount was above the approval threshold
    pub requires_approval: bool,

    /// Free-form description
    pub description: String,

    /// Cash-transfer descriptor, when supplied
    pub details: Option<CashTransferDetails>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Settled timestamp
    pub settled_at: Option<DateTime<Utc>>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    /// True when the transfer is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a state transition; terminal states are immutable
    pub fn transition(&mut self, state: TransferState, failure_reason: Option<String>) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::InvalidTransfer(format!(
                "transfer {} is terminal ({}) and cannot move to {state}",
                self.transfer_id, self.state
            )));
        }
        self.state = state;
        self.failure_reason = failure_reason;
        self.updated_at = Utc::now();
        if state == TransferState::Settled {
            self.settled_at = Some(self.updated_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_transfer() -> Transfer {
        Transfer {
            transfer_id: TransferId::generate(),
            partner_id: PartnerId::new("PTN-1"),
            transfer_request_id: "R1".to_string(),
            from_account_id: AccountId::new("ACC-USD-1"),
            destination: TransferDestination::Internal(AccountId::new("ACC-USD-2")),
            amount: Decimal::from(300),
            sending_currency: Currency::USD,
            receiving_currency: Currency::USD,
            state: TransferState::Pending,
            failure_reason: None,
            requires_approval: false,
            description: "test".to_string(),
            details: None,
            created_at: Utc::now(),
            settled_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TransferState::Pending.is_terminal());
        assert!(!TransferState::Processing.is_terminal());
        assert!(TransferState::Settled.is_terminal());
        assert!(TransferState::Rejected.is_terminal());
        assert!(TransferState::Failed.is_terminal());
    }

    #[test]
    fn test_transition_stamps_settled_at() {
        let mut transfer = test_transfer();
        transfer.transition(TransferState::Processing, None).unwrap();
        assert!(transfer.settled_at.is_none());
        transfer.transition(TransferState::Settled, None).unwrap();
        assert!(transfer.settled_at.is_some());
    }

    #[test]
    fn test_terminal_is_immutable() {
        let mut transfer = test_transfer();
        transfer
            .transition(TransferState::Rejected, Some("over limit".to_string()))
            .unwrap();

        let err = transfer.transition(TransferState::Settled, None).unwrap_err();
        assert!(matches!(err, Error::InvalidTransfer(_)));
        assert_eq!(transfer.state, TransferState::Rejected);
        assert_eq!(transfer.failure_reason.as_deref(), Some("over limit"));
    }
}
