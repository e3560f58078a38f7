//! Hash-chained audit log
//!
//! Append-only record of every balance-affecting action. Each entry's
//! hash covers its own fields plus the previous entry's hash (zero bytes
//! for the first entry), so reordering or editing any persisted entry is
//! detectable by `verify_chain`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::to_hex;
use crate::types::{prefixed_id, AccountId, Currency};

/// Hex of the chain seed (32 zero bytes)
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audited action type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Account created
    Create,
    /// Funds reserved
    Reserve,
    /// Reservation finalized
    Confirm,
    /// Reservation released
    Release,
    /// Account closed
    Delete,
    /// Transfer executed or attempted
    Transfer,
}

impl EntryType {
    /// Stable wire name, fed into the entry hash
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Create => "CREATE",
            EntryType::Reserve => "RESERVE",
            EntryType::Confirm => "CONFIRM",
            EntryType::Release => "RELEASE",
            EntryType::Delete => "DELETE",
            EntryType::Transfer => "TRANSFER",
        }
    }
}

/// Immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    /// Entry ID
    pub id: String,
    /// Affected account
    pub account_id: AccountId,
    /// Action type
    pub entry_type: EntryType,
    /// Amount, when the action carries one
    pub amount: Option<Decimal>,
    /// Currency of the amount
    pub currency: Option<Currency>,
    /// Free-form description of the action
    pub details: String,
    /// Acting principal
    pub actor: String,
    /// Entry timestamp
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous entry (hex), or the zero seed
    pub previous_hash: String,
    /// SHA-256 over this entry's fields and `previous_hash` (hex)
    pub hash: String,
}

/// Compute an entry's chain hash from its fields
pub fn compute_entry_hash(
    account_id: &AccountId,
    entry_type: EntryType,
    details: &str,
    amount: Option<Decimal>,
    timestamp: DateTime<Utc>,
    previous_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_str().as_bytes());
    hasher.update(entry_type.as_str().as_bytes());
    hasher.update(details.as_bytes());
    if let Some(amount) = amount {
        hasher.update(amount.to_string().as_bytes());
    }
    hasher.update(
        timestamp
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_be_bytes(),
    );
    hasher.update(previous_hash.as_bytes());
    to_hex(&hasher.finalize())
}

/// Verify a log slice in append order.
///
/// Returns the index of the first broken entry: one whose recomputed hash
/// differs from its stored hash, or whose `previous_hash` does not match
/// its predecessor. The first entry's `previous_hash` is taken as the
/// chain base (the seed, or the hash of an entry trimmed by retention).
pub fn verify_entries(entries: &[TransactionLogEntry]) -> Option<usize> {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && entry.previous_hash != entries[i - 1].hash {
            return Some(i);
        }
        let recomputed = compute_entry_hash(
            &entry.account_id,
            entry.entry_type,
            &entry.details,
            entry.amount,
            entry.timestamp,
            &entry.previous_hash,
        );
        if recomputed != entry.hash {
            return Some(i);
        }
    }
    None
}

/// Append-only audit log with bounded retention
pub struct AuditLog {
    // Oldest first; retrieval reverses
    entries: RwLock<Vec<TransactionLogEntry>>,
    max_entries: usize,
}

impl AuditLog {
    /// Create an empty log keeping at most `max_entries` entries
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    /// Append a new entry, chained to the current head
    pub fn append(
        &self,
        account_id: AccountId,
        entry_type: EntryType,
        details: impl Into<String>,
        amount: Option<Decimal>,
        currency: Option<Currency>,
        actor: impl Into<String>,
    ) -> TransactionLogEntry {
        let details = details.into();
        let timestamp = Utc::now();

        let mut entries = self.entries.write();
        let previous_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let hash = compute_entry_hash(
            &account_id,
            entry_type,
            &details,
            amount,
            timestamp,
            &previous_hash,
        );

        let entry = TransactionLogEntry {
            id: prefixed_id("TXN"),
            account_id,
            entry_type,
            amount,
            currency,
            details,
            actor: actor.into(),
            timestamp,
            previous_hash,
            hash,
        };

        entries.push(entry.clone());

        // Retention: keep the newest max_entries
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        tracing::debug!(
            entry_id = %entry.id,
            account_id = %entry.account_id,
            entry_type = entry.entry_type.as_str(),
            "audit entry appended"
        );
        entry
    }

    /// Entries most-recent-first, optionally filtered by account and capped
    pub fn list(&self, account_id: Option<&AccountId>, limit: Option<usize>) -> Vec<TransactionLogEntry> {
        let entries = self.entries.read();
        let filtered = entries
            .iter()
            .rev()
            .filter(|e| account_id.map_or(true, |id| &e.account_id == id))
            .cloned();
        match limit {
            Some(n) => filtered.take(n).collect(),
            None => filtered.collect(),
        }
    }

    /// Verify the retained chain; returns the ID of the first broken entry
    pub fn verify_chain(&self) -> Option<String> {
        let entries = self.entries.read();
        verify_entries(&entries).map(|i| entries[i].id.clone())
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no entries are retained
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the retained entries, oldest first
    pub fn snapshot(&self) -> Vec<TransactionLogEntry> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_n(log: &AuditLog, n: usize) {
        for i in 0..n {
            log.append(
                AccountId::new("ACC-USD-1"),
                EntryType::Transfer,
                format!("transfer #{i}"),
                Some(Decimal::from(100 + i as i64)),
                Some(Currency::USD),
                "system",
            );
        }
    }

    #[test]
    fn test_fresh_chain_verifies() {
        let log = AuditLog::new(1000);
        append_n(&log, 20);
        assert_eq!(log.verify_chain(), None);
    }

    #[test]
    fn test_tampered_details_detected() {
        let log = AuditLog::new(1000);
        append_n(&log, 10);

        let mut entries = log.snapshot();
        entries[4].details = "transfer #4 (edited)".to_string();
        assert_eq!(verify_entries(&entries), Some(4));
    }

    #[test]
    fn test_tampered_amount_detected() {
        let log = AuditLog::new(1000);
        append_n(&log, 10);

        let mut entries = log.snapshot();
        entries[7].amount = Some(Decimal::from(999_999));
        assert_eq!(verify_entries(&entries), Some(7));
    }

    #[test]
    fn test_broken_link_detected() {
        let log = AuditLog::new(1000);
        append_n(&log, 5);

        // Drop an interior entry: the successor's previous_hash no longer matches
        let mut entries = log.snapshot();
        entries.remove(2);
        assert_eq!(verify_entries(&entries), Some(2));
    }

    #[test]
    fn test_first_entry_chains_to_seed() {
        let log = AuditLog::new(1000);
        append_n(&log, 1);
        assert_eq!(log.snapshot()[0].previous_hash, GENESIS_HASH);
    }

    #[test]
    fn test_retention_keeps_newest_and_still_verifies() {
        let log = AuditLog::new(10);
        append_n(&log, 25);

        assert_eq!(log.len(), 10);
        // The retained window still verifies: the oldest retained entry's
        // previous_hash is accepted as the chain base
        assert_eq!(log.verify_chain(), None);

        let newest = log.list(None, Some(1));
        assert_eq!(newest[0].details, "transfer #24");
    }

    #[test]
    fn test_list_filters_and_orders() {
        let log = AuditLog::new(1000);
        let a = AccountId::new("ACC-USD-A");
        let b = AccountId::new("ACC-USD-B");
        log.append(a.clone(), EntryType::Create, "created", None, None, "system");
        log.append(b.clone(), EntryType::Create, "created", None, None, "system");
        log.append(a.clone(), EntryType::Reserve, "reserved", Some(Decimal::ONE), Some(Currency::USD), "system");

        let for_a = log.list(Some(&a), None);
        assert_eq!(for_a.len(), 2);
        // Most recent first
        assert_eq!(for_a[0].entry_type, EntryType::Reserve);
        assert_eq!(for_a[1].entry_type, EntryType::Create);
    }
}
