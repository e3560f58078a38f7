//! Transfer repository port and in-memory implementation

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use custody_core::PartnerId;

use crate::error::{Error, Result};
use crate::types::{Transfer, TransferId};

/// Outcome of claiming a `(partner_id, transfer_request_id)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the request ID; it performs the transfer
    Claimed,
    /// Another transfer already holds the request ID
    Existing(TransferId),
}

/// Transfer persistence port
pub trait TransferRepository: Send + Sync {
    /// Insert a new transfer record
    fn insert(&self, transfer: Transfer);

    /// Find by transfer ID
    fn find_by_id(&self, transfer_id: &TransferId) -> Option<Transfer>;

    /// Find by the partner's idempotency key
    fn find_by_request_id(&self, partner_id: &PartnerId, request_id: &str) -> Option<Transfer>;

    /// All transfers of a partner, newest first
    fn find_by_partner(&self, partner_id: &PartnerId) -> Vec<Transfer>;

    /// Atomically mutate one transfer; returns the updated record
    fn update_with(
        &self,
        transfer_id: &TransferId,
        f: &mut dyn FnMut(&mut Transfer) -> Result<()>,
    ) -> Result<Transfer>;

    /// Atomic insert-if-absent on the idempotency index.
    ///
    /// Exactly one of any set of concurrent callers with the same pair
    /// observes `Claimed`; the rest observe `Existing` with the winner's
    /// transfer ID.
    fn claim_request_id(
        &self,
        partner_id: &PartnerId,
        request_id: &str,
        transfer_id: &TransferId,
    ) -> Claim;

    /// Remove a transfer that lost a claim race and was never indexed
    fn remove_unclaimed(&self, transfer_id: &TransferId);
}

/// In-memory transfer repository
#[derive(Debug, Default)]
pub struct InMemoryTransferRepository {
    transfers: DashMap<TransferId, Transfer>,
    // (partner_id, transfer_request_id) -> transfer_id
    request_index: DashMap<(PartnerId, String), TransferId>,
    // partner_id -> transfer ids, insertion order
    partner_index: DashMap<PartnerId, Vec<TransferId>>,
}

impl InMemoryTransferRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferRepository for InMemoryTransferRepository {
    fn insert(&self, transfer: Transfer) {
        self.partner_index
            .entry(transfer.partner_id.clone())
            .or_default()
            .push(transfer.transfer_id.clone());
        self.transfers
            .insert(transfer.transfer_id.clone(), transfer);
    }

    fn find_by_id(&self, transfer_id: &TransferId) -> Option<Transfer> {
        self.transfers.get(transfer_id).map(|t| t.clone())
    }

    fn find_by_request_id(&self, partner_id: &PartnerId, request_id: &str) -> Option<Transfer> {
        let key = (partner_id.clone(), request_id.to_string());
        let transfer_id = self.request_index.get(&key)?.clone();
        self.find_by_id(&transfer_id)
    }

    fn find_by_partner(&self, partner_id: &PartnerId) -> Vec<Transfer> {
        let ids = match self.partner_index.get(partner_id) {
            Some(ids) => ids.clone(),
            None => return vec![],
        };
        ids.iter()
            .rev()
            .filter_map(|id| self.transfers.get(id).map(|t| t.clone()))
            .collect()
    }

    fn update_with(
        &self,
        transfer_id: &TransferId,
        f: &mut dyn FnMut(&mut Transfer) -> Result<()>,
    ) -> Result<Transfer> {
        let mut transfer = self
            .transfers
            .get_mut(transfer_id)
            .ok_or_else(|| Error::TransferNotFound(transfer_id.to_string()))?;
        f(&mut transfer)?;
        Ok(transfer.clone())
    }

    fn claim_request_id(
        &self,
        partner_id: &PartnerId,
        request_id: &str,
        transfer_id: &TransferId,
    ) -> Claim {
        let key = (partner_id.clone(), request_id.to_string());
        match self.request_index.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(transfer_id.clone());
                Claim::Claimed
            }
            Entry::Occupied(occupied) => Claim::Existing(occupied.get().clone()),
        }
    }

    fn remove_unclaimed(&self, transfer_id: &TransferId) {
        if let Some((_, transfer)) = self.transfers.remove(transfer_id) {
            if let Some(mut ids) = self.partner_index.get_mut(&transfer.partner_id) {
                ids.retain(|id| id != transfer_id);
            }
        }
    }
}
