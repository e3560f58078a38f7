//! Settlement engine
//!
//! Orchestrates the transfer state machine over the custody core:
//! idempotency claim, limit evaluation, atomic debit/credit, audit trail
//! and derived alerts. Balance mutations for one transfer run under
//! per-account locks acquired in ascending account-id order; audit and
//! alert emission happen after the locks are released.

use rust_decimal::Decimal;
use std::sync::Arc;

use custody_core::{
    crypto, Account, AccountId, AccountRepository, AccountStatus, AccountStore, AlertEngine,
    AuditLog, BalanceSnapshot, Client, ClientId, ClientRepository, CreateAccount, CreateClient,
    CreatePartner, EntryType, InMemoryAccountRepository, InMemoryClientRepository,
    InMemoryPartnerRepository, LimitDecision, LimitsEngine, OperationLimit, Partner,
    PartnerCredentials, PartnerId, PartnerRepository, TransactionLogEntry,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::locks::AccountLocks;
use crate::repository::{Claim, InMemoryTransferRepository, TransferRepository};
use crate::types::{Transfer, TransferId, TransferRequest, TransferState};

/// Settlement engine over the custody core
pub struct SettlementEngine {
    partners: Arc<dyn PartnerRepository>,
    clients: Arc<dyn ClientRepository>,
    accounts: Arc<dyn AccountRepository>,
    transfers: Arc<dyn TransferRepository>,
    store: AccountStore,
    limits: LimitsEngine,
    audit: AuditLog,
    alerts: AlertEngine,
    locks: AccountLocks,
    actor: String,
}

impl SettlementEngine {
    /// Create an engine backed by in-memory repositories
    pub fn new(config: Config) -> Self {
        Self::with_repositories(
            config,
            Arc::new(InMemoryPartnerRepository::new()),
            Arc::new(InMemoryClientRepository::new()),
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(InMemoryTransferRepository::new()),
        )
    }

    /// Create an engine over caller-provided persistence ports
    pub fn with_repositories(
        config: Config,
        partners: Arc<dyn PartnerRepository>,
        clients: Arc<dyn ClientRepository>,
        accounts: Arc<dyn AccountRepository>,
        transfers: Arc<dyn TransferRepository>,
    ) -> Self {
        let actor = if config.audit_actor.is_empty() {
            "settlement-engine".to_string()
        } else {
            config.audit_actor.clone()
        };
        Self {
            store: AccountStore::new(accounts.clone()),
            limits: LimitsEngine::new(),
            audit: AuditLog::new(config.core.audit.max_entries),
            alerts: AlertEngine::new(config.core.alerts.clone()),
            locks: AccountLocks::new(),
            partners,
            clients,
            accounts,
            transfers,
            actor,
        }
    }

    // ── Partner / client / account lifecycle ────────────────────────────

    /// Create a partner; the client secret is surfaced only in the return
    /// value and never again
    pub fn create_partner(&self, req: CreatePartner) -> Result<PartnerCredentials> {
        let client_id = crypto::generate_client_id();
        let client_secret = crypto::generate_client_secret();
        let partner = self.partners.create(
            req,
            client_id.clone(),
            crypto::sha256_hex(&client_secret),
        );

        tracing::info!(partner_id = %partner.partner_id, name = %partner.name, "partner created");
        Ok(PartnerCredentials {
            partner_id: partner.partner_id,
            client_id,
            client_secret,
        })
    }

    /// Look up a partner by presented API credentials
    pub fn verify_partner_credentials(&self, client_id: &str, client_secret: &str) -> Option<Partner> {
        let partner = self.partners.find_by_client_id(client_id)?;
        crypto::verify_secret(client_secret, &partner.client_secret_hash).then_some(partner)
    }

    /// Create a client under a partner; currencies must be within the
    /// partner's allow-list
    pub fn create_client(&self, partner_id: &PartnerId, req: CreateClient) -> Result<Client> {
        let partner = self
            .partners
            .find_by_id(partner_id)
            .ok_or_else(|| custody_core::Error::NotFound(format!("partner {partner_id}")))?;

        for currency in &req.allowed_currencies {
            if !partner.allowed_currencies.contains(currency) {
                return Err(custody_core::Error::CurrencyNotAllowed {
                    currency: *currency,
                    scope: format!("partner {partner_id}"),
                }
                .into());
            }
        }

        Ok(self.clients.create(partner_id.clone(), req))
    }

    /// Create an account; the currency must be within the client's
    /// allow-list
    pub fn create_account(&self, req: CreateAccount) -> Result<Account> {
        let client = self
            .clients
            .find_by_id(&req.client_id)
            .ok_or_else(|| custody_core::Error::NotFound(format!("client {}", req.client_id)))?;

        if !client.allowed_currencies.contains(&req.currency) {
            return Err(custody_core::Error::CurrencyNotAllowed {
                currency: req.currency,
                scope: format!("client {}", client.client_id),
            }
            .into());
        }
        if let Some(initial) = req.initial_balance {
            if initial < Decimal::ZERO {
                return Err(custody_core::Error::InvalidAmount(format!(
                    "initial balance must not be negative, got {initial}"
                ))
                .into());
            }
        }

        let account = self.accounts.create(req);
        self.audit.append(
            account.account_id.clone(),
            EntryType::Create,
            format!("account opened with balance {}", account.balance),
            Some(account.balance),
            Some(account.currency),
            self.actor.clone(),
        );
        Ok(account)
    }

    /// Close an account via status flag; refuses while funds are reserved
    pub async fn close_account(&self, account_id: &AccountId) -> Result<Account> {
        let _guard = self.locks.acquire(account_id).await;
        let account = self.accounts.update_with(account_id, &mut |account| {
            if !account.reserved_balance.is_zero() {
                return Err(custody_core::Error::InvalidAmount(format!(
                    "cannot close {} with reserved funds",
                    account.account_id
                )));
            }
            account.status = AccountStatus::Closed;
            Ok(())
        })?;

        self.audit.append(
            account.account_id.clone(),
            EntryType::Delete,
            "account closed".to_string(),
            None,
            Some(account.currency),
            self.actor.clone(),
        );
        Ok(account)
    }

    /// Three-way balance view
    pub fn get_balance(&self, account_id: &AccountId) -> Result<BalanceSnapshot> {
        Ok(self.store.balance(account_id)?)
    }

    /// All clients of a partner
    pub fn list_clients(&self, partner_id: &PartnerId) -> Vec<Client> {
        self.clients.find_by_partner(partner_id)
    }

    /// All accounts of a client
    pub fn list_accounts(&self, client_id: &ClientId) -> Vec<Account> {
        self.accounts.find_by_client(client_id)
    }

    // ── Limits ──────────────────────────────────────────────────────────

    /// Configure per-account operation limits
    pub fn set_operation_limits(
        &self,
        account_id: &AccountId,
        daily_limit: Decimal,
        per_operation_limit: Decimal,
        requires_approval_above: Decimal,
        auto_approve_below: Decimal,
    ) -> Result<()> {
        if self.accounts.find_by_id(account_id).is_none() {
            return Err(custody_core::Error::AccountNotFound(account_id.clone()).into());
        }
        self.limits.set_limits(
            account_id.clone(),
            daily_limit,
            per_operation_limit,
            requires_approval_above,
            auto_approve_below,
        );
        Ok(())
    }

    /// Current limits and daily usage for an account, if configured
    pub fn get_operation_limits(&self, account_id: &AccountId) -> Option<OperationLimit> {
        self.limits.get(account_id)
    }

    // ── Transfers ───────────────────────────────────────────────────────

    /// Submit a transfer under a partner-supplied idempotency key.
    ///
    /// Replays of a known `(partner_id, transfer_request_id)` pair return
    /// the stored transfer unchanged; a replay racing the original call
    /// observes the committed in-flight state (`PENDING` until the locks
    /// are held, `PROCESSING` after) rather than an error or a second
    /// execution. Business-rule failures (limits,
    /// insufficient funds) return the transfer in a terminal state rather
    /// than an error; validation failures return an error without any
    /// mutation.
    pub async fn submit_transfer(
        &self,
        partner_id: &PartnerId,
        request: TransferRequest,
    ) -> Result<Transfer> {
        // Idempotent replay fast path
        if let Some(existing) = self
            .transfers
            .find_by_request_id(partner_id, &request.transfer_request_id)
        {
            tracing::info!(
                transfer_id = %existing.transfer_id,
                request_id = %request.transfer_request_id,
                "idempotent replay"
            );
            return Ok(existing);
        }

        // Validation, before any state mutation
        if request.amount <= Decimal::ZERO {
            return Err(custody_core::Error::InvalidAmount(format!(
                "transfer amount must be positive, got {}",
                request.amount
            ))
            .into());
        }
        if request.destination.internal_account() == Some(&request.from_account_id) {
            return Err(Error::InvalidTransfer(
                "source and destination account are the same".to_string(),
            ));
        }
        if self.partners.find_by_id(partner_id).is_none() {
            return Err(custody_core::Error::NotFound(format!("partner {partner_id}")).into());
        }

        let from = self
            .accounts
            .find_by_id(&request.from_account_id)
            .ok_or_else(|| custody_core::Error::AccountNotFound(request.from_account_id.clone()))?;
        if from.currency != request.sending_currency {
            return Err(Error::CurrencyMismatch(format!(
                "sending currency {} but account {} holds {}",
                request.sending_currency, from.account_id, from.currency
            )));
        }
        if let Some(to_id) = request.destination.internal_account() {
            let to = self
                .accounts
                .find_by_id(to_id)
                .ok_or_else(|| custody_core::Error::AccountNotFound(to_id.clone()))?;
            if to.currency != request.receiving_currency {
                return Err(Error::CurrencyMismatch(format!(
                    "receiving currency {} but account {} holds {}",
                    request.receiving_currency, to.account_id, to.currency
                )));
            }
        }

        // Create the record, then claim the idempotency key. Exactly one
        // concurrent duplicate wins the claim; losers return the winner's
        // record and drop their own, which was never indexed.
        let mut transfer = Transfer {
            transfer_id: TransferId::generate(),
            partner_id: partner_id.clone(),
            transfer_request_id: request.transfer_request_id.clone(),
            from_account_id: request.from_account_id.clone(),
            destination: request.destination.clone(),
            amount: request.amount,
            sending_currency: request.sending_currency,
            receiving_currency: request.receiving_currency,
            state: TransferState::Pending,
            failure_reason: None,
            requires_approval: false,
            description: request.description.clone(),
            details: request.details.clone(),
            created_at: chrono::Utc::now(),
            settled_at: None,
            updated_at: chrono::Utc::now(),
        };
        self.transfers.insert(transfer.clone());

        match self.transfers.claim_request_id(
            partner_id,
            &request.transfer_request_id,
            &transfer.transfer_id,
        ) {
            Claim::Claimed => {}
            Claim::Existing(winner) => {
                self.transfers.remove_unclaimed(&transfer.transfer_id);
                tracing::info!(
                    transfer_id = %winner,
                    request_id = %request.transfer_request_id,
                    "idempotent replay (lost claim race)"
                );
                return self
                    .transfers
                    .find_by_id(&winner)
                    .ok_or_else(|| Error::TransferNotFound(winner.to_string()));
            }
        }

        // Critical section: limits and balance mutations under the
        // account locks, ascending id order
        let to_id = request.destination.internal_account().cloned();
        let guards = self
            .locks
            .acquire_pair(&request.from_account_id, to_id.as_ref())
            .await;

        transfer.transition(TransferState::Processing, None)?;

        match self.limits.check(&request.from_account_id, request.amount) {
            LimitDecision::Rejected { reason } => {
                drop(guards);
                return self.finalize_rejected(transfer, reason);
            }
            LimitDecision::AllowedRequiresApproval => transfer.requires_approval = true,
            LimitDecision::Allowed => {}
        }

        // Commit PROCESSING before mutating balances, so concurrent
        // replays observe the in-flight state
        self.persist(&transfer)?;

        let debited = match self.store.debit(&request.from_account_id, request.amount) {
            Ok(account) => account,
            Err(err) => {
                let insufficient = matches!(err, custody_core::Error::InsufficientFunds { .. });
                let reason = err.to_string();
                drop(guards);
                if insufficient {
                    self.alerts.on_insufficient_funds(
                        &request.from_account_id,
                        request.sending_currency,
                        request.amount,
                        from.available_balance,
                    );
                }
                return self.finalize_failed(transfer, reason);
            }
        };

        if let Some(to_id) = &to_id {
            if let Err(err) = self.store.credit(to_id, request.amount) {
                // Roll the debit back; balances must match the terminal state
                if let Err(rollback_err) =
                    self.store.credit(&request.from_account_id, request.amount)
                {
                    tracing::error!(
                        account_id = %request.from_account_id,
                        error = %rollback_err,
                        "compensating credit failed; account requires manual review"
                    );
                }
                drop(guards);
                return self.finalize_failed(
                    transfer,
                    format!("destination credit failed: {err}"),
                );
            }
        }

        // The debit is committed; usage counts from here
        self.limits
            .record_usage(&request.from_account_id, request.amount);
        drop(guards);

        if transfer.destination.is_external() {
            // The instruction is recorded; the credit leg executes
            // out-of-band and is confirmed or failed later
            self.audit.append(
                transfer.from_account_id.clone(),
                EntryType::Transfer,
                format!(
                    "debited {} {} for external settlement ({})",
                    transfer.sending_currency, transfer.amount, transfer.transfer_request_id
                ),
                Some(transfer.amount),
                Some(transfer.sending_currency),
                self.actor.clone(),
            );
            self.alerts.on_balance_change(&debited);
            // Already committed as PROCESSING; re-persisting here could
            // overwrite a settlement confirmation racing ahead of us
            tracing::info!(
                transfer_id = %transfer.transfer_id,
                "external transfer debited, awaiting settlement confirmation"
            );
            return Ok(transfer);
        }

        transfer.transition(TransferState::Settled, None)?;
        self.audit.append(
            transfer.from_account_id.clone(),
            EntryType::Transfer,
            format!(
                "transferred {} {} to {} ({})",
                transfer.sending_currency,
                transfer.amount,
                to_id.as_ref().map(|id| id.to_string()).unwrap_or_default(),
                transfer.transfer_request_id
            ),
            Some(transfer.amount),
            Some(transfer.sending_currency),
            self.actor.clone(),
        );
        self.alerts.on_balance_change(&debited);

        let persisted = self.persist(&transfer)?;
        tracing::info!(
            transfer_id = %persisted.transfer_id,
            amount = %persisted.amount,
            "transfer settled"
        );
        Ok(persisted)
    }

    /// Confirm the out-of-band leg of an external transfer
    pub fn confirm_external_settlement(&self, transfer_id: &TransferId) -> Result<Transfer> {
        let transfer = self.complete_external(transfer_id, TransferState::Settled, None)?;
        self.audit.append(
            transfer.from_account_id.clone(),
            EntryType::Transfer,
            format!("external settlement confirmed ({})", transfer.transfer_request_id),
            Some(transfer.amount),
            Some(transfer.sending_currency),
            self.actor.clone(),
        );
        tracing::info!(transfer_id = %transfer.transfer_id, "external settlement confirmed");
        Ok(transfer)
    }

    /// Mark the out-of-band leg of an external transfer as failed; the
    /// internal debit is compensated.
    ///
    /// The terminal transition is committed first, so a concurrent
    /// completion of the same transfer cannot compensate twice.
    pub async fn mark_external_failure(
        &self,
        transfer_id: &TransferId,
        reason: impl Into<String>,
    ) -> Result<Transfer> {
        let reason = reason.into();
        let transfer =
            self.complete_external(transfer_id, TransferState::Failed, Some(reason.clone()))?;

        let credited = {
            let _guard = self.locks.acquire(&transfer.from_account_id).await;
            self.store.credit(&transfer.from_account_id, transfer.amount)
        };
        if let Err(err) = credited {
            tracing::error!(
                transfer_id = %transfer.transfer_id,
                account_id = %transfer.from_account_id,
                error = %err,
                "compensating credit failed; account requires manual review"
            );
            return Err(err.into());
        }

        self.audit.append(
            transfer.from_account_id.clone(),
            EntryType::Transfer,
            format!(
                "external settlement failed, {} {} returned: {reason}",
                transfer.sending_currency, transfer.amount
            ),
            Some(transfer.amount),
            Some(transfer.sending_currency),
            self.actor.clone(),
        );
        tracing::warn!(transfer_id = %transfer.transfer_id, %reason, "external settlement failed");
        Ok(transfer)
    }

    /// Transfer by system ID
    pub fn get_transfer(&self, transfer_id: &TransferId) -> Option<Transfer> {
        self.transfers.find_by_id(transfer_id)
    }

    /// Transfer by the partner's idempotency key
    pub fn get_transfer_by_request(
        &self,
        partner_id: &PartnerId,
        request_id: &str,
    ) -> Option<Transfer> {
        self.transfers.find_by_request_id(partner_id, request_id)
    }

    /// All transfers of a partner, newest first
    pub fn list_transfers(&self, partner_id: &PartnerId) -> Vec<Transfer> {
        self.transfers.find_by_partner(partner_id)
    }

    // ── Reservations ────────────────────────────────────────────────────

    /// Reserve funds on an account for a pending operation.
    ///
    /// Checks limits, moves the amount from available to reserved, and
    /// records daily usage. Returns the updated account and the
    /// reservation ID.
    pub async fn reserve_funds(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        reference: &str,
    ) -> Result<(Account, String)> {
        if amount <= Decimal::ZERO {
            return Err(custody_core::Error::InvalidAmount(format!(
                "reservation amount must be positive, got {amount}"
            ))
            .into());
        }

        let (account, reservation_id) = {
            let _guard = self.locks.acquire(account_id).await;

            if let LimitDecision::Rejected { reason } = self.limits.check(account_id, amount) {
                drop(_guard);
                self.alerts.on_limit_rejected(account_id, &reason);
                return Err(custody_core::Error::LimitExceeded(reason).into());
            }

            match self.store.reserve(account_id, amount, reference) {
                Ok(result) => {
                    self.limits.record_usage(account_id, amount);
                    result
                }
                Err(err) => {
                    drop(_guard);
                    if let custody_core::Error::InsufficientFunds {
                        requested,
                        available,
                        ..
                    } = &err
                    {
                        if let Some(account) = self.accounts.find_by_id(account_id) {
                            self.alerts.on_insufficient_funds(
                                account_id,
                                account.currency,
                                *requested,
                                *available,
                            );
                        }
                    }
                    return Err(err.into());
                }
            }
        };

        self.audit.append(
            account_id.clone(),
            EntryType::Reserve,
            format!("reserved {} {amount} for {reference}", account.currency),
            Some(amount),
            Some(account.currency),
            self.actor.clone(),
        );
        self.alerts.on_reservation(&account, amount);
        Ok((account, reservation_id))
    }

    /// Return a reservation's funds to available balance
    pub async fn release_reservation(
        &self,
        account_id: &AccountId,
        reservation_id: &str,
    ) -> Result<Account> {
        let account = {
            let _guard = self.locks.acquire(account_id).await;
            self.store.release(account_id, reservation_id)?
        };
        self.audit.append(
            account_id.clone(),
            EntryType::Release,
            format!("reservation {reservation_id} released"),
            None,
            Some(account.currency),
            self.actor.clone(),
        );
        Ok(account)
    }

    /// Finalize a reservation: funds leave the account
    pub async fn confirm_reservation(
        &self,
        account_id: &AccountId,
        reservation_id: &str,
    ) -> Result<Account> {
        let account = {
            let _guard = self.locks.acquire(account_id).await;
            self.store.confirm_reservation(account_id, reservation_id)?
        };
        self.audit.append(
            account_id.clone(),
            EntryType::Confirm,
            format!("reservation {reservation_id} confirmed"),
            None,
            Some(account.currency),
            self.actor.clone(),
        );
        self.alerts.on_balance_change(&account);
        Ok(account)
    }

    // ── Audit & alerts ──────────────────────────────────────────────────

    /// Audit entries, most-recent-first
    pub fn list_audit_log(
        &self,
        account_id: Option<&AccountId>,
        limit: Option<usize>,
    ) -> Vec<TransactionLogEntry> {
        self.audit.list(account_id, limit)
    }

    /// Verify the retained audit chain; `None` means intact
    pub fn verify_audit_chain(&self) -> Option<String> {
        self.audit.verify_chain()
    }

    /// Direct access to the audit log
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Alerts, most-recent-first
    pub fn list_alerts(&self, unread_only: bool) -> Vec<custody_core::Alert> {
        self.alerts.list(unread_only)
    }

    /// Mark an alert read
    pub fn mark_alert_read(&self, alert_id: &str) -> Result<()> {
        Ok(self.alerts.mark_read(alert_id)?)
    }

    /// Delete an alert
    pub fn delete_alert(&self, alert_id: &str) -> Result<()> {
        Ok(self.alerts.delete(alert_id)?)
    }

    // ── Internal helpers ────────────────────────────────────────────────

    /// Commit the terminal state of an external transfer's out-of-band
    /// leg. The state guard and the transition run inside the stored
    /// record's entry lock, so at most one concurrent completion wins.
    fn complete_external(
        &self,
        transfer_id: &TransferId,
        state: TransferState,
        failure_reason: Option<String>,
    ) -> Result<Transfer> {
        self.transfers.update_with(transfer_id, &mut |stored| {
            if !stored.destination.is_external() {
                return Err(Error::InvalidTransfer(format!(
                    "transfer {transfer_id} has an internal destination"
                )));
            }
            if stored.state != TransferState::Processing {
                return Err(Error::InvalidTransfer(format!(
                    "transfer {transfer_id} is {}, expected PROCESSING",
                    stored.state
                )));
            }
            stored.transition(state, failure_reason.clone())
        })
    }

    fn finalize_rejected(&self, mut transfer: Transfer, reason: String) -> Result<Transfer> {
        transfer.transition(TransferState::Rejected, Some(reason.clone()))?;
        self.audit.append(
            transfer.from_account_id.clone(),
            EntryType::Transfer,
            format!("transfer {} rejected: {reason}", transfer.transfer_request_id),
            Some(transfer.amount),
            Some(transfer.sending_currency),
            self.actor.clone(),
        );
        self.alerts
            .on_limit_rejected(&transfer.from_account_id, &reason);
        let persisted = self.persist(&transfer)?;
        tracing::warn!(transfer_id = %persisted.transfer_id, %reason, "transfer rejected");
        Ok(persisted)
    }

    fn finalize_failed(&self, mut transfer: Transfer, reason: String) -> Result<Transfer> {
        transfer.transition(TransferState::Failed, Some(reason.clone()))?;
        self.audit.append(
            transfer.from_account_id.clone(),
            EntryType::Transfer,
            format!("transfer {} failed: {reason}", transfer.transfer_request_id),
            Some(transfer.amount),
            Some(transfer.sending_currency),
            self.actor.clone(),
        );
        let persisted = self.persist(&transfer)?;
        tracing::warn!(transfer_id = %persisted.transfer_id, %reason, "transfer failed");
        Ok(persisted)
    }

    fn persist(&self, transfer: &Transfer) -> Result<Transfer> {
        self.transfers
            .update_with(&transfer.transfer_id, &mut |stored| {
                *stored = transfer.clone();
                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_core::{ClientType, Currency};

    fn engine() -> SettlementEngine {
        SettlementEngine::new(Config::default())
    }

    fn setup_client(engine: &SettlementEngine) -> (PartnerId, ClientId) {
        let credentials = engine
            .create_partner(CreatePartner {
                name: "Acme Payments".to_string(),
                allowed_currencies: vec![Currency::USD, Currency::EUR],
                webhook_url: None,
            })
            .unwrap();
        let client = engine
            .create_client(
                &credentials.partner_id,
                CreateClient {
                    external_client_id: "ext-1".to_string(),
                    legal_name: "Client Ltd".to_string(),
                    country: "GB".to_string(),
                    client_type: ClientType::Fintech,
                    allowed_currencies: vec![Currency::USD],
                },
            )
            .unwrap();
        (credentials.partner_id, client.client_id)
    }

    #[test]
    fn test_partner_secret_surfaced_once() {
        let engine = engine();
        let credentials = engine
            .create_partner(CreatePartner {
                name: "Acme".to_string(),
                allowed_currencies: vec![Currency::USD],
                webhook_url: Some("https://acme.example/webhook".to_string()),
            })
            .unwrap();

        let partner = engine
            .verify_partner_credentials(&credentials.client_id, &credentials.client_secret)
            .unwrap();
        assert_eq!(partner.partner_id, credentials.partner_id);
        // Only the hash is stored
        assert_ne!(partner.client_secret_hash, credentials.client_secret);
        assert!(engine
            .verify_partner_credentials(&credentials.client_id, "sk-wrong")
            .is_none());
    }

    #[test]
    fn test_client_currency_allow_list() {
        let engine = engine();
        let (partner_id, _) = setup_client(&engine);

        let err = engine
            .create_client(
                &partner_id,
                CreateClient {
                    external_client_id: "ext-2".to_string(),
                    legal_name: "Other Ltd".to_string(),
                    country: "CH".to_string(),
                    client_type: ClientType::Wallet,
                    // CHF is not on the partner's allow-list
                    allowed_currencies: vec![Currency::CHF],
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Core(custody_core::Error::CurrencyNotAllowed { .. })
        ));
    }

    #[test]
    fn test_account_creation_audited() {
        let engine = engine();
        let (_, client_id) = setup_client(&engine);

        let account = engine
            .create_account(CreateAccount {
                client_id,
                currency: Currency::USD,
                initial_balance: Some(Decimal::from(1000)),
            })
            .unwrap();

        let entries = engine.list_audit_log(Some(&account.account_id), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Create);
        assert_eq!(engine.verify_audit_chain(), None);
    }

    #[tokio::test]
    async fn test_close_account_requires_no_reservations() {
        let engine = engine();
        let (_, client_id) = setup_client(&engine);
        let account = engine
            .create_account(CreateAccount {
                client_id,
                currency: Currency::USD,
                initial_balance: Some(Decimal::from(500)),
            })
            .unwrap();

        let (_, reservation_id) = engine
            .reserve_funds(&account.account_id, Decimal::from(100), "pending wire")
            .await
            .unwrap();
        assert!(engine.close_account(&account.account_id).await.is_err());

        engine
            .release_reservation(&account.account_id, &reservation_id)
            .await
            .unwrap();
        let closed = engine.close_account(&account.account_id).await.unwrap();
        assert_eq!(closed.status, AccountStatus::Closed);

        // Closed accounts refuse mutation
        let err = engine
            .reserve_funds(&account.account_id, Decimal::from(10), "late")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Core(custody_core::Error::AccountClosed(_))
        ));
    }
}
