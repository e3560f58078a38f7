//! Repository ports and in-memory implementations
//!
//! The core never reaches into ambient storage: each entity family is a
//! trait port, and the reference implementations here are keyed in-memory
//! maps with secondary indices. A durable store can replace them without
//! touching the core logic.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::{
    Account, AccountId, AccountStatus, Client, ClientId, ClientStatus, CreateAccount,
    CreateClient, CreatePartner, Partner, PartnerId, PartnerStatus,
};

/// Partner persistence port
pub trait PartnerRepository: Send + Sync {
    /// Create a partner with pre-generated credentials
    fn create(&self, req: CreatePartner, client_id: String, client_secret_hash: String)
        -> Partner;

    /// Find by partner ID
    fn find_by_id(&self, partner_id: &PartnerId) -> Option<Partner>;

    /// Find by API client ID
    fn find_by_client_id(&self, client_id: &str) -> Option<Partner>;

    /// List all partners
    fn list(&self) -> Vec<Partner>;
}

/// Client persistence port
pub trait ClientRepository: Send + Sync {
    /// Create a client under a partner
    fn create(&self, partner_id: PartnerId, req: CreateClient) -> Client;

    /// Find by client ID
    fn find_by_id(&self, client_id: &ClientId) -> Option<Client>;

    /// All clients of a partner
    fn find_by_partner(&self, partner_id: &PartnerId) -> Vec<Client>;

    /// Update lifecycle status; fails with `NotFound` for unknown IDs
    fn update_status(&self, client_id: &ClientId, status: ClientStatus) -> Result<Client>;
}

/// Account persistence port
///
/// `update_with` is the single mutation path: the closure runs under the
/// entry lock for the account, so read-modify-write sequences on one
/// account never interleave. Mutations made by the closure persist even
/// when it returns an error — the store relies on this to flip an account
/// to `Blocked` while surfacing the failure.
pub trait AccountRepository: Send + Sync {
    /// Create an account, optionally seeded with an initial balance
    fn create(&self, req: CreateAccount) -> Account;

    /// Find by account ID
    fn find_by_id(&self, account_id: &AccountId) -> Option<Account>;

    /// All accounts of a client
    fn find_by_client(&self, client_id: &ClientId) -> Vec<Account>;

    /// Atomically mutate one account; returns the updated account
    fn update_with(
        &self,
        account_id: &AccountId,
        f: &mut dyn FnMut(&mut Account) -> Result<()>,
    ) -> Result<Account>;
}

/// In-memory partner repository
#[derive(Debug, Default)]
pub struct InMemoryPartnerRepository {
    partners: DashMap<PartnerId, Partner>,
    // client_id -> partner_id
    client_id_index: DashMap<String, PartnerId>,
}

impl InMemoryPartnerRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartnerRepository for InMemoryPartnerRepository {
    fn create(
        &self,
        req: CreatePartner,
        client_id: String,
        client_secret_hash: String,
    ) -> Partner {
        let now = Utc::now();
        let partner = Partner {
            partner_id: PartnerId::generate(),
            name: req.name,
            client_id: client_id.clone(),
            client_secret_hash,
            allowed_currencies: req.allowed_currencies,
            webhook_url: req.webhook_url,
            status: PartnerStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.client_id_index
            .insert(client_id, partner.partner_id.clone());
        self.partners
            .insert(partner.partner_id.clone(), partner.clone());

        tracing::debug!(partner_id = %partner.partner_id, "partner created");
        partner
    }

    fn find_by_id(&self, partner_id: &PartnerId) -> Option<Partner> {
        self.partners.get(partner_id).map(|p| p.clone())
    }

    fn find_by_client_id(&self, client_id: &str) -> Option<Partner> {
        let partner_id = self.client_id_index.get(client_id)?.clone();
        self.find_by_id(&partner_id)
    }

    fn list(&self) -> Vec<Partner> {
        self.partners.iter().map(|p| p.clone()).collect()
    }
}

/// In-memory client repository
#[derive(Debug, Default)]
pub struct InMemoryClientRepository {
    clients: DashMap<ClientId, Client>,
    // partner_id -> client ids
    partner_index: DashMap<PartnerId, Vec<ClientId>>,
}

impl InMemoryClientRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientRepository for InMemoryClientRepository {
    fn create(&self, partner_id: PartnerId, req: CreateClient) -> Client {
        let now = Utc::now();
        let client = Client {
            client_id: ClientId::generate(),
            partner_id: partner_id.clone(),
            external_client_id: req.external_client_id,
            legal_name: req.legal_name,
            country: req.country,
            client_type: req.client_type,
            allowed_currencies: req.allowed_currencies,
            status: ClientStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.partner_index
            .entry(partner_id)
            .or_default()
            .push(client.client_id.clone());
        self.clients
            .insert(client.client_id.clone(), client.clone());

        tracing::debug!(client_id = %client.client_id, "client created");
        client
    }

    fn find_by_id(&self, client_id: &ClientId) -> Option<Client> {
        self.clients.get(client_id).map(|c| c.clone())
    }

    fn find_by_partner(&self, partner_id: &PartnerId) -> Vec<Client> {
        let ids = match self.partner_index.get(partner_id) {
            Some(ids) => ids.clone(),
            None => return vec![],
        };
        ids.iter()
            .filter_map(|id| self.clients.get(id).map(|c| c.clone()))
            .collect()
    }

    fn update_status(&self, client_id: &ClientId, status: ClientStatus) -> Result<Client> {
        let mut client = self
            .clients
            .get_mut(client_id)
            .ok_or_else(|| Error::NotFound(format!("client {client_id}")))?;
        client.status = status;
        client.updated_at = Utc::now();
        Ok(client.clone())
    }
}

/// In-memory account repository
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: DashMap<AccountId, Account>,
    // client_id -> account ids
    client_index: DashMap<ClientId, Vec<AccountId>>,
}

impl InMemoryAccountRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn create(&self, req: CreateAccount) -> Account {
        let now = Utc::now();
        let initial = req.initial_balance.unwrap_or(Decimal::ZERO);
        let account = Account {
            account_id: AccountId::generate(req.currency),
            client_id: req.client_id.clone(),
            currency: req.currency,
            balance: initial,
            available_balance: initial,
            reserved_balance: Decimal::ZERO,
            status: AccountStatus::Active,
            reservations: vec![],
            created_at: now,
            updated_at: now,
            last_transaction_at: None,
        };

        self.client_index
            .entry(req.client_id)
            .or_default()
            .push(account.account_id.clone());
        self.accounts
            .insert(account.account_id.clone(), account.clone());

        tracing::debug!(account_id = %account.account_id, currency = %account.currency, "account created");
        account
    }

    fn find_by_id(&self, account_id: &AccountId) -> Option<Account> {
        self.accounts.get(account_id).map(|a| a.clone())
    }

    fn find_by_client(&self, client_id: &ClientId) -> Vec<Account> {
        let ids = match self.client_index.get(client_id) {
            Some(ids) => ids.clone(),
            None => return vec![],
        };
        ids.iter()
            .filter_map(|id| self.accounts.get(id).map(|a| a.clone()))
            .collect()
    }

    fn update_with(
        &self,
        account_id: &AccountId,
        f: &mut dyn FnMut(&mut Account) -> Result<()>,
    ) -> Result<Account> {
        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.clone()))?;

        let outcome = f(&mut account);
        account.updated_at = Utc::now();
        outcome.map(|()| account.clone())
    }
}
