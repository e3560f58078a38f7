//! Account store: atomic balance mutations with the split invariant
//!
//! Every mutation runs under the repository's per-account entry lock, so
//! single-account read-modify-write sequences never interleave. The split
//! invariant (`balance == available + reserved`, all non-negative) is
//! rechecked after each mutation; a violation blocks the account and
//! surfaces `InternalInconsistency`.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::repository::AccountRepository;
use crate::types::{
    prefixed_id, Account, AccountId, AccountStatus, BalanceSnapshot, Reservation,
    ReservationStatus,
};

/// Atomic debit/credit/reserve operations over the account repository
pub struct AccountStore {
    repo: Arc<dyn AccountRepository>,
}

impl AccountStore {
    /// Create a store over an account repository
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    /// Increase balance and available balance
    pub fn credit(&self, account_id: &AccountId, amount: Decimal) -> Result<Account> {
        validate_amount(amount)?;
        self.mutate(account_id, |account| {
            account.balance += amount;
            account.available_balance += amount;
            Ok(())
        })
    }

    /// Decrease balance and available balance; requires sufficient availability
    pub fn debit(&self, account_id: &AccountId, amount: Decimal) -> Result<Account> {
        validate_amount(amount)?;
        self.mutate(account_id, |account| {
            if account.available_balance < amount {
                return Err(Error::InsufficientFunds {
                    account_id: account.account_id.clone(),
                    requested: amount,
                    available: account.available_balance,
                });
            }
            account.balance -= amount;
            account.available_balance -= amount;
            Ok(())
        })
    }

    /// Move funds from available to reserved; total balance unchanged.
    ///
    /// Returns the updated account and the new reservation's ID.
    pub fn reserve(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        reference: &str,
    ) -> Result<(Account, String)> {
        validate_amount(amount)?;
        let reservation_id = prefixed_id("RSV");
        let id_for_closure = reservation_id.clone();
        let reference = reference.to_string();

        let account = self.mutate(account_id, move |account| {
            if account.available_balance < amount {
                return Err(Error::InsufficientFunds {
                    account_id: account.account_id.clone(),
                    requested: amount,
                    available: account.available_balance,
                });
            }
            account.available_balance -= amount;
            account.reserved_balance += amount;
            account.reservations.push(Reservation {
                id: id_for_closure.clone(),
                amount,
                reference: reference.clone(),
                status: ReservationStatus::Reserved,
                created_at: Utc::now(),
            });
            Ok(())
        })?;

        Ok((account, reservation_id))
    }

    /// Return a held reservation to available balance
    pub fn release(&self, account_id: &AccountId, reservation_id: &str) -> Result<Account> {
        let reservation_id = reservation_id.to_string();
        self.mutate(account_id, move |account| {
            let reservation = take_held_reservation(account, &reservation_id)?;
            account.reserved_balance -= reservation.amount;
            account.available_balance += reservation.amount;
            set_reservation_status(account, &reservation_id, ReservationStatus::Released);
            Ok(())
        })
    }

    /// Finalize a reservation: funds leave both reserved and total balance
    pub fn confirm_reservation(
        &self,
        account_id: &AccountId,
        reservation_id: &str,
    ) -> Result<Account> {
        let reservation_id = reservation_id.to_string();
        self.mutate(account_id, move |account| {
            let reservation = take_held_reservation(account, &reservation_id)?;
            account.reserved_balance -= reservation.amount;
            account.balance -= reservation.amount;
            set_reservation_status(account, &reservation_id, ReservationStatus::Confirmed);
            Ok(())
        })
    }

    /// Three-way balance view
    pub fn balance(&self, account_id: &AccountId) -> Result<BalanceSnapshot> {
        let account = self
            .repo
            .find_by_id(account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.clone()))?;
        Ok(account.balance_snapshot())
    }

    /// Run one balance mutation under the account's entry lock.
    ///
    /// Refuses blocked and closed accounts up front; after the mutation,
    /// rechecks the split invariant and blocks the account on violation.
    fn mutate(
        &self,
        account_id: &AccountId,
        f: impl FnMut(&mut Account) -> Result<()>,
    ) -> Result<Account> {
        let mut f = f;
        self.repo.update_with(account_id, &mut |account| {
            match account.status {
                AccountStatus::Active => {}
                AccountStatus::Blocked => {
                    return Err(Error::AccountBlocked(account.account_id.clone()))
                }
                AccountStatus::Closed => {
                    return Err(Error::AccountClosed(account.account_id.clone()))
                }
            }

            f(account)?;

            if !account.split_ok() {
                account.status = AccountStatus::Blocked;
                tracing::error!(
                    account_id = %account.account_id,
                    balance = %account.balance,
                    available = %account.available_balance,
                    reserved = %account.reserved_balance,
                    "balance split invariant violated; account blocked"
                );
                return Err(Error::InternalInconsistency(format!(
                    "balance split mismatch on {}",
                    account.account_id
                )));
            }

            account.last_transaction_at = Some(Utc::now());
            Ok(())
        })
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn take_held_reservation(account: &Account, reservation_id: &str) -> Result<Reservation> {
    account
        .reservations
        .iter()
        .find(|r| r.id == reservation_id && r.status == ReservationStatus::Reserved)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("held reservation {reservation_id}")))
}

fn set_reservation_status(account: &mut Account, reservation_id: &str, status: ReservationStatus) {
    if let Some(reservation) = account
        .reservations
        .iter_mut()
        .find(|r| r.id == reservation_id)
    {
        reservation.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryAccountRepository;
    use crate::types::{ClientId, CreateAccount, Currency};

    fn store_with_account(initial: i64) -> (AccountStore, AccountId) {
        let repo = Arc::new(InMemoryAccountRepository::new());
        let account = repo.create(CreateAccount {
            client_id: ClientId::generate(),
            currency: Currency::USD,
            initial_balance: Some(Decimal::from(initial)),
        });
        (AccountStore::new(repo), account.account_id)
    }

    #[test]
    fn test_credit_and_debit() {
        let (store, id) = store_with_account(1000);

        let account = store.credit(&id, Decimal::from(250)).unwrap();
        assert_eq!(account.balance, Decimal::from(1250));
        assert_eq!(account.available_balance, Decimal::from(1250));

        let account = store.debit(&id, Decimal::from(300)).unwrap();
        assert_eq!(account.balance, Decimal::from(950));
        assert_eq!(account.available_balance, Decimal::from(950));
        assert!(account.split_ok());
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let (store, id) = store_with_account(100);

        let err = store.debit(&id, Decimal::from(200)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        // No partial application
        let snapshot = store.balance(&id).unwrap();
        assert_eq!(snapshot.balance, Decimal::from(100));
        assert_eq!(snapshot.available_balance, Decimal::from(100));
    }

    #[test]
    fn test_invalid_amounts_rejected_before_lookup() {
        let (store, _) = store_with_account(100);
        let missing = AccountId::new("ACC-USD-missing");

        // Zero/negative amounts fail with InvalidAmount even for unknown accounts
        assert!(matches!(
            store.credit(&missing, Decimal::ZERO).unwrap_err(),
            Error::InvalidAmount(_)
        ));
        assert!(matches!(
            store.debit(&missing, Decimal::from(-5)).unwrap_err(),
            Error::InvalidAmount(_)
        ));
    }

    #[test]
    fn test_reserve_release_confirm() {
        let (store, id) = store_with_account(1000);

        let (account, rsv) = store.reserve(&id, Decimal::from(400), "wire out").unwrap();
        assert_eq!(account.balance, Decimal::from(1000));
        assert_eq!(account.available_balance, Decimal::from(600));
        assert_eq!(account.reserved_balance, Decimal::from(400));

        // Release returns the funds to available
        let account = store.release(&id, &rsv).unwrap();
        assert_eq!(account.available_balance, Decimal::from(1000));
        assert_eq!(account.reserved_balance, Decimal::ZERO);

        // A released reservation cannot be confirmed
        assert!(matches!(
            store.confirm_reservation(&id, &rsv).unwrap_err(),
            Error::NotFound(_)
        ));

        // Confirm removes funds from both reserved and total
        let (_, rsv2) = store.reserve(&id, Decimal::from(250), "tokenize").unwrap();
        let account = store.confirm_reservation(&id, &rsv2).unwrap();
        assert_eq!(account.balance, Decimal::from(750));
        assert_eq!(account.available_balance, Decimal::from(750));
        assert_eq!(account.reserved_balance, Decimal::ZERO);
        assert!(account.split_ok());
    }

    #[test]
    fn test_reserve_exceeding_available() {
        let (store, id) = store_with_account(100);
        let err = store.reserve(&id, Decimal::from(500), "too much").unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
    }

    #[test]
    fn test_blocked_account_refuses_mutation() {
        let repo = Arc::new(InMemoryAccountRepository::new());
        let account = repo.create(CreateAccount {
            client_id: ClientId::generate(),
            currency: Currency::USD,
            initial_balance: Some(Decimal::from(100)),
        });
        let id = account.account_id.clone();

        // Corrupt the split out-of-band, then trip the invariant check
        repo.update_with(&id, &mut |a| {
            a.available_balance += Decimal::from(1);
            Ok(())
        })
        .unwrap();

        let store = AccountStore::new(repo);
        let err = store.credit(&id, Decimal::from(10)).unwrap_err();
        assert!(matches!(err, Error::InternalInconsistency(_)));

        // The account is now blocked; further mutation is refused
        let err = store.credit(&id, Decimal::from(10)).unwrap_err();
        assert!(matches!(err, Error::AccountBlocked(_)));
    }
}
