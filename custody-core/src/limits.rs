//! Per-account operation limits
//!
//! Daily and per-operation caps with an approval threshold. The daily
//! counter rolls over on the first check or usage of a new calendar day;
//! the rollover happens inside the same entry lock as the evaluation, so
//! a stale counter can never leak into a decision.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::AccountId;

/// Configured limits and running daily usage for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLimit {
    /// Account these limits apply to
    pub account_id: AccountId,
    /// Cap on the sum of operations per calendar day
    pub daily_limit: Decimal,
    /// Cap on a single operation
    pub per_operation_limit: Decimal,
    /// Amounts above this require approval (still within caps)
    pub requires_approval_above: Decimal,
    /// Advisory lower band: amounts below this always auto-approve
    pub auto_approve_below: Decimal,
    /// Usage accumulated today
    pub daily_used: Decimal,
    /// Start of the current usage day
    pub last_reset: DateTime<Utc>,
}

/// Outcome of a limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitDecision {
    /// Within caps and below the approval threshold
    Allowed,
    /// Within caps but above the approval threshold
    AllowedRequiresApproval,
    /// Over a cap; the operation must not proceed
    Rejected {
        /// Human-readable cap description
        reason: String,
    },
}

impl LimitDecision {
    /// True unless rejected
    pub fn is_allowed(&self) -> bool {
        !matches!(self, LimitDecision::Rejected { .. })
    }
}

/// Limits engine over per-account limit records
#[derive(Debug, Default)]
pub struct LimitsEngine {
    limits: DashMap<AccountId, OperationLimit>,
}

impl LimitsEngine {
    /// Create an empty engine; accounts without limits are unrestricted
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure limits for an account.
    ///
    /// Reconfiguring an already-limited account keeps its accumulated
    /// `daily_used` and `last_reset`, so mid-day limit changes cannot be
    /// used to bypass the daily cap. Usage starts at zero only on first
    /// configuration.
    pub fn set_limits(
        &self,
        account_id: AccountId,
        daily_limit: Decimal,
        per_operation_limit: Decimal,
        requires_approval_above: Decimal,
        auto_approve_below: Decimal,
    ) {
        tracing::info!(
            account_id = %account_id,
            %daily_limit,
            %per_operation_limit,
            "operation limits configured"
        );
        match self.limits.entry(account_id) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.daily_limit = daily_limit;
                entry.per_operation_limit = per_operation_limit;
                entry.requires_approval_above = requires_approval_above;
                entry.auto_approve_below = auto_approve_below;
            }
            Entry::Vacant(vacant) => {
                let account_id = vacant.key().clone();
                vacant.insert(OperationLimit {
                    account_id,
                    daily_limit,
                    per_operation_limit,
                    requires_approval_above,
                    auto_approve_below,
                    daily_used: Decimal::ZERO,
                    last_reset: Utc::now(),
                });
            }
        }
    }

    /// Current limits for an account, after any due rollover
    pub fn get(&self, account_id: &AccountId) -> Option<OperationLimit> {
        let mut entry = self.limits.get_mut(account_id)?;
        rollover_if_due(&mut entry, Utc::now());
        Some(entry.clone())
    }

    /// Evaluate an amount against the account's limits
    pub fn check(&self, account_id: &AccountId, amount: Decimal) -> LimitDecision {
        self.check_at(account_id, amount, Utc::now())
    }

    /// Evaluate at an explicit instant (rollover-sensitive paths in tests)
    pub fn check_at(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> LimitDecision {
        let mut entry = match self.limits.get_mut(account_id) {
            Some(entry) => entry,
            None => return LimitDecision::Allowed,
        };
        rollover_if_due(&mut entry, now);

        if amount > entry.per_operation_limit {
            return LimitDecision::Rejected {
                reason: format!(
                    "amount {amount} exceeds per-operation limit {}",
                    entry.per_operation_limit
                ),
            };
        }

        if entry.daily_used + amount > entry.daily_limit {
            return LimitDecision::Rejected {
                reason: format!(
                    "amount {amount} would exceed daily limit {} (used {})",
                    entry.daily_limit, entry.daily_used
                ),
            };
        }

        if amount > entry.requires_approval_above {
            return LimitDecision::AllowedRequiresApproval;
        }

        LimitDecision::Allowed
    }

    /// Record committed usage against the daily counter.
    ///
    /// Call only after the corresponding operation has been committed,
    /// never speculatively.
    pub fn record_usage(&self, account_id: &AccountId, amount: Decimal) {
        self.record_usage_at(account_id, amount, Utc::now());
    }

    /// Record usage at an explicit instant
    pub fn record_usage_at(&self, account_id: &AccountId, amount: Decimal, now: DateTime<Utc>) {
        if let Some(mut entry) = self.limits.get_mut(account_id) {
            rollover_if_due(&mut entry, now);
            entry.daily_used += amount;
        }
    }
}

/// Zero the daily counter when the calendar day has changed
fn rollover_if_due(limit: &mut OperationLimit, now: DateTime<Utc>) {
    if limit.last_reset.date_naive() != now.date_naive() {
        limit.daily_used = Decimal::ZERO;
        limit.last_reset = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn engine_with_limits() -> (LimitsEngine, AccountId) {
        let engine = LimitsEngine::new();
        let id = AccountId::new("ACC-USD-1");
        engine.set_limits(
            id.clone(),
            Decimal::from(1000), // daily
            Decimal::from(500),  // per operation
            Decimal::from(300),  // approval above
            Decimal::from(100),  // auto approve below
        );
        (engine, id)
    }

    #[test]
    fn test_unconfigured_account_unrestricted() {
        let engine = LimitsEngine::new();
        let decision = engine.check(&AccountId::new("ACC-EUR-9"), Decimal::from(1_000_000));
        assert_eq!(decision, LimitDecision::Allowed);
    }

    #[test]
    fn test_per_operation_cap() {
        let (engine, id) = engine_with_limits();
        assert!(matches!(
            engine.check(&id, Decimal::from(600)),
            LimitDecision::Rejected { .. }
        ));
        assert_eq!(engine.check(&id, Decimal::from(200)), LimitDecision::Allowed);
    }

    #[test]
    fn test_daily_cap_accumulates() {
        let (engine, id) = engine_with_limits();

        assert!(engine.check(&id, Decimal::from(400)).is_allowed());
        engine.record_usage(&id, Decimal::from(400));
        assert!(engine.check(&id, Decimal::from(400)).is_allowed());
        engine.record_usage(&id, Decimal::from(400));

        // 800 used; another 400 would exceed the 1000 daily cap
        assert!(matches!(
            engine.check(&id, Decimal::from(400)),
            LimitDecision::Rejected { .. }
        ));

        // Rejection does not consume usage
        assert_eq!(engine.get(&id).unwrap().daily_used, Decimal::from(800));
    }

    #[test]
    fn test_approval_threshold() {
        let (engine, id) = engine_with_limits();
        assert_eq!(
            engine.check(&id, Decimal::from(350)),
            LimitDecision::AllowedRequiresApproval
        );
        assert_eq!(engine.check(&id, Decimal::from(300)), LimitDecision::Allowed);
    }

    #[test]
    fn test_reconfigure_keeps_daily_usage() {
        let (engine, id) = engine_with_limits();
        engine.record_usage(&id, Decimal::from(800));

        // Raising the caps mid-day must not wipe the accumulated usage
        engine.set_limits(
            id.clone(),
            Decimal::from(2000),
            Decimal::from(900),
            Decimal::from(600),
            Decimal::from(200),
        );
        let limit = engine.get(&id).unwrap();
        assert_eq!(limit.daily_used, Decimal::from(800));
        assert_eq!(limit.daily_limit, Decimal::from(2000));

        // 800 used + 900 would still exceed the reconfigured daily cap
        engine.record_usage(&id, Decimal::from(400));
        assert!(matches!(
            engine.check(&id, Decimal::from(900)),
            LimitDecision::Rejected { .. }
        ));
    }

    #[test]
    fn test_daily_rollover() {
        let (engine, id) = engine_with_limits();
        let today = Utc::now();

        engine.record_usage_at(&id, Decimal::from(900), today);
        assert!(matches!(
            engine.check_at(&id, Decimal::from(200), today),
            LimitDecision::Rejected { .. }
        ));

        // The next calendar day starts fresh
        let tomorrow = today + Duration::days(1);
        assert!(engine.check_at(&id, Decimal::from(200), tomorrow).is_allowed());
        assert_eq!(engine.get(&id).unwrap().daily_used, Decimal::ZERO);
    }
}
