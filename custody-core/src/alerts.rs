//! Alert engine
//!
//! Derives notifications from limit and audit events: low available
//! balance, large reservations, limit breaches. Alerts are idempotent by
//! content within a short window so repeated triggers do not spam.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AlertConfig;
use crate::error::{Error, Result};
use crate::types::{prefixed_id, Account, AccountId, Currency};

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    /// Available balance is low or a debit/reserve was refused for funds
    BalanceLow,
    /// A reservation takes a large fraction of the total balance
    LargeReserve,
    /// Security-relevant event
    Security,
    /// Limit breach or other compliance event
    Compliance,
    /// Informational
    Info,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational
    Low,
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Needs immediate attention
    Critical,
}

/// Derived notification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert ID
    pub id: String,
    /// Affected account
    pub account_id: AccountId,
    /// Category
    pub alert_type: AlertType,
    /// Severity
    pub severity: Severity,
    /// Short title
    pub title: String,
    /// Full message
    pub message: String,
    /// Whether the alert has been read
    pub read: bool,
    /// Whether manual action is required
    pub action_required: bool,
    /// Created timestamp
    pub timestamp: DateTime<Utc>,
}

/// Alert engine with content dedup and bounded retention
pub struct AlertEngine {
    // Oldest first; retrieval reverses
    alerts: RwLock<Vec<Alert>>,
    config: AlertConfig,
}

impl AlertEngine {
    /// Create an engine with the given thresholds
    pub fn new(config: AlertConfig) -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Raise an alert; identical content within the dedup window collapses
    /// to the existing alert
    pub fn raise(
        &self,
        account_id: AccountId,
        alert_type: AlertType,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
        action_required: bool,
    ) -> Alert {
        let title = title.into();
        let message = message.into();
        let now = Utc::now();
        let window = Duration::seconds(self.config.dedup_window_secs);

        let mut alerts = self.alerts.write();
        if let Some(existing) = alerts.iter().rev().find(|a| {
            a.account_id == account_id
                && a.alert_type == alert_type
                && a.message == message
                && now - a.timestamp <= window
        }) {
            return existing.clone();
        }

        let alert = Alert {
            id: prefixed_id("ALT"),
            account_id,
            alert_type,
            severity,
            title,
            message,
            read: false,
            action_required,
            timestamp: now,
        };

        alerts.push(alert.clone());
        if alerts.len() > self.config.max_alerts {
            let excess = alerts.len() - self.config.max_alerts;
            alerts.drain(..excess);
        }

        tracing::warn!(
            alert_id = %alert.id,
            account_id = %alert.account_id,
            severity = ?alert.severity,
            title = %alert.title,
            "alert raised"
        );
        alert
    }

    /// Alerts most-recent-first, optionally unread only
    pub fn list(&self, unread_only: bool) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .rev()
            .filter(|a| !unread_only || !a.read)
            .cloned()
            .collect()
    }

    /// Mark an alert read
    pub fn mark_read(&self, alert_id: &str) -> Result<()> {
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| Error::NotFound(format!("alert {alert_id}")))?;
        alert.read = true;
        Ok(())
    }

    /// Delete an alert
    pub fn delete(&self, alert_id: &str) -> Result<()> {
        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|a| a.id != alert_id);
        if alerts.len() == before {
            return Err(Error::NotFound(format!("alert {alert_id}")));
        }
        Ok(())
    }

    // Derivation rules

    /// A debit or reservation was refused for insufficient funds
    pub fn on_insufficient_funds(
        &self,
        account_id: &AccountId,
        currency: Currency,
        requested: Decimal,
        available: Decimal,
    ) {
        self.raise(
            account_id.clone(),
            AlertType::BalanceLow,
            Severity::High,
            "Insufficient balance",
            format!(
                "Attempted to use {currency} {requested} but only {available} is available"
            ),
            true,
        );
    }

    /// An operation was rejected by the limits engine
    pub fn on_limit_rejected(&self, account_id: &AccountId, reason: &str) {
        self.raise(
            account_id.clone(),
            AlertType::Compliance,
            Severity::High,
            "Operation limit exceeded",
            reason.to_string(),
            true,
        );
    }

    /// A reservation was placed; alert when it is a large share of balance
    pub fn on_reservation(&self, account: &Account, amount: Decimal) {
        if account.balance.is_zero() {
            return;
        }
        let fraction = amount / account.balance;
        if fraction <= self.config.large_reserve_fraction {
            return;
        }
        let severity = if fraction > self.config.critical_reserve_fraction {
            Severity::High
        } else {
            Severity::Medium
        };
        self.raise(
            account.account_id.clone(),
            AlertType::LargeReserve,
            severity,
            "Large reservation",
            format!(
                "Reserved {} {amount}, {:.1}% of total balance",
                account.currency,
                fraction * Decimal::from(100)
            ),
            false,
        );
    }

    /// Balances changed; alert when available dropped below the floor
    pub fn on_balance_change(&self, account: &Account) {
        if self.config.low_balance_floor.is_zero() {
            return;
        }
        if account.available_balance < self.config.low_balance_floor {
            self.raise(
                account.account_id.clone(),
                AlertType::BalanceLow,
                Severity::Medium,
                "Low available balance",
                format!(
                    "Available balance {} {} is below the configured floor {}",
                    account.currency, account.available_balance, self.config.low_balance_floor
                ),
                false,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, ClientId};

    fn engine() -> AlertEngine {
        AlertEngine::new(AlertConfig::default())
    }

    fn account(balance: i64, available: i64, reserved: i64) -> Account {
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
    fn test_dedup_within_window() {
        let engine = engine();
        let id = AccountId::new("ACC-USD-1");

        let first = engine.raise(
            id.clone(),
            AlertType::Compliance,
            Severity::High,
            "Limit",
            "daily cap reached",
            true,
        );
        let second = engine.raise(
            id.clone(),
            AlertType::Compliance,
            Severity::High,
            "Limit",
            "daily cap reached",
            true,
        );
        assert_eq!(first.id, second.id);
        assert_eq!(engine.list(false).len(), 1);

        // Different message is a new alert
        engine.raise(
            id,
            AlertType::Compliance,
            Severity::High,
            "Limit",
            "per-operation cap reached",
            true,
        );
        assert_eq!(engine.list(false).len(), 2);
    }

    #[test]
    fn test_mark_read_and_unread_filter() {
        let engine = engine();
        let alert = engine.raise(
            AccountId::new("ACC-USD-1"),
            AlertType::Info,
            Severity::Low,
            "Note",
            "something happened",
            false,
        );

        assert_eq!(engine.list(true).len(), 1);
        engine.mark_read(&alert.id).unwrap();
        assert_eq!(engine.list(true).len(), 0);
        assert_eq!(engine.list(false).len(), 1);
    }

    #[test]
    fn test_delete() {
        let engine = engine();
        let alert = engine.raise(
            AccountId::new("ACC-USD-1"),
            AlertType::Info,
            Severity::Low,
            "Note",
            "x",
            false,
        );
        engine.delete(&alert.id).unwrap();
        assert!(engine.list(false).is_empty());
        assert!(matches!(engine.delete(&alert.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_large_reserve_severity_split() {
        let engine = engine();

        // 40% of balance: medium
        engine.on_reservation(&account(1000, 600, 400), Decimal::from(400));
        let alerts = engine.list(false);
        assert_eq!(alerts[0].alert_type, AlertType::LargeReserve);
        assert_eq!(alerts[0].severity, Severity::Medium);

        // 60% of balance: high
        engine.on_reservation(&account(1000, 400, 600), Decimal::from(600));
        let alerts = engine.list(false);
        assert_eq!(alerts[0].severity, Severity::High);

        // 10% of balance: no alert
        let engine = AlertEngine::new(AlertConfig::default());
        engine.on_reservation(&account(1000, 900, 100), Decimal::from(100));
        assert!(engine.list(false).is_empty());
    }

    #[test]
    fn test_low_balance_floor() {
        let config = AlertConfig {
            low_balance_floor: Decimal::from(100),
            ..AlertConfig::default()
        };
        let engine = AlertEngine::new(config);

        engine.on_balance_change(&account(500, 500, 0));
        assert!(engine.list(false).is_empty());

        engine.on_balance_change(&account(50, 50, 0));
        let alerts = engine.list(false);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::BalanceLow);
    }
}
