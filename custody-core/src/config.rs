//! Configuration for the custody core

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Custody core configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Alert thresholds and retention
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Audit log retention
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Alert engine configuration
///
/// Thresholds are policy knobs, not normative behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Raise `balance_low` when available balance drops below this floor.
    /// Zero disables the floor check.
    pub low_balance_floor: Decimal,

    /// Fraction of total balance above which a reservation counts as large
    pub large_reserve_fraction: Decimal,

    /// Fraction above which a large reservation is raised at high severity
    pub critical_reserve_fraction: Decimal,

    /// Window within which identical alerts collapse (seconds)
    pub dedup_window_secs: i64,

    /// Keep at most this many alerts
    pub max_alerts: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            low_balance_floor: Decimal::ZERO,
            large_reserve_fraction: Decimal::new(30, 2), // 0.30
            critical_reserve_fraction: Decimal::new(50, 2), // 0.50
            dedup_window_secs: 30,
            max_alerts: 500,
        }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Keep at most this many entries (newest retained)
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.audit.max_entries, 1000);
        assert_eq!(config.alerts.max_alerts, 500);
        assert_eq!(config.alerts.large_reserve_fraction, Decimal::new(30, 2));
        assert!(config.alerts.low_balance_floor.is_zero());
    }
}
