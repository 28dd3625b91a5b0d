use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compensation::AdjustmentMode;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub downtime: DowntimeConfig,
    /// Days between the invoice date and the payment due date.
    pub payment_interval_days: i64,
    /// Numeric offset added to the internal id to form the customer-facing
    /// invoice number.
    pub invoice_number_offset: u64,
    /// Tax percent applied to invoices created for customers without an
    /// explicit rate, 0-100.
    pub default_tax_percent: Decimal,
    /// How registered downtime adjusts billing.
    pub adjustment_mode: AdjustmentMode,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            downtime: DowntimeConfig::default(),
            payment_interval_days: 30,
            invoice_number_offset: 100_000,
            default_tax_percent: Decimal::ZERO,
            adjustment_mode: AdjustmentMode::Compensation,
        }
    }
}

impl BillingConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }
}

/// Limits on reported downtime windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DowntimeConfig {
    /// How far in the past a downtime may start, in hours.
    pub max_report_age_hours: i64,
    /// Maximum length of a single downtime window, in hours.
    pub max_duration_hours: i64,
}

impl Default for DowntimeConfig {
    fn default() -> Self {
        Self {
            max_report_age_hours: 31 * 24,
            max_duration_hours: 30 * 24,
        }
    }
}

impl DowntimeConfig {
    pub fn max_report_age(&self) -> Duration {
        Duration::hours(self.max_report_age_hours)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::hours(self.max_duration_hours)
    }
}
