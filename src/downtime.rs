//! Downtime Reporting Policy
//!
//! Validation of reported downtime windows. All checks run before anything
//! is written, in a fixed order: range, reporting window, duration, overlap.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::DowntimeConfig;
use crate::models::ServiceDowntime;

/// Why a downtime report was rejected. Carried inside
/// [`CloudBillError::Validation`](crate::CloudBillError::Validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DowntimeViolation {
    #[error("downtime must start before it ends")]
    InvalidRange,

    #[error("downtime start is outside of the allowed reporting window")]
    OutsideReportWindow,

    #[error("downtime duration exceeds the allowed maximum")]
    TooLong,

    #[error("downtime overlaps an existing downtime of the same resource")]
    Overlapping,
}

/// Validate a downtime window against the policy and the resource's already
/// registered downtimes. First failure wins.
pub fn validate(
    config: &DowntimeConfig,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &[ServiceDowntime],
) -> Result<(), DowntimeViolation> {
    if start >= end {
        return Err(DowntimeViolation::InvalidRange);
    }
    // Downtime is reported retroactively: the start must fall inside the
    // lookback window [now - max_report_age, now].
    if start > now || now - start > config.max_report_age() {
        return Err(DowntimeViolation::OutsideReportWindow);
    }
    if end - start > config.max_duration() {
        return Err(DowntimeViolation::TooLong);
    }
    if existing
        .iter()
        .any(|other| other.start < end && start < other.end)
    {
        return Err(DowntimeViolation::Overlapping);
    }
    Ok(())
}
