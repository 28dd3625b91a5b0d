//! Billing Events
//!
//! Fire-and-forget structured events emitted on invoice state transitions,
//! downtime registration/removal and ledger item lifecycle. Sinks may fail;
//! the engine logs the failure and carries on, so event delivery can never
//! break a billing operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::InvoiceState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingEvent {
    /// Emitted with an explicit before/after pair instead of relying on any
    /// storage-level change tracking.
    InvoiceStateChanged {
        invoice: Uuid,
        customer: Uuid,
        from: InvoiceState,
        to: InvoiceState,
    },
    ItemOpened {
        invoice: Uuid,
        item: u64,
        source: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    ItemTerminated {
        invoice: Uuid,
        item: u64,
        end: DateTime<Utc>,
    },
    DowntimeReported {
        downtime: Uuid,
        resource: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    DowntimeRemoved {
        downtime: Uuid,
        resource: Uuid,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BillingEvent) -> anyhow::Result<()>;
}

/// Default sink: structured log records via `tracing`.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &BillingEvent) -> anyhow::Result<()> {
        info!(event = ?event, "billing event");
        Ok(())
    }
}
