//! Billing Data Models
//!
//! Core data structures for the billing engine. Monetary values use
//! `rust_decimal::Decimal`; timestamps are UTC. Invoice items are a single
//! tagged-variant type so pricing and freezing logic is shared across all
//! item kinds without dispatch.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::backend::ResourceSnapshot;
use crate::error::{CloudBillError, Result};
use crate::intervals;

/// Billing lifecycle of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceState {
    /// Accumulating items for the current billing period.
    Pending,
    /// Issued to the customer; items are frozen.
    Created,
    Paid,
    Canceled,
}

impl fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvoiceState::Pending => "pending",
            InvoiceState::Created => "created",
            InvoiceState::Paid => "paid",
            InvoiceState::Canceled => "canceled",
        };
        f.write_str(label)
    }
}

/// What a ledger line bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A provisioned infrastructure resource (VM package, tenant, ...).
    Resource,
    /// A custom support offering.
    Offering,
    /// A downtime credit. Carries a negative daily price and no live
    /// source reference, so it survives resource deletion.
    Compensation,
}

/// Kind of a live source record in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Resource,
    Offering,
}

/// A live, mutable record of a billable resource or offering.
///
/// Ledger items keep only a nullable reference to it; descriptive fields are
/// copied into the item on freeze so invoices stay renderable after the
/// record is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub kind: SourceKind,
    pub name: String,
    pub project_name: String,
    pub project_id: Uuid,
    /// Price per day.
    pub daily_price: Decimal,
    /// Kind-specific descriptive fields (tenant/template names and ids,
    /// offering type, ...). Snapshotted verbatim into frozen items.
    pub metadata: Map<String, Value>,
}

impl ResourceRecord {
    /// Build a registry record from an infrastructure backend snapshot.
    pub fn from_snapshot(
        snapshot: &ResourceSnapshot,
        project_id: Uuid,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            id: snapshot.id,
            kind: SourceKind::Resource,
            name: snapshot.name.clone(),
            project_name: project_name.into(),
            project_id,
            daily_price: snapshot.daily_price,
            metadata: Map::new(),
        }
    }
}

/// One billable line entry tied to a resource or offering for a date range
/// within one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: u64,
    pub kind: ItemKind,
    /// Live reference to the source record. `None` for compensation entries
    /// and for items whose source has been deleted.
    pub source: Option<Uuid>,
    /// Price per day. Negative for compensation entries.
    pub daily_price: Decimal,
    /// When usage has started.
    pub start: DateTime<Utc>,
    /// When usage has ended.
    pub end: DateTime<Utc>,
    /// Stored separately from the project record because the project is not
    /// available after removal.
    pub project_name: String,
    pub project_id: Option<Uuid>,
    /// Frozen descriptive data, populated by `freeze`.
    pub details: Map<String, Value>,
}

impl InvoiceItem {
    /// Number of complete days the item is billed for.
    pub fn usage_days(&self) -> i64 {
        intervals::full_days(self.start, self.end)
    }

    pub fn price(&self) -> Decimal {
        self.daily_price * Decimal::from(self.usage_days())
    }

    pub fn tax(&self, tax_percent: Decimal) -> Decimal {
        self.price() * tax_percent / Decimal::ONE_HUNDRED
    }

    pub fn total(&self, tax_percent: Decimal) -> Decimal {
        self.price() + self.tax(tax_percent)
    }

    /// Snapshot descriptive fields of the live source into `details`.
    ///
    /// Idempotent. A no-op when the item has no source reference or the
    /// record is gone; frozen invoices must stay renderable, so missing
    /// source data is never an error.
    pub fn freeze(&mut self, source: Option<&ResourceRecord>) {
        if self.source.is_none() {
            return;
        }
        let Some(record) = source else { return };
        self.details
            .insert("name".to_string(), Value::String(record.name.clone()));
        self.details.insert(
            "project_name".to_string(),
            Value::String(record.project_name.clone()),
        );
        self.details.insert(
            "project_uuid".to_string(),
            Value::String(record.project_id.simple().to_string()),
        );
        for (key, value) in &record.metadata {
            self.details.insert(key.clone(), value.clone());
        }
    }

    /// Freeze the item and close it at `end`.
    ///
    /// The end timestamp is clamped: it never extends past the current end,
    /// and never moves before the start. Terminating an item that already
    /// closed earlier is a silent no-op.
    pub fn terminate(&mut self, end: DateTime<Utc>, source: Option<&ResourceRecord>) {
        self.freeze(source);
        self.end = self.end.min(end).max(self.start);
    }

    /// Move the end timestamp `days` whole days back, clamping to a
    /// zero-length interval at the start.
    pub fn shift_backward(&mut self, days: i64) {
        if self.usage_days() > days {
            self.end -= Duration::days(days);
        } else {
            self.end = self.start;
        }
    }

    /// Extend the end timestamp to the last second of its current day.
    pub fn extend_to_end_of_day(&mut self) {
        let day_end = self
            .end
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN));
        self.end = Utc.from_utc_datetime(&day_end);
    }

    /// Display name: frozen details when present, the live record otherwise.
    pub fn name(&self, source: Option<&ResourceRecord>) -> String {
        if let Some(name) = self.details.get("name").and_then(Value::as_str) {
            return format!("{} ({})", name, self.project_name);
        }
        match source {
            Some(record) => format!("{} ({})", record.name, record.project_name),
            None => self.project_name.clone(),
        }
    }
}

/// Billing information about purchased resources for one customer over one
/// calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Internal sequence number; the customer-facing invoice number is
    /// derived from it.
    pub id: u64,
    pub uuid: Uuid,
    pub customer: Uuid,
    pub year: i32,
    /// 1-12.
    pub month: u32,
    pub state: InvoiceState,
    /// 0-100.
    pub tax_percent: Decimal,
    /// Date the invoice moved from pending to created.
    pub invoice_date: Option<NaiveDate>,
    pub items: Vec<InvoiceItem>,
    next_item_id: u64,
}

impl Invoice {
    pub(crate) fn new(
        id: u64,
        customer: Uuid,
        year: i32,
        month: u32,
        tax_percent: Decimal,
    ) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            customer,
            year,
            month,
            state: InvoiceState::Pending,
            tax_percent,
            invoice_date: None,
            items: Vec::new(),
            next_item_id: 1,
        }
    }

    pub fn price(&self) -> Decimal {
        self.items.iter().map(InvoiceItem::price).sum()
    }

    pub fn tax(&self) -> Decimal {
        self.price() * self.tax_percent / Decimal::ONE_HUNDRED
    }

    pub fn total(&self) -> Decimal {
        self.price() + self.tax()
    }

    /// Customer-facing invoice number.
    pub fn number(&self, offset: u64) -> u64 {
        offset + self.id
    }

    pub fn due_date(&self, payment_interval_days: i64) -> Option<NaiveDate> {
        self.invoice_date
            .map(|date| date + Duration::days(payment_interval_days))
    }

    pub fn item(&self, id: u64) -> Option<&InvoiceItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub(crate) fn item_mut(&mut self, id: u64) -> Option<&mut InvoiceItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Open a new ledger item on this invoice.
    ///
    /// Items may still be added after the invoice moved to created; such
    /// late additions follow the same freeze contract as everything else.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn open_item(
        &mut self,
        kind: ItemKind,
        source: Option<Uuid>,
        daily_price: Decimal,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        project_name: String,
        project_id: Option<Uuid>,
    ) -> u64 {
        let id = self.next_item_id;
        self.next_item_id += 1;
        self.items.push(InvoiceItem {
            id,
            kind,
            source,
            daily_price,
            start,
            end,
            project_name,
            project_id,
            details: Map::new(),
        });
        id
    }

    /// Freeze every child item, looking live records up through `lookup`.
    pub(crate) fn freeze_items(&mut self, lookup: &dyn Fn(Uuid) -> Option<ResourceRecord>) {
        for item in &mut self.items {
            let record = item.source.and_then(&lookup);
            item.freeze(record.as_ref());
        }
    }

    /// Transition pending -> created: freeze all child items and stamp the
    /// invoice date.
    pub(crate) fn set_created(
        &mut self,
        today: NaiveDate,
        lookup: &dyn Fn(Uuid) -> Option<ResourceRecord>,
    ) -> Result<()> {
        if self.state != InvoiceState::Pending {
            return Err(CloudBillError::invalid_state(InvoiceState::Pending, self.state));
        }
        self.freeze_items(lookup);
        self.state = InvoiceState::Created;
        self.invoice_date = Some(today);
        Ok(())
    }

    /// Transition created -> paid.
    pub(crate) fn mark_paid(&mut self) -> Result<()> {
        if self.state != InvoiceState::Created {
            return Err(CloudBillError::invalid_state(InvoiceState::Created, self.state));
        }
        self.state = InvoiceState::Paid;
        Ok(())
    }

    /// Transition created -> canceled.
    pub(crate) fn mark_canceled(&mut self) -> Result<()> {
        if self.state != InvoiceState::Created {
            return Err(CloudBillError::invalid_state(InvoiceState::Created, self.state));
        }
        self.state = InvoiceState::Canceled;
        Ok(())
    }
}

/// A reported interval during which a resource was unusable, eligible for
/// billing credit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDowntime {
    pub id: Uuid,
    pub resource: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ServiceDowntime {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
