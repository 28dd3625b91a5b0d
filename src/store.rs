//! Billing State Layer
//!
//! In-memory store for invoices, live source records and downtime windows.
//! Real persistence is an external collaborator; this layer provides the
//! same conceptual tables (invoices unique per customer-month, items owned
//! by their invoice, downtimes keyed by resource) and the atomic mutation
//! boundary the engine relies on: the service wraps every operation in one
//! write-lock section spanning validation read, record write and
//! compensation write.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{CloudBillError, Result};
use crate::models::{Invoice, InvoiceState, ResourceRecord, ServiceDowntime};

#[derive(Debug, Default)]
pub struct Store {
    invoices: HashMap<Uuid, Invoice>,
    /// Unique index over (customer, year, month).
    by_period: HashMap<(Uuid, i32, u32), Uuid>,
    sources: HashMap<Uuid, ResourceRecord>,
    downtimes: HashMap<Uuid, ServiceDowntime>,
    next_invoice_id: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create the invoice for a customer-month.
    pub fn find_or_create_invoice(
        &mut self,
        customer: Uuid,
        year: i32,
        month: u32,
        tax_percent: Decimal,
    ) -> Uuid {
        if let Some(uuid) = self.by_period.get(&(customer, year, month)) {
            return *uuid;
        }
        self.next_invoice_id += 1;
        let invoice = Invoice::new(self.next_invoice_id, customer, year, month, tax_percent);
        let uuid = invoice.uuid;
        self.by_period.insert((customer, year, month), uuid);
        self.invoices.insert(uuid, invoice);
        uuid
    }

    pub fn invoice(&self, uuid: Uuid) -> Option<&Invoice> {
        self.invoices.get(&uuid)
    }

    pub fn invoice_mut(&mut self, uuid: Uuid) -> Option<&mut Invoice> {
        self.invoices.get_mut(&uuid)
    }

    pub fn invoice_for_period(&self, customer: Uuid, year: i32, month: u32) -> Option<&Invoice> {
        self.by_period
            .get(&(customer, year, month))
            .and_then(|uuid| self.invoices.get(uuid))
    }

    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.values()
    }

    pub fn insert_source(&mut self, record: ResourceRecord) {
        self.sources.insert(record.id, record);
    }

    pub fn source(&self, id: Uuid) -> Option<&ResourceRecord> {
        self.sources.get(&id)
    }

    /// Drop a live record, clearing the reference on every item that points
    /// at it. Items are frozen first so invoices stay renderable.
    pub fn remove_source(&mut self, id: Uuid) -> Option<ResourceRecord> {
        let record = self.sources.remove(&id)?;
        for invoice in self.invoices.values_mut() {
            for item in &mut invoice.items {
                if item.source == Some(id) {
                    item.freeze(Some(&record));
                    item.source = None;
                }
            }
        }
        Some(record)
    }

    /// Pending -> created: freeze all child items and stamp the invoice
    /// date. Returns the customer and the before/after states for event
    /// emission.
    pub fn set_created(
        &mut self,
        uuid: Uuid,
        today: NaiveDate,
    ) -> Result<(Uuid, InvoiceState, InvoiceState)> {
        let sources = &self.sources;
        let invoice = self
            .invoices
            .get_mut(&uuid)
            .ok_or(CloudBillError::UnknownInvoice(uuid))?;
        let from = invoice.state;
        invoice.set_created(today, &|id| sources.get(&id).cloned())?;
        Ok((invoice.customer, from, invoice.state))
    }

    /// Clamp-close every open item billed for `resource`. Returns the
    /// touched items for event emission.
    pub fn terminate_resource(
        &mut self,
        resource: Uuid,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Vec<(Uuid, u64)> {
        let record = self.sources.get(&resource).cloned();
        let mut closed = Vec::new();
        for invoice in self.invoices.values_mut() {
            for item in &mut invoice.items {
                if item.source != Some(resource) {
                    continue;
                }
                let before = item.end;
                item.terminate(end, record.as_ref());
                if item.end != before {
                    closed.push((invoice.uuid, item.id));
                }
            }
        }
        closed
    }

    pub fn insert_downtime(&mut self, downtime: ServiceDowntime) {
        self.downtimes.insert(downtime.id, downtime);
    }

    pub fn downtime(&self, id: Uuid) -> Option<&ServiceDowntime> {
        self.downtimes.get(&id)
    }

    pub fn remove_downtime(&mut self, id: Uuid) -> Option<ServiceDowntime> {
        self.downtimes.remove(&id)
    }

    /// All downtime windows registered for one resource.
    pub fn downtimes_for(&self, resource: Uuid) -> Vec<ServiceDowntime> {
        let mut windows: Vec<_> = self
            .downtimes
            .values()
            .filter(|downtime| downtime.resource == resource)
            .cloned()
            .collect();
        windows.sort_by_key(|downtime| downtime.start);
        windows
    }
}
