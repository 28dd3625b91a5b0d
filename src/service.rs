//! Billing Service
//!
//! Request-driven facade over the billing engine. Every public operation
//! runs as one atomic section under the store's write lock: the validation
//! read, the record write and the resulting compensation write cannot
//! interleave with another mutation, so concurrent downtime reports for the
//! same resource serialize instead of racing the overlap check.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::compensation;
use crate::config::BillingConfig;
use crate::downtime;
use crate::error::{CloudBillError, Result};
use crate::events::{BillingEvent, EventSink, TracingEventSink};
use crate::intervals;
use crate::models::{Invoice, ItemKind, ResourceRecord, ServiceDowntime, SourceKind};
use crate::store::Store;

/// Location of one ledger item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    pub invoice: Uuid,
    pub item: u64,
}

pub struct BillingService {
    store: RwLock<Store>,
    config: BillingConfig,
    events: Arc<dyn EventSink>,
}

impl BillingService {
    pub fn new(config: BillingConfig) -> Self {
        Self::with_event_sink(config, Arc::new(TracingEventSink))
    }

    pub fn with_event_sink(config: BillingConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            store: RwLock::new(Store::new()),
            config,
            events,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Put a live source record into the registry, replacing any previous
    /// record with the same id.
    pub fn register_source(&self, record: ResourceRecord) {
        self.store.write().insert_source(record);
    }

    /// Drop a live source record. Items billed for it are frozen and
    /// detached; already frozen invoices stay renderable.
    pub fn delete_source(&self, id: Uuid) -> bool {
        self.store.write().remove_source(id).is_some()
    }

    /// Open a ledger item for a provisioned resource. The invoice for the
    /// start's customer-month is created lazily; the item runs until the
    /// end of that calendar month unless terminated earlier.
    pub fn provision(
        &self,
        customer: Uuid,
        resource: Uuid,
        start: Option<DateTime<Utc>>,
    ) -> Result<ItemRef> {
        self.open_for_source(customer, resource, start)
    }

    /// Open a ledger item for a purchased offering.
    pub fn register_offering(
        &self,
        customer: Uuid,
        offering: Uuid,
        start: Option<DateTime<Utc>>,
    ) -> Result<ItemRef> {
        self.open_for_source(customer, offering, start)
    }

    fn open_for_source(
        &self,
        customer: Uuid,
        source: Uuid,
        start: Option<DateTime<Utc>>,
    ) -> Result<ItemRef> {
        let start = start.unwrap_or_else(Utc::now);
        let end = intervals::month_end(start);

        let mut store = self.store.write();
        let record = store
            .source(source)
            .ok_or(CloudBillError::UnknownResource(source))?
            .clone();
        let kind = match record.kind {
            SourceKind::Resource => ItemKind::Resource,
            SourceKind::Offering => ItemKind::Offering,
        };

        let uuid = store.find_or_create_invoice(
            customer,
            start.year(),
            start.month(),
            self.config.default_tax_percent,
        );
        let Some(invoice) = store.invoice_mut(uuid) else {
            return Err(CloudBillError::UnknownInvoice(uuid));
        };
        let item = invoice.open_item(
            kind,
            Some(record.id),
            record.daily_price,
            start,
            end,
            record.project_name.clone(),
            Some(record.project_id),
        );
        drop(store);

        info!(%customer, %source, %start, "opened ledger item");
        self.emit(BillingEvent::ItemOpened {
            invoice: uuid,
            item,
            source: Some(source),
            start,
            end,
        });
        Ok(ItemRef {
            invoice: uuid,
            item,
        })
    }

    /// Freeze and close every open item billed for the resource.
    ///
    /// The end is clamped per item: never past the item's current end,
    /// never before its start. Terminating a resource whose items already
    /// closed earlier is a silent no-op.
    pub fn terminate(&self, resource: Uuid, end: Option<DateTime<Utc>>) {
        let end = end.unwrap_or_else(Utc::now);
        let closed = self.store.write().terminate_resource(resource, end);
        for (invoice, item) in closed {
            self.emit(BillingEvent::ItemTerminated {
                invoice,
                item,
                end,
            });
        }
    }

    /// Register a downtime window for a resource.
    ///
    /// Runs the full validation chain before writing anything, then applies
    /// the configured billing adjustment. Rejections surface the violated
    /// rule and leave no trace in the ledger.
    pub fn report_downtime(
        &self,
        resource: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Uuid> {
        let now = Utc::now();

        let mut store = self.store.write();
        let existing = store.downtimes_for(resource);
        downtime::validate(&self.config.downtime, now, start, end, &existing)?;

        let downtime = ServiceDowntime {
            id: Uuid::new_v4(),
            resource,
            start,
            end,
        };
        compensation::apply_downtime(&mut store, &downtime, self.config.adjustment_mode);
        let id = downtime.id;
        store.insert_downtime(downtime);
        drop(store);

        info!(%resource, %start, %end, "registered downtime");
        self.emit(BillingEvent::DowntimeReported {
            downtime: id,
            resource,
            start,
            end,
        });
        Ok(id)
    }

    /// Delete a downtime record and retract its compensation entries.
    pub fn remove_downtime(&self, id: Uuid) -> Result<()> {
        let mut store = self.store.write();
        let downtime = store
            .remove_downtime(id)
            .ok_or(CloudBillError::UnknownDowntime(id))?;
        compensation::retract_downtime(&mut store, &downtime);
        drop(store);

        info!(downtime = %id, resource = %downtime.resource, "removed downtime");
        self.emit(BillingEvent::DowntimeRemoved {
            downtime: id,
            resource: downtime.resource,
        });
        Ok(())
    }

    /// Issue a pending invoice: freeze all child items, stamp the invoice
    /// date and move it to the created state.
    pub fn set_created(&self, invoice: Uuid) -> Result<()> {
        let today = Utc::now().date_naive();
        let (customer, from, to) = self.store.write().set_created(invoice, today)?;
        self.emit(BillingEvent::InvoiceStateChanged {
            invoice,
            customer,
            from,
            to,
        });
        Ok(())
    }

    pub fn mark_paid(&self, invoice: Uuid) -> Result<()> {
        let mut store = self.store.write();
        let entry = store
            .invoice_mut(invoice)
            .ok_or(CloudBillError::UnknownInvoice(invoice))?;
        let from = entry.state;
        entry.mark_paid()?;
        let (customer, to) = (entry.customer, entry.state);
        drop(store);

        self.emit(BillingEvent::InvoiceStateChanged {
            invoice,
            customer,
            from,
            to,
        });
        Ok(())
    }

    pub fn mark_canceled(&self, invoice: Uuid) -> Result<()> {
        let mut store = self.store.write();
        let entry = store
            .invoice_mut(invoice)
            .ok_or(CloudBillError::UnknownInvoice(invoice))?;
        let from = entry.state;
        entry.mark_canceled()?;
        let (customer, to) = (entry.customer, entry.state);
        drop(store);

        self.emit(BillingEvent::InvoiceStateChanged {
            invoice,
            customer,
            from,
            to,
        });
        Ok(())
    }

    /// Payment due date: invoice date plus the configured interval. Absent
    /// until the invoice has been issued.
    pub fn due_date(&self, invoice: Uuid) -> Result<Option<NaiveDate>> {
        let store = self.store.read();
        let entry = store
            .invoice(invoice)
            .ok_or(CloudBillError::UnknownInvoice(invoice))?;
        Ok(entry.due_date(self.config.payment_interval_days))
    }

    /// Customer-facing invoice number.
    pub fn invoice_number(&self, invoice: Uuid) -> Result<u64> {
        let store = self.store.read();
        let entry = store
            .invoice(invoice)
            .ok_or(CloudBillError::UnknownInvoice(invoice))?;
        Ok(entry.number(self.config.invoice_number_offset))
    }

    pub fn invoice(&self, invoice: Uuid) -> Option<Invoice> {
        self.store.read().invoice(invoice).cloned()
    }

    pub fn invoice_for(&self, customer: Uuid, year: i32, month: u32) -> Option<Invoice> {
        self.store
            .read()
            .invoice_for_period(customer, year, month)
            .cloned()
    }

    pub fn downtimes(&self, resource: Uuid) -> Vec<ServiceDowntime> {
        self.store.read().downtimes_for(resource)
    }

    pub fn source(&self, id: Uuid) -> Option<ResourceRecord> {
        self.store.read().source(id).cloned()
    }

    fn emit(&self, event: BillingEvent) {
        if let Err(error) = self.events.emit(&event) {
            warn!(%error, ?event, "event sink failed, dropping event");
        }
    }
}
