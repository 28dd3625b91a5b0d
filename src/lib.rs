//! Billing core for a cloud-resource management platform.
//!
//! Computes usage-based charges for provisioned resources across monthly
//! billing cycles: mid-period provisioning and termination, validated
//! downtime reporting with compensating credit entries, and frozen invoice
//! snapshots that keep historical billing renderable after the underlying
//! resources are gone.

pub mod backend;
pub mod compensation;
pub mod config;
pub mod downtime;
pub mod error;
pub mod events;
pub mod intervals;
pub mod models;
pub mod service;
pub mod store;

pub use backend::{BackendError, BackendResourceState, ResourceBackend, ResourceSnapshot};
pub use compensation::AdjustmentMode;
pub use config::{BillingConfig, DowntimeConfig};
pub use downtime::DowntimeViolation;
pub use error::{CloudBillError, Result};
pub use events::{BillingEvent, EventSink, TracingEventSink};
pub use models::{
    Invoice, InvoiceItem, InvoiceState, ItemKind, ResourceRecord, ServiceDowntime, SourceKind,
};
pub use service::{BillingService, ItemRef};
