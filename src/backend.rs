//! Infrastructure Backend Interface
//!
//! The billing engine never talks to provider APIs itself. Reconciliation
//! workers drive this capability on their own retry schedule and hand the
//! resulting snapshots to the engine, which only reads prices and lifecycle
//! timestamps off them. A failed pull leaves prior billing state untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("resource not found on backend: {0}")]
    NotFound(Uuid),

    #[error("backend protocol error: {0}")]
    Protocol(String),
}

/// Lifecycle state of a resource as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendResourceState {
    Provisioning,
    Active,
    Stopped,
    Deleted,
    Erred,
}

/// Authoritative view of one remote resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub id: Uuid,
    pub name: String,
    pub state: BackendResourceState,
    /// Price per day.
    pub daily_price: Decimal,
    pub created: DateTime<Utc>,
    pub launched: Option<DateTime<Utc>>,
    pub terminated: Option<DateTime<Utc>>,
}

/// Remote infrastructure provider, keyed on remote identifiers. All
/// operations are idempotent so reconciliation workers can retry them.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    async fn pull_state(&self, resource: Uuid) -> Result<ResourceSnapshot, BackendError>;

    async fn create(&self, resource: Uuid) -> Result<ResourceSnapshot, BackendError>;

    async fn start(&self, resource: Uuid) -> Result<ResourceSnapshot, BackendError>;

    async fn stop(&self, resource: Uuid) -> Result<ResourceSnapshot, BackendError>;

    async fn delete(&self, resource: Uuid) -> Result<ResourceSnapshot, BackendError>;
}
