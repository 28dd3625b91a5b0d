use thiserror::Error;
use uuid::Uuid;

use crate::backend::BackendError;
use crate::downtime::DowntimeViolation;
use crate::models::InvoiceState;

pub type Result<T> = std::result::Result<T, CloudBillError>;

#[derive(Error, Debug)]
pub enum CloudBillError {
    /// A downtime report violated the reporting policy. Returned to the
    /// caller, never retried and never logged as a system fault.
    #[error("downtime validation failed: {0}")]
    Validation(#[from] DowntimeViolation),

    /// An invoice state-transition precondition was violated.
    #[error("invoice must be in {expected} state, but is {actual}")]
    InvalidState {
        expected: InvoiceState,
        actual: InvoiceState,
    },

    #[error("unknown invoice: {0}")]
    UnknownInvoice(Uuid),

    #[error("unknown resource: {0}")]
    UnknownResource(Uuid),

    #[error("unknown downtime: {0}")]
    UnknownDowntime(Uuid),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CloudBillError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_state(expected: InvoiceState, actual: InvoiceState) -> Self {
        Self::InvalidState { expected, actual }
    }
}
