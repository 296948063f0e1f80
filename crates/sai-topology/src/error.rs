//! Error types for topology construction.

use sai_client::{SaiError, SaiResult};
use std::time::Duration;

/// A removal that failed during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub object: String,
    pub error: SaiError,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The device answered a call with a non-success status.
    #[error("{operation} failed: {source}")]
    Device {
        operation: String,
        #[source]
        source: SaiError,
    },

    /// The caller asked for something that cannot be built; detected before
    /// any device call.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Setup steps ran out of order.
    #[error("not initialized: {0}")]
    Uninitialized(String),

    #[error("unknown {kind}: {key}")]
    UnknownEntity { kind: &'static str, key: String },

    #[error("FDB entries not programmed after {0:?}")]
    SettleTimeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("teardown failed for {} object(s)", .0.len())]
    Teardown(Vec<TeardownFailure>),
}

impl TopologyError {
    pub fn precondition(message: impl Into<String>) -> Self {
        TopologyError::Precondition(message.into())
    }

    pub fn uninitialized(message: impl Into<String>) -> Self {
        TopologyError::Uninitialized(message.into())
    }

    pub fn unknown(kind: &'static str, key: impl ToString) -> Self {
        TopologyError::UnknownEntity {
            kind,
            key: key.to_string(),
        }
    }

    /// The device error underneath, if any.
    pub fn device_error(&self) -> Option<&SaiError> {
        match self {
            TopologyError::Device { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;

/// Names the operation a device call was part of.
pub trait DeviceCall<T> {
    fn during(self, operation: &str) -> Result<T>;
}

impl<T> DeviceCall<T> for SaiResult<T> {
    fn during(self, operation: &str) -> Result<T> {
        self.map_err(|source| TopologyError::Device {
            operation: operation.to_string(),
            source,
        })
    }
}
