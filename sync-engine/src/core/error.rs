use shared::{OrderStatus, StatusField};
use thiserror::Error;

/// Engine errors
///
/// Only [`EngineError::DurableWriteFailure`] is user-visible; everything else
/// is handled internally and degrades to the next reconciliation poll.
/// Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested status change violates forward progression. Local error,
    /// never propagated, never retried automatically.
    #[error("invalid {field} transition: {from} -> {to}")]
    InvalidTransition {
        field: StatusField,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The durable write did not complete (store error or timeout). Local
    /// view state has been rolled back; retry is at the caller's discretion.
    #[error("durable write failed for order {order_id}: {source}")]
    DurableWriteFailure {
        order_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A propagation transport is down. The engine keeps running in degraded
    /// mode on the poll path alone.
    #[error("transport unavailable: {transport}: {source}")]
    TransportUnavailable {
        transport: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Transition requested for an order outside the local working set
    #[error("order not found in active set: {0}")]
    OrderNotFound(String),
}

impl EngineError {
    /// Write failure from a store error
    pub fn write_failure(order_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::DurableWriteFailure {
            order_id: order_id.into(),
            source,
        }
    }

    /// Write failure from a timeout
    pub fn write_timeout(order_id: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::DurableWriteFailure {
            order_id: order_id.into(),
            source: anyhow::anyhow!("write timed out after {:?}", timeout),
        }
    }
}

/// Engine result alias
pub type EngineResult<T> = Result<T, EngineError>;
