//! Optimistic update coordinator
//!
//! Applies a validated transition to the local view immediately (the UI
//! reflects the change with zero perceived latency), issues the durable
//! write, and reconciles on completion: publish on success, snapshot-restore
//! rollback on failure. A failed write never propagates an event that was
//! never durably committed.

use crate::core::{EngineError, EngineResult};
use crate::engine::bus::PropagationBus;
use crate::engine::traits::OrderStore;
use crate::engine::transition::transition;
use crate::engine::view::OrderView;
use shared::util::now_millis;
use shared::{Order, OrderStatus, StatusField};
use std::sync::Arc;
use std::time::Duration;

/// Drives locally originated transitions end to end
pub struct UpdateCoordinator {
    view: Arc<OrderView>,
    store: Arc<dyn OrderStore>,
    bus: Arc<PropagationBus>,
    /// Bound on the single durable-write attempt; timeout rolls back
    write_timeout: Duration,
}

impl UpdateCoordinator {
    pub fn new(
        view: Arc<OrderView>,
        store: Arc<dyn OrderStore>,
        bus: Arc<PropagationBus>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            view,
            store,
            bus,
            write_timeout,
        }
    }

    /// Request one status transition for an order in the active set.
    ///
    /// Guarantees on return: local view state equals either the confirmed
    /// new state (Ok) or the exact pre-call state (Err). No automatic
    /// retries - duplicate writes are worse than a manual retry.
    pub async fn request_transition(
        &self,
        order_id: &str,
        field: StatusField,
        target: OrderStatus,
    ) -> EngineResult<Order> {
        let current = self
            .view
            .snapshot(order_id)
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        // Invalid transitions return before any side effect
        let (new_order, event) = transition(&current, field, target, now_millis())?;

        // Optimistic apply - value-type snapshot makes rollback trivial
        self.view.upsert(new_order.clone());

        let write = self.store.update_status(order_id, field, target);
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                // The bus's own dedup claim also absorbs the feed echo of
                // this very write arriving almost simultaneously.
                self.bus.publish(&event);
                Ok(new_order)
            }
            Ok(Err(e)) => {
                self.view.upsert(current);
                tracing::warn!(
                    order_id = %order_id,
                    field = %field,
                    target = %target,
                    error = %e,
                    "Durable write failed, local state rolled back"
                );
                Err(EngineError::write_failure(order_id, e))
            }
            Err(_elapsed) => {
                self.view.upsert(current);
                tracing::warn!(
                    order_id = %order_id,
                    field = %field,
                    target = %target,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Durable write timed out, local state rolled back"
                );
                Err(EngineError::write_timeout(order_id, self.write_timeout))
            }
        }
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
