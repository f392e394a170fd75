//! Poll reconciliation - the correctness backstop
//!
//! A periodic full read of the authoritative active set is diffed against
//! the local view; one [`ChangeEvent`] is synthesized per detected
//! difference and routed through the exact same dedup/apply pipeline as
//! pushed events. This is not an event stream: it guarantees eventual
//! correctness even if every push transport fails silently.

use crate::engine::view::OrderView;
use shared::{ChangeEvent, Order, OrderStatus, StatusField};
use std::collections::HashSet;

/// Diff the authoritative active set against the local view.
///
/// Side effects on `view`:
/// - orders unknown locally are upserted at an all-`PENDING` baseline, so
///   the synthesized events still travel the apply path (and announce if
///   they cross kitchen `READY`);
/// - orders held locally but absent from the authoritative set were
///   completed or rejected elsewhere and are dropped.
///
/// Returns the synthesized events; the caller dispatches them.
pub fn diff_authoritative(view: &OrderView, authoritative: Vec<Order>, now: i64) -> Vec<ChangeEvent> {
    let authoritative_ids: HashSet<&str> = authoritative.iter().map(|o| o.id.as_str()).collect();

    // Orders that left the active set on another device
    for order_id in view.order_ids() {
        if !authoritative_ids.contains(order_id.as_str()) {
            view.remove(&order_id);
            tracing::debug!(order_id = %order_id, "Order left authoritative active set, dropped from view");
        }
    }

    let mut events = Vec::new();
    for order in authoritative {
        let baseline = match view.snapshot(&order.id) {
            Some(local) => local,
            None => {
                // New order (billing flow on another device). Baseline at
                // PENDING so advanced statuses still produce events.
                let mut baseline = order.clone();
                baseline.kitchen_status = OrderStatus::Pending;
                baseline.service_status = OrderStatus::Pending;
                view.upsert(baseline.clone());
                tracing::debug!(order_id = %order.id, "New order discovered via poll");
                baseline
            }
        };

        for field in [StatusField::Kitchen, StatusField::Service] {
            let local_status = baseline.status(field);
            let auth_status = order.status(field);
            if auth_status.rank() > local_status.rank() {
                events.push(ChangeEvent::new(
                    order.id.clone(),
                    field,
                    local_status,
                    auth_status,
                    now,
                ));
            }
        }
    }

    if !events.is_empty() {
        tracing::debug!(synthesized = events.len(), "Poll reconciliation found differences");
    }
    events
}
