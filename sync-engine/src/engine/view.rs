//! Local view state - the active working set as this device knows it
//!
//! A cache of the order store, mutated only by the optimistic coordinator
//! and by the bus's dispatch pipeline. Out-of-order delivery is resolved
//! here by status rank, never by arrival order: kitchen statuses form a
//! strict forward progression, so highest rank wins.

use crate::engine::transition::promote_service_on_kitchen_ready;
use dashmap::DashMap;
use shared::{ChangeEvent, Order, OrderStatus, StatusField};

/// Outcome of applying a change event to the local view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Event advanced the local state
    Applied,
    /// Local state already carries this status (the coordinator's own
    /// publish after its optimistic apply lands here). Counts as accepted.
    AlreadyCurrent,
    /// Event ranks below local state - an ordering artifact, discarded
    Stale,
    /// Event references an order this view has not learned about yet
    Unknown,
}

/// Active working set of orders, keyed by order id
#[derive(Debug, Default)]
pub struct OrderView {
    orders: DashMap<String, Order>,
}

impl OrderView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event by rank comparison, atomically per order.
    ///
    /// `REJECTED` ranks above everything, so a late lower-status event can
    /// never resurrect a rejected order.
    pub fn apply(&self, event: &ChangeEvent) -> ApplyOutcome {
        let Some(mut entry) = self.orders.get_mut(&event.order_id) else {
            return ApplyOutcome::Unknown;
        };

        let current = entry.status(event.status_field);
        if event.new_status.rank() < current.rank() {
            return ApplyOutcome::Stale;
        }
        if event.new_status == current {
            return ApplyOutcome::AlreadyCurrent;
        }

        entry.set_status(event.status_field, event.new_status);
        if event.status_field == StatusField::Kitchen && event.new_status == OrderStatus::Ready {
            promote_service_on_kitchen_ready(&mut entry);
        }
        ApplyOutcome::Applied
    }

    /// Value-type snapshot for the coordinator's rollback path
    pub fn snapshot(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|o| o.value().clone())
    }

    /// Insert or replace an order wholesale (optimistic apply, rollback
    /// restore, poll-discovered orders)
    pub fn upsert(&self, order: Order) {
        self.orders.insert(order.id.clone(), order);
    }

    /// Drop an order from the view (it left the authoritative active set)
    pub fn remove(&self, order_id: &str) -> Option<Order> {
        self.orders.remove(order_id).map(|(_, o)| o)
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.orders.contains_key(order_id)
    }

    /// Current ids held by the view (active or not)
    pub fn order_ids(&self) -> Vec<String> {
        self.orders.iter().map(|e| e.key().clone()).collect()
    }

    /// Active orders in FIFO order (oldest first) for display surfaces.
    ///
    /// Terminal orders are filtered, not deleted - membership is a view
    /// concern.
    pub fn active_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|e| e.value().is_active())
            .map(|e| e.value().clone())
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.display_number.clone()));
        orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
