//! Voice/toast announcements for kitchen-ready orders
//!
//! Only kitchen `READY` announces. At-most-once per logical
//! `(order, status)` is carried entirely by the dedup ledger upstream - the
//! announcer itself is a plain consumer and the sink stays dumb.

use crate::engine::traits::AnnouncementSink;
use crate::engine::view::OrderView;
use shared::{ChangeEvent, OrderStatus, StatusField};
use std::sync::Arc;

/// Bus handler that speaks ready orders by display number
pub struct Announcer {
    view: Arc<OrderView>,
    sink: Arc<dyn AnnouncementSink>,
}

impl Announcer {
    pub fn new(view: Arc<OrderView>, sink: Arc<dyn AnnouncementSink>) -> Self {
        Self { view, sink }
    }

    /// Handle one accepted (post-dedup, post-rank) event
    pub fn handle(&self, event: &ChangeEvent) {
        if event.status_field != StatusField::Kitchen || event.new_status != OrderStatus::Ready {
            return;
        }

        // The event carries the opaque id; screens and voice use the
        // human-readable sequence label.
        let display_number = self
            .view
            .snapshot(&event.order_id)
            .map(|o| o.display_number)
            .unwrap_or_else(|| event.order_id.clone());

        let line = format!("Order {} is ready", display_number);
        tracing::info!(order_id = %event.order_id, display_number = %display_number, "Announcing ready order");
        self.sink.announce(&line);
    }
}
