//! Change events - immutable facts describing one status transition
//!
//! A [`ChangeEvent`] is the unit of propagation. Once constructed it is never
//! mutated, only passed by value across transport boundaries. Two events with
//! the same `event_id` describe the same occurrence regardless of which
//! transport delivered them.

use super::types::{OrderStatus, StatusField};
use crate::util::business_day;
use serde::{Deserialize, Serialize};

/// One order-status transition, as propagated between surfaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    /// Deduplication key, deterministic per logical change (see [`ChangeEvent::derive_id`])
    pub event_id: String,
    /// Order this event belongs to
    pub order_id: String,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    /// Which lifecycle field changed
    pub status_field: StatusField,
    /// When this transition was observed (unix millis)
    pub observed_at: i64,
}

impl ChangeEvent {
    /// Create a new event, deriving its dedup key
    pub fn new(
        order_id: impl Into<String>,
        status_field: StatusField,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        observed_at: i64,
    ) -> Self {
        let order_id = order_id.into();
        let event_id = Self::derive_id(&order_id, status_field, new_status, observed_at);
        Self {
            event_id,
            order_id,
            previous_status,
            new_status,
            status_field,
            observed_at,
        }
    }

    /// Derive the deterministic dedup key for a logical transition.
    ///
    /// `{order}:{field}:{status}:{business_day}` - the day stamp is the
    /// time-based disambiguator. Determinism is load-bearing: the same
    /// transition described independently by a push notification and by a
    /// poll diff must collide in the dedup ledger, otherwise side effects
    /// (voice announcements) would fire once per transport.
    pub fn derive_id(
        order_id: &str,
        field: StatusField,
        new_status: OrderStatus,
        observed_at: i64,
    ) -> String {
        format!(
            "{}:{}:{}:{}",
            order_id,
            field,
            new_status,
            business_day(observed_at)
        )
    }
}

/// Raw status-change tuple from the external change notification feed
///
/// The feed reports every mutation of the order store, this engine's own
/// writes included. Translated into a [`ChangeEvent`] on ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub order_id: String,
    pub status_field: StatusField,
    pub new_status: OrderStatus,
    /// Store-side mutation time (unix millis)
    pub timestamp: i64,
}

impl StatusChange {
    /// Translate into a propagatable event.
    ///
    /// The feed does not carry the previous status; the receiver resolves
    /// ordering by rank, so the pre-image recorded here is advisory only.
    pub fn into_event(self, previous_status: OrderStatus) -> ChangeEvent {
        ChangeEvent::new(
            self.order_id,
            self.status_field,
            previous_status,
            self.new_status,
            self.timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_deterministic() {
        let a = ChangeEvent::new(
            "order-1",
            StatusField::Kitchen,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            1_700_000_000_000,
        );
        let b = ChangeEvent::new(
            "order-1",
            StatusField::Kitchen,
            OrderStatus::Pending, // different (unknown) pre-image
            OrderStatus::Ready,
            1_700_000_030_000, // thirty seconds later, same day
        );
        assert_eq!(a.event_id, b.event_id);
    }

    #[test]
    fn test_event_id_distinguishes_fields_and_statuses() {
        let ts = 1_700_000_000_000;
        let kitchen = ChangeEvent::derive_id("o1", StatusField::Kitchen, OrderStatus::Ready, ts);
        let service = ChangeEvent::derive_id("o1", StatusField::Service, OrderStatus::Ready, ts);
        let preparing =
            ChangeEvent::derive_id("o1", StatusField::Kitchen, OrderStatus::Preparing, ts);
        assert_ne!(kitchen, service);
        assert_ne!(kitchen, preparing);
    }

    #[test]
    fn test_feed_tuple_translation() {
        let change = StatusChange {
            order_id: "o1".to_string(),
            status_field: StatusField::Kitchen,
            new_status: OrderStatus::Ready,
            timestamp: 1_700_000_000_000,
        };
        let event = change.into_event(OrderStatus::Preparing);
        assert_eq!(event.order_id, "o1");
        assert_eq!(event.new_status, OrderStatus::Ready);
        assert_eq!(event.previous_status, OrderStatus::Preparing);
        assert_eq!(
            event.event_id,
            ChangeEvent::derive_id("o1", StatusField::Kitchen, OrderStatus::Ready, event.observed_at)
        );
    }

    #[test]
    fn test_event_round_trips_through_serde() {
        let event = ChangeEvent::new(
            "order-9",
            StatusField::Service,
            OrderStatus::Ready,
            OrderStatus::Served,
            1_700_000_000_000,
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
