//! Propagation bus - dedup-gated fan-out across layered transports
//!
//! ```text
//! coordinator.publish ──► local broadcast transport (best-effort)
//!         │
//!         ▼
//!     dispatch ◄── on_local_broadcast (same device, ~0 latency)
//!         │    ◄── on_remote_notification (change feed, other devices)
//!         │    ◄── on_poll_result (periodic diff, reliability backstop)
//!         │
//!         ├─ dedup ledger claim (atomic, gates everything downstream)
//!         ├─ rank-resolved apply to the local view
//!         └─ subscribed handlers (cache purge, announcements, UI), then commit
//! ```
//!
//! Any number of transports can feed `dispatch`; consumers never change.
//! Handlers for a given order run in the order events are committed; no
//! ordering is guaranteed across different orders.

use crate::core::EngineError;
use crate::engine::dedup::DedupLedger;
use crate::engine::reconcile::diff_authoritative;
use crate::engine::traits::LocalBroadcast;
use crate::engine::view::{ApplyOutcome, OrderView};
use parking_lot::{Mutex, RwLock};
use shared::util::now_millis;
use shared::{ChangeEvent, Order, OrderStatus, StatusChange};
use std::sync::{Arc, Weak};

/// Handler category, for diagnostics and targeted teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerCategory {
    /// Purges cached query results
    CacheInvalidation,
    /// Voice/toast announcements
    Announcement,
    /// UI refresh listeners
    ViewListener,
}

impl std::fmt::Display for HandlerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerCategory::CacheInvalidation => write!(f, "cache-invalidation"),
            HandlerCategory::Announcement => write!(f, "announcement"),
            HandlerCategory::ViewListener => write!(f, "view-listener"),
        }
    }
}

type Handler = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

struct SubscriberEntry {
    id: uuid::Uuid,
    category: HandlerCategory,
    handler: Handler,
}

/// RAII subscription handle - dropping it unsubscribes.
///
/// Replaces lifecycle-tied global listener registration: whatever scope owns
/// the handle (a session, a window, a test) gets deterministic teardown.
pub struct Subscription {
    id: uuid::Uuid,
    subscribers: Weak<RwLock<Vec<SubscriberEntry>>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.write().retain(|entry| entry.id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Multiplexes change events across transports and invokes registered
/// handlers at most once per unique event per process.
pub struct PropagationBus {
    ledger: Arc<DedupLedger>,
    view: Arc<OrderView>,
    broadcast: Option<Arc<dyn LocalBroadcast>>,
    subscribers: Arc<RwLock<Vec<SubscriberEntry>>>,
    /// Serializes apply+handlers so per-order handler order matches commit
    /// order even when two transports ingest concurrently
    dispatch_lock: Mutex<()>,
}

impl PropagationBus {
    pub fn new(
        ledger: Arc<DedupLedger>,
        view: Arc<OrderView>,
        broadcast: Option<Arc<dyn LocalBroadcast>>,
    ) -> Self {
        Self {
            ledger,
            view,
            broadcast,
            subscribers: Arc::new(RwLock::new(Vec::new())),
            dispatch_lock: Mutex::new(()),
        }
    }

    /// Register a handler. Handlers must be infallible and non-blocking;
    /// fallible side effects log-and-continue internally.
    pub fn subscribe<F>(&self, category: HandlerCategory, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4();
        self.subscribers.write().push(SubscriberEntry {
            id,
            category,
            handler: Box::new(handler),
        });
        tracing::debug!(category = %category, "Bus handler subscribed");
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Single fan-out point for locally confirmed writes.
    ///
    /// Called once by the coordinator after the durable write succeeds;
    /// forwards onward to the same-device transport and runs the local
    /// pipeline. The dedup claim below also covers the case where the
    /// remote notification for our own write races in almost simultaneously.
    pub fn publish(&self, event: &ChangeEvent) {
        if let Some(broadcast) = &self.broadcast {
            // Serialized at the transport boundary; other views decode in
            // their own listener.
            let result =
                serde_json::to_string(event).map_err(anyhow::Error::from).and_then(|payload| {
                    broadcast.publish(payload)
                });
            if let Err(e) = result {
                // Transport loss is degraded mode, never fatal - the poll
                // backstop keeps other views converging.
                let err = EngineError::TransportUnavailable {
                    transport: "local-broadcast",
                    source: e,
                };
                tracing::warn!(
                    event_id = %event.event_id,
                    error = %err,
                    "Local broadcast transport unavailable, relying on poll"
                );
            }
        }

        self.dispatch(event, "publish");
    }

    /// Ingestion: same-device broadcast
    pub fn on_local_broadcast(&self, event: &ChangeEvent) {
        self.dispatch(event, "local-broadcast");
    }

    /// Ingestion: raw tuple from the cross-device change feed
    pub fn on_remote_notification(&self, change: StatusChange) {
        // The feed omits the pre-image; resolve it advisorily from the view.
        let previous = self
            .view
            .snapshot(&change.order_id)
            .map(|o| o.status(change.status_field))
            .unwrap_or(OrderStatus::Pending);
        let event = change.into_event(previous);
        self.dispatch(&event, "remote-notification");
    }

    /// Ingestion: authoritative active set from the periodic poll.
    ///
    /// Returns the number of accepted (synthesized) events.
    pub fn on_poll_result(&self, authoritative: Vec<Order>) -> usize {
        let events = diff_authoritative(&self.view, authoritative, now_millis());
        events
            .iter()
            .filter(|event| self.dispatch(event, "poll"))
            .count()
    }

    /// Dedup-gated dispatch pipeline shared by every ingestion point.
    ///
    /// Returns whether the event was accepted (handlers ran).
    fn dispatch(&self, event: &ChangeEvent, origin: &'static str) -> bool {
        if !self.ledger.claim(&event.event_id) {
            tracing::trace!(event_id = %event.event_id, origin, "Duplicate event suppressed");
            return false;
        }

        let _guard = self.dispatch_lock.lock();
        match self.view.apply(event) {
            ApplyOutcome::Unknown => {
                // Can't resolve yet - leave unclaimed so the poll-synthesized
                // duplicate (same event_id) can process once the order is known.
                tracing::debug!(
                    event_id = %event.event_id,
                    order_id = %event.order_id,
                    origin,
                    "Event for unknown order, awaiting poll"
                );
                self.ledger.release(&event.event_id);
                false
            }
            ApplyOutcome::Stale => {
                // Ordering artifact, not an error: a lower-ranked status
                // overtaken in transit. Commit so it is not re-delivered.
                tracing::debug!(
                    event_id = %event.event_id,
                    order_id = %event.order_id,
                    new_status = %event.new_status,
                    origin,
                    "Stale reconciliation discarded"
                );
                self.ledger.commit(&event.event_id, now_millis());
                false
            }
            ApplyOutcome::Applied | ApplyOutcome::AlreadyCurrent => {
                for entry in self.subscribers.read().iter() {
                    (entry.handler)(event);
                }
                self.ledger.commit(&event.event_id, now_millis());
                tracing::debug!(
                    event_id = %event.event_id,
                    order_id = %event.order_id,
                    new_status = %event.new_status,
                    origin,
                    "Event processed"
                );
                true
            }
        }
    }

    /// Count of live handler subscriptions (diagnostics)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Live handler categories, in registration order (diagnostics)
    pub fn subscriber_categories(&self) -> Vec<HandlerCategory> {
        self.subscribers.read().iter().map(|entry| entry.category).collect()
    }
}

impl std::fmt::Debug for PropagationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationBus")
            .field("subscribers", &self.subscriber_categories())
            .field("has_broadcast", &self.broadcast.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StatusField;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_bus() -> (Arc<PropagationBus>, Arc<OrderView>) {
        let view = Arc::new(OrderView::new());
        let ledger = Arc::new(DedupLedger::new());
        let bus = Arc::new(PropagationBus::new(ledger, view.clone(), None));
        (bus, view)
    }

    fn seed_order(view: &OrderView, id: &str, kitchen: OrderStatus) {
        view.upsert(Order {
            id: id.to_string(),
            display_number: "1".to_string(),
            kitchen_status: kitchen,
            service_status: OrderStatus::Pending,
            items: vec![],
            created_at: 0,
        });
    }

    fn kitchen_event(order_id: &str, from: OrderStatus, to: OrderStatus) -> ChangeEvent {
        ChangeEvent::new(order_id, StatusField::Kitchen, from, to, now_millis())
    }

    #[test]
    fn test_same_event_two_transports_one_delivery() {
        let (bus, view) = make_bus();
        seed_order(&view, "o1", OrderStatus::Preparing);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = bus.subscribe(HandlerCategory::ViewListener, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let event = kitchen_event("o1", OrderStatus::Preparing, OrderStatus::Ready);
        // Remote notification and same-device broadcast carrying the
        // identical event_id within milliseconds of each other
        bus.on_remote_notification(StatusChange {
            order_id: "o1".to_string(),
            status_field: StatusField::Kitchen,
            new_status: OrderStatus::Ready,
            timestamp: event.observed_at,
        });
        bus.on_local_broadcast(&event);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.snapshot("o1").unwrap().kitchen_status, OrderStatus::Ready);
    }

    #[test]
    fn test_stale_event_not_delivered() {
        let (bus, view) = make_bus();
        seed_order(&view, "o1", OrderStatus::Pending);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = bus.subscribe(HandlerCategory::ViewListener, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.on_local_broadcast(&kitchen_event("o1", OrderStatus::Preparing, OrderStatus::Ready));
        bus.on_local_broadcast(&kitchen_event("o1", OrderStatus::Pending, OrderStatus::Preparing));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.snapshot("o1").unwrap().kitchen_status, OrderStatus::Ready);
    }

    #[test]
    fn test_unknown_order_left_for_poll() {
        let (bus, view) = make_bus();

        let event = kitchen_event("ghost", OrderStatus::Preparing, OrderStatus::Ready);
        bus.on_local_broadcast(&event);
        assert!(!view.contains("ghost"));

        // Poll brings the order; the synthesized event shares the id and
        // must still be processable.
        let order = Order {
            id: "ghost".to_string(),
            display_number: "9".to_string(),
            kitchen_status: OrderStatus::Ready,
            service_status: OrderStatus::Ready,
            items: vec![],
            created_at: 0,
        };
        let accepted = bus.on_poll_result(vec![order]);
        assert!(accepted >= 1);
        assert_eq!(view.snapshot("ghost").unwrap().kitchen_status, OrderStatus::Ready);
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let (bus, view) = make_bus();
        seed_order(&view, "o1", OrderStatus::Pending);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = bus.subscribe(HandlerCategory::ViewListener, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        bus.on_local_broadcast(&kitchen_event("o1", OrderStatus::Pending, OrderStatus::Preparing));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscriber_categories_track_registration() {
        let (bus, _view) = make_bus();
        let sub_a = bus.subscribe(HandlerCategory::CacheInvalidation, |_| {});
        let _sub_b = bus.subscribe(HandlerCategory::Announcement, |_| {});
        assert_eq!(
            bus.subscriber_categories(),
            vec![HandlerCategory::CacheInvalidation, HandlerCategory::Announcement]
        );

        drop(sub_a);
        assert_eq!(bus.subscriber_categories(), vec![HandlerCategory::Announcement]);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let (bus, view) = make_bus();
        seed_order(&view, "o1", OrderStatus::Pending);

        let order_log = Arc::new(Mutex::new(Vec::new()));
        let log_a = order_log.clone();
        let _sub_a = bus.subscribe(HandlerCategory::CacheInvalidation, move |_| {
            log_a.lock().push("cache");
        });
        let log_b = order_log.clone();
        let _sub_b = bus.subscribe(HandlerCategory::Announcement, move |_| {
            log_b.lock().push("announce");
        });

        bus.on_local_broadcast(&kitchen_event("o1", OrderStatus::Pending, OrderStatus::Preparing));
        assert_eq!(order_log.lock().as_slice(), &["cache", "announce"]);
    }
}
