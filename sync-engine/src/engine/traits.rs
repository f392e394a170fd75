//! Collaborator seams
//!
//! The engine is transport- and storage-agnostic: the order store, the
//! change notification feed, the same-device broadcast channel, the
//! announcement sink and the cache store are all consumed through the
//! traits below. The only implementation shipped here is
//! [`InProcessBroadcast`], a zero-infrastructure broadcast for views living
//! in the same process.

use async_trait::async_trait;
use shared::util::{business_day, now_millis};
use shared::{Order, OrderStatus, StatusChange, StatusField};
use tokio::sync::{broadcast, mpsc};

/// Active-set read filter for the order store
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Only orders whose lifecycle has not reached a terminal status
    pub active_only: bool,
    /// Logical day boundary (`YYYYMMDD`, local) - orders created that day
    pub business_day: Option<String>,
}

impl OrderFilter {
    /// The standard reconciliation filter: today's active orders
    pub fn active_today() -> Self {
        Self {
            active_only: true,
            business_day: Some(business_day(now_millis())),
        }
    }
}

/// The external order store - the sole source of truth.
///
/// All local state is a cache of it and must always be reconcilable by
/// re-reading.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Read the authoritative active working set
    async fn read_active_orders(&self, filter: &OrderFilter) -> anyhow::Result<Vec<Order>>;

    /// Durably write one status field. Single attempt; the engine applies
    /// its own timeout and never retries internally.
    async fn update_status(
        &self,
        order_id: &str,
        field: StatusField,
        status: OrderStatus,
    ) -> anyhow::Result<()>;
}

/// Push subscription over order-store mutations (any actor's, ours included)
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open the subscription. Failure here means the transport is down;
    /// the engine degrades to the poll path and keeps running.
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<StatusChange>>;
}

/// Same-device pub/sub for near-zero-latency fan-out to other open views.
///
/// Carries serialized `ChangeEvent`s - the channel itself stays payload
/// agnostic so browser-style broadcast primitives can implement it.
pub trait LocalBroadcast: Send + Sync {
    fn publish(&self, payload: String) -> anyhow::Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// Accepts a line to be spoken/displayed. At-most-once per logical
/// `(order, status)` is enforced by the dedup ledger, never by the sink.
pub trait AnnouncementSink: Send + Sync {
    fn announce(&self, line: &str);
}

/// Key-value invalidation target, consumed via `purge` only
pub trait CacheStore: Send + Sync {
    fn purge(&self, key: &str);
}

/// In-process [`LocalBroadcast`] over a tokio broadcast channel.
///
/// Events published here come straight back through the engine's own
/// listener; the dedup ledger absorbs the echo.
#[derive(Debug, Clone)]
pub struct InProcessBroadcast {
    tx: broadcast::Sender<String>,
}

impl InProcessBroadcast {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Number of live subscribers (other views on this device)
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl LocalBroadcast for InProcessBroadcast {
    fn publish(&self, payload: String) -> anyhow::Result<()> {
        // No receivers is not a failure - a lone view still works
        let _ = self.tx.send(payload);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
