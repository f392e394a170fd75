//! Order lifecycle synchronization engine
//!
//! Keeps a kitchen display, a billing surface, and any number of device views
//! in agreement about the state of each in-flight order. A single state
//! change fans out through layered transports of differing latency and
//! reliability (same-device broadcast, cross-device change feed, periodic
//! poll); a dedup ledger makes the combined delivery idempotent, and an
//! optimistic coordinator applies local changes before the durable write is
//! confirmed, rolling back on failure.
//!
//! ```text
//! UI action
//!    │
//!    ▼
//! UpdateCoordinator ── transition() ──► local view (optimistic)
//!    │                                      │ rollback on write failure
//!    └── durable write ──ok──► PropagationBus.publish()
//!                                  │
//!                                  ├─► local broadcast transport
//!                                  └─► dedup ledger ─► view apply ─► handlers
//!                                                      (cache purge, announce)
//! remote feed ──► on_remote_notification ──┘  (same gated path)
//! periodic poll ─► on_poll_result ─ diff ──┘
//! ```

pub mod core;
pub mod engine;

// Re-exports
pub use crate::core::{Config, EngineError, EngineResult};
pub use engine::{
    ApplyOutcome, DedupLedger, EntityCategory, HandlerCategory, InProcessBroadcast,
    InvalidationRegistry, OrderView, PropagationBus, Subscription, SyncEngine,
    SyncEngineBuilder, UpdateCoordinator, transition,
};
pub use engine::traits::{
    AnnouncementSink, CacheStore, ChangeFeed, LocalBroadcast, OrderFilter, OrderStore,
};
