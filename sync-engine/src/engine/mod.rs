//! Engine assembly
//!
//! [`SyncEngine`] wires the dedup ledger, propagation bus, local view,
//! cache invalidation registry and optimistic coordinator to the external
//! collaborators, and manages the background transport listeners plus the
//! reconciliation/prune timers.

pub mod announce;
pub mod bus;
pub mod cache;
pub mod coordinator;
pub mod dedup;
pub mod reconcile;
pub mod traits;
pub mod transition;
pub mod view;

pub use announce::Announcer;
pub use bus::{HandlerCategory, PropagationBus, Subscription};
pub use cache::{EntityCategory, InvalidationRegistry};
pub use coordinator::UpdateCoordinator;
pub use dedup::DedupLedger;
pub use traits::InProcessBroadcast;
pub use transition::transition;
pub use view::{ApplyOutcome, OrderView};

use crate::core::{BackgroundTasks, Config, EngineError, TaskKind};
use std::sync::Arc;
use traits::{AnnouncementSink, CacheStore, ChangeFeed, LocalBroadcast, OrderFilter, OrderStore};

/// Builder for [`SyncEngine`] - the order store is mandatory, every other
/// collaborator is optional (the engine degrades to the poll path without
/// push transports, and skips announcements/invalidation without sinks).
pub struct SyncEngineBuilder {
    config: Config,
    store: Arc<dyn OrderStore>,
    feed: Option<Arc<dyn ChangeFeed>>,
    broadcast: Option<Arc<dyn LocalBroadcast>>,
    sink: Option<Arc<dyn AnnouncementSink>>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl SyncEngineBuilder {
    pub fn new(config: Config, store: Arc<dyn OrderStore>) -> Self {
        Self {
            config,
            store,
            feed: None,
            broadcast: None,
            sink: None,
            cache: None,
        }
    }

    /// Cross-device change notification feed
    pub fn with_change_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Same-device broadcast channel
    pub fn with_local_broadcast(mut self, broadcast: Arc<dyn LocalBroadcast>) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Same-device broadcast backed by the in-process channel, sized from
    /// config. Other surfaces join via [`SyncEngine::local_broadcast`].
    pub fn with_in_process_broadcast(mut self) -> Self {
        self.broadcast = Some(Arc::new(InProcessBroadcast::new(
            self.config.broadcast_capacity,
        )));
        self
    }

    /// Voice/toast announcement sink
    pub fn with_announcement_sink(mut self, sink: Arc<dyn AnnouncementSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Cache store for invalidation
    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> SyncEngine {
        let view = Arc::new(OrderView::new());
        let ledger = Arc::new(DedupLedger::new());
        let bus = Arc::new(PropagationBus::new(
            ledger.clone(),
            view.clone(),
            self.broadcast.clone(),
        ));

        let mut subscriptions = Vec::new();

        let registry = self.cache.map(|cache_store| {
            let registry = Arc::new(InvalidationRegistry::new(cache_store));
            let r = registry.clone();
            subscriptions.push(
                bus.subscribe(HandlerCategory::CacheInvalidation, move |event| {
                    r.on_event(event)
                }),
            );
            registry
        });

        if let Some(sink) = self.sink {
            let announcer = Arc::new(Announcer::new(view.clone(), sink));
            subscriptions.push(bus.subscribe(HandlerCategory::Announcement, move |event| {
                announcer.handle(event)
            }));
        }

        let coordinator = Arc::new(UpdateCoordinator::new(
            view.clone(),
            self.store.clone(),
            bus.clone(),
            self.config.write_timeout(),
        ));

        SyncEngine {
            config: self.config,
            view,
            ledger,
            bus,
            coordinator,
            registry,
            store: self.store,
            feed: self.feed,
            broadcast: self.broadcast,
            tasks: None,
            _subscriptions: subscriptions,
        }
    }
}

/// The assembled order lifecycle synchronization engine
pub struct SyncEngine {
    config: Config,
    view: Arc<OrderView>,
    ledger: Arc<DedupLedger>,
    bus: Arc<PropagationBus>,
    coordinator: Arc<UpdateCoordinator>,
    registry: Option<Arc<InvalidationRegistry>>,
    store: Arc<dyn OrderStore>,
    feed: Option<Arc<dyn ChangeFeed>>,
    broadcast: Option<Arc<dyn LocalBroadcast>>,
    tasks: Option<BackgroundTasks>,
    _subscriptions: Vec<Subscription>,
}

impl SyncEngine {
    pub fn builder(config: Config, store: Arc<dyn OrderStore>) -> SyncEngineBuilder {
        SyncEngineBuilder::new(config, store)
    }

    pub fn view(&self) -> &Arc<OrderView> {
        &self.view
    }

    pub fn bus(&self) -> &Arc<PropagationBus> {
        &self.bus
    }

    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    /// Cache invalidation registry, present when a cache store was provided
    pub fn registry(&self) -> Option<&Arc<InvalidationRegistry>> {
        self.registry.as_ref()
    }

    /// The same-device broadcast transport, when one was configured
    pub fn local_broadcast(&self) -> Option<&Arc<dyn LocalBroadcast>> {
        self.broadcast.as_ref()
    }

    /// Run one reconciliation pass immediately (also used at startup).
    ///
    /// Read errors are degraded, not fatal - the next tick retries.
    pub async fn reconcile_now(&self) {
        match self.store.read_active_orders(&OrderFilter::active_today()).await {
            Ok(orders) => {
                let accepted = self.bus.on_poll_result(orders);
                if accepted > 0 {
                    tracing::info!(accepted, "Reconciliation applied differences");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reconciliation read failed, retrying next tick");
            }
        }
    }

    /// Start background tasks: change-feed listener, local-broadcast
    /// listener, periodic poll, ledger prune. Performs an initial
    /// reconciliation pass first so the view is seeded before any UI reads.
    pub async fn start(&mut self) {
        if self.tasks.is_some() {
            tracing::warn!("Engine already started");
            return;
        }

        self.reconcile_now().await;

        let mut tasks = BackgroundTasks::new();

        // 1. Cross-device change feed (push, best-effort)
        if let Some(feed) = self.feed.clone() {
            let bus = self.bus.clone();
            let token = tasks.shutdown_token();
            tasks.spawn("change_feed_listener", TaskKind::Listener, async move {
                let mut rx = match feed.subscribe().await {
                    Ok(rx) => rx,
                    Err(e) => {
                        // Degraded mode: the poll backstop keeps running
                        let err = EngineError::TransportUnavailable {
                            transport: "change-feed",
                            source: e,
                        };
                        tracing::warn!(error = %err, "Change feed unavailable, relying on poll");
                        token.cancelled().await;
                        return;
                    }
                };
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        change = rx.recv() => match change {
                            Some(change) => bus.on_remote_notification(change),
                            None => {
                                tracing::warn!("Change feed closed, relying on poll");
                                token.cancelled().await;
                                break;
                            }
                        }
                    }
                }
            });
        }

        // 2. Same-device broadcast (push, near-zero latency)
        if let Some(broadcast) = self.broadcast.clone() {
            let bus = self.bus.clone();
            let token = tasks.shutdown_token();
            let mut rx = broadcast.subscribe();
            tasks.spawn("local_broadcast_listener", TaskKind::Listener, async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        payload = rx.recv() => match payload {
                            Ok(payload) => match serde_json::from_str::<shared::ChangeEvent>(&payload) {
                                Ok(event) => bus.on_local_broadcast(&event),
                                Err(e) => {
                                    tracing::warn!(error = %e, "Malformed broadcast payload dropped");
                                }
                            },
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                // Dropped broadcasts are recovered by the poll
                                tracing::warn!(skipped = n, "Local broadcast listener lagged");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                tracing::warn!("Local broadcast closed, relying on poll");
                                token.cancelled().await;
                                break;
                            }
                        }
                    }
                }
            });
        }

        // 3. Periodic reconciliation poll - the backstop. Runs on its own
        // fixed interval regardless of push-transport health.
        {
            let store = self.store.clone();
            let bus = self.bus.clone();
            let token = tasks.shutdown_token();
            let interval = std::time::Duration::from_secs(self.config.poll_interval_secs);
            tasks.spawn("reconcile_poll", TaskKind::Periodic, async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await; // first tick fires immediately; startup already reconciled
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            match store.read_active_orders(&OrderFilter::active_today()).await {
                                Ok(orders) => {
                                    bus.on_poll_result(orders);
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Poll read failed, retrying next tick");
                                }
                            }
                        }
                    }
                }
            });
        }

        // 4. Dedup ledger retention pruning
        {
            let ledger = self.ledger.clone();
            let token = tasks.shutdown_token();
            let interval = std::time::Duration::from_secs(self.config.prune_interval_secs);
            let retention = self.config.dedup_retention();
            tasks.spawn("ledger_prune", TaskKind::Periodic, async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let evicted = ledger.prune(shared::util::now_millis(), retention);
                            if evicted > 0 {
                                tracing::debug!(evicted, "Dedup ledger pruned");
                            }
                        }
                    }
                }
            });
        }

        tracing::info!(
            tasks = tasks.len(),
            poll_interval_secs = self.config.poll_interval_secs,
            environment = %self.config.environment,
            "Sync engine started"
        );
        self.tasks = Some(tasks);
    }

    /// Stop background tasks and wait for them to finish
    pub async fn shutdown(mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.shutdown().await;
        }
        tracing::info!("Sync engine stopped");
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("started", &self.tasks.is_some())
            .field("view_len", &self.view.len())
            .finish()
    }
}
