//! Cache invalidation registry
//!
//! Maps entity categories to the cached query results that go stale when
//! that category changes. Runs for every accepted event, poll-reconciled
//! ones included - stale caches are exactly what the poll path exists to
//! correct.

use crate::engine::traits::CacheStore;
use parking_lot::RwLock;
use shared::{ChangeEvent, StatusField};
use std::collections::HashMap;
use std::sync::Arc;

/// Entity categories whose mutation invalidates cached reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    /// The order list / order detail queries
    Orders,
    /// Kitchen display queue queries
    KitchenQueue,
    /// Order line item queries (registerable; status events do not imply it)
    OrderItems,
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityCategory::Orders => write!(f, "orders"),
            EntityCategory::KitchenQueue => write!(f, "kitchen-queue"),
            EntityCategory::OrderItems => write!(f, "order-items"),
        }
    }
}

/// Categories implied by one change event
fn categories_for(event: &ChangeEvent) -> &'static [EntityCategory] {
    match event.status_field {
        StatusField::Kitchen => &[EntityCategory::Orders, EntityCategory::KitchenQueue],
        StatusField::Service => &[EntityCategory::Orders],
    }
}

/// Static category -> cache-key mapping with purge-on-event
pub struct InvalidationRegistry {
    store: Arc<dyn CacheStore>,
    keys: RwLock<HashMap<EntityCategory, Vec<String>>>,
}

impl InvalidationRegistry {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Register cache keys that become stale when `category` changes
    pub fn register(&self, category: EntityCategory, cache_keys: Vec<String>) {
        self.keys.write().entry(category).or_default().extend(cache_keys);
    }

    /// Purge every key registered for the categories this event implies
    pub fn on_event(&self, event: &ChangeEvent) {
        let keys = self.keys.read();
        for category in categories_for(event) {
            let Some(registered) = keys.get(category) else {
                continue;
            };
            for key in registered {
                self.store.purge(key);
            }
            tracing::debug!(
                order_id = %event.order_id,
                category = %category,
                purged = registered.len(),
                "Cache keys purged"
            );
        }
    }
}

impl std::fmt::Debug for InvalidationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationRegistry")
            .field("categories", &self.keys.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared::OrderStatus;
    use shared::util::now_millis;

    #[derive(Default)]
    struct RecordingCache {
        purged: Mutex<Vec<String>>,
    }

    impl CacheStore for RecordingCache {
        fn purge(&self, key: &str) {
            self.purged.lock().push(key.to_string());
        }
    }

    fn event(field: StatusField) -> ChangeEvent {
        ChangeEvent::new("o1", field, OrderStatus::Pending, OrderStatus::Preparing, now_millis())
    }

    #[test]
    fn test_kitchen_event_purges_orders_and_queue() {
        let cache = Arc::new(RecordingCache::default());
        let registry = InvalidationRegistry::new(cache.clone());
        registry.register(EntityCategory::Orders, vec!["active-orders".into()]);
        registry.register(EntityCategory::KitchenQueue, vec!["kds-queue".into()]);
        registry.register(EntityCategory::OrderItems, vec!["item-list".into()]);

        registry.on_event(&event(StatusField::Kitchen));

        let purged = cache.purged.lock();
        assert_eq!(purged.as_slice(), &["active-orders", "kds-queue"]);
    }

    #[test]
    fn test_service_event_purges_orders_only() {
        let cache = Arc::new(RecordingCache::default());
        let registry = InvalidationRegistry::new(cache.clone());
        registry.register(EntityCategory::Orders, vec!["active-orders".into()]);
        registry.register(EntityCategory::KitchenQueue, vec!["kds-queue".into()]);

        registry.on_event(&event(StatusField::Service));

        assert_eq!(cache.purged.lock().as_slice(), &["active-orders"]);
    }

    #[test]
    fn test_unregistered_categories_are_noop() {
        let cache = Arc::new(RecordingCache::default());
        let registry = InvalidationRegistry::new(cache.clone());
        registry.on_event(&event(StatusField::Kitchen));
        assert!(cache.purged.lock().is_empty());
    }
}
