//! In-memory mirror of order aggregates.
//!
//! [`OrderCache`] maps order identifiers to complete aggregate snapshots. It has
//! no persistence and no eviction: entries live until they are replaced,
//! deleted, or the cache is cleared.
//!
//! Every operation takes the reader/writer lock only for its own duration.
//! Aggregates are stored behind `Arc`, so a writer swaps a whole snapshot in
//! one map mutation and a reader can never observe a half-updated order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use order_service_core::{Order, OrderId};

/// Concurrent, unbounded cache of order aggregates keyed by order identifier.
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: RwLock<HashMap<OrderId, Arc<Order>>>,
}

impl OrderCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `order.order_id`.
    pub fn set(&self, order: impl Into<Arc<Order>>) {
        let order = order.into();
        self.write().insert(order.order_id.clone(), order);
    }

    /// Get the cached aggregate, or `None` if the identifier is not cached.
    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<Arc<Order>> {
        self.read().get(order_id).cloned()
    }

    /// Snapshot of every cached aggregate, in no particular order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<Order>> {
        self.read().values().cloned().collect()
    }

    /// Remove the entry if present. Has no effect on the store.
    pub fn delete(&self, order_id: &OrderId) {
        self.write().remove(order_id);
    }

    /// Merge `orders` into the cache.
    ///
    /// Supplied orders replace entries with the same identifier; entries not
    /// present in the input are kept.
    pub fn load_bulk<I>(&self, orders: I)
    where
        I: IntoIterator<Item = Order>,
    {
        // Build the snapshots before taking the lock.
        let orders: Vec<Arc<Order>> = orders.into_iter().map(Arc::new).collect();

        let mut guard = self.write();
        for order in orders {
            guard.insert(order.order_id.clone(), order);
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Poisoning is ignored: every mutation is a single map call.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<OrderId, Arc<Order>>> {
        self.orders.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<OrderId, Arc<Order>>> {
        self.orders.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use chrono::{TimeZone, Utc};
    use order_service_core::{ClientId, OrderLine, Product, ProductId};

    use super::*;

    fn order(id: &str, city: &str) -> Order {
        let mut order = Order::new(
            OrderId::parse(id).unwrap(),
            ClientId::new(42),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        order.delivery.city = city.to_owned();
        order
    }

    fn id(s: &str) -> OrderId {
        OrderId::parse(s).unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let cache = OrderCache::new();
        cache.set(order("O1", "Moscow"));

        let cached = cache.get(&id("O1")).unwrap();
        assert_eq!(cached.delivery.city, "Moscow");
        assert!(cache.get(&id("O2")).is_none());
    }

    #[test]
    fn test_set_replaces_existing_entry() {
        let cache = OrderCache::new();
        cache.set(order("O1", "Moscow"));
        cache.set(order("O1", "Kazan"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&id("O1")).unwrap().delivery.city, "Kazan");
    }

    #[test]
    fn test_get_all_returns_every_entry() {
        let cache = OrderCache::new();
        cache.set(order("O1", "Moscow"));
        cache.set(order("O2", "Kazan"));

        let mut ids: Vec<_> = cache
            .get_all()
            .iter()
            .map(|o| o.order_id.as_str().to_owned())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["O1", "O2"]);
    }

    #[test]
    fn test_delete_is_noop_for_missing_entry() {
        let cache = OrderCache::new();
        cache.set(order("O1", "Moscow"));

        cache.delete(&id("missing"));
        assert_eq!(cache.len(), 1);

        cache.delete(&id("O1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_bulk_merges() {
        let cache = OrderCache::new();
        cache.set(order("O1", "Moscow"));
        cache.set(order("O2", "Moscow"));

        cache.load_bulk(vec![order("O2", "Kazan"), order("O3", "Kazan")]);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&id("O1")).unwrap().delivery.city, "Moscow");
        assert_eq!(cache.get(&id("O2")).unwrap().delivery.city, "Kazan");
        assert!(cache.get(&id("O3")).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = OrderCache::new();
        cache.load_bulk(vec![order("O1", "Moscow"), order("O2", "Kazan")]);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get_all().is_empty());
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let cache = OrderCache::new();
        cache.set(order("O1", "Moscow"));
        let before = cache.get(&id("O1")).unwrap();

        cache.set(order("O1", "Kazan"));

        assert_eq!(before.delivery.city, "Moscow");
        assert_eq!(cache.get(&id("O1")).unwrap().delivery.city, "Kazan");
    }

    #[test]
    fn test_concurrent_readers_never_see_hybrid() {
        // v1: Moscow with one line; v2: Kazan with two lines.
        let mut v1 = order("O1", "Moscow");
        v1.items.push(OrderLine {
            product: Product {
                product_id: ProductId::new(100),
                ..Product::default()
            },
            quantity: 2,
        });
        let mut v2 = order("O1", "Kazan");
        for pid in [100, 200] {
            v2.items.push(OrderLine {
                product: Product {
                    product_id: ProductId::new(pid),
                    ..Product::default()
                },
                quantity: 1,
            });
        }

        let cache = Arc::new(OrderCache::new());
        cache.set(v1.clone());

        let writer = {
            let cache = Arc::clone(&cache);
            let (v1, v2) = (v1.clone(), v2.clone());
            thread::spawn(move || {
                for i in 0..500 {
                    cache.set(if i % 2 == 0 { v2.clone() } else { v1.clone() });
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let (v1, v2) = (v1.clone(), v2.clone());
                thread::spawn(move || {
                    for _ in 0..500 {
                        let seen = cache.get(&v1.order_id).unwrap();
                        assert!(*seen == v1 || *seen == v2, "observed a hybrid order");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
