//! Order coordinator.
//!
//! [`OrderService`] puts the [`OrderCache`] in front of an [`OrderRepository`]:
//!
//! - **Writes** go to the repository first; after the commit the cache takes
//!   the aggregate as the repository stored it (first payment and lines kept,
//!   column precision applied), never the submitted value.
//! - **Reads** are served from the cache when possible. A miss reads the
//!   repository and backfills the cache if the order exists.
//! - **Warm-up** merges the most recent orders into the cache at startup. It
//!   is bounded, so older orders are only cached once they are looked up.
//!
//! Every operation takes a deadline. When it elapses the store future is
//! dropped (which rolls back an open transaction) and
//! [`OrderError::DeadlineExceeded`] is returned.
//!
//! Two concurrent saves of the same order may commit in one order and update
//! the cache in the other; the cached value is whichever `set` ran last.

use std::future::Future;
use std::sync::Arc;

use order_service_core::{Order, OrderId};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::cache::OrderCache;
use crate::db::{OrderRepository, RepositoryError};

/// Errors returned by [`OrderService`] operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The caller's deadline elapsed before the store answered.
    #[error("{operation} timed out{}", fmt_order_suffix(.order_id.as_ref()))]
    DeadlineExceeded {
        operation: &'static str,
        order_id: Option<OrderId>,
    },
}

fn fmt_order_suffix(order_id: Option<&OrderId>) -> String {
    order_id.map_or_else(String::new, |id| format!(" for order {id}"))
}

/// Read-through, write-through access to order aggregates.
///
/// Cloning is cheap; clones share the repository and the cache.
pub struct OrderService<R> {
    inner: Arc<OrderServiceInner<R>>,
}

struct OrderServiceInner<R> {
    repository: R,
    cache: OrderCache,
}

impl<R> Clone for OrderService<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: OrderRepository> OrderService<R> {
    /// Create a service owning `repository` and `cache`.
    #[must_use]
    pub fn new(repository: R, cache: OrderCache) -> Self {
        Self {
            inner: Arc::new(OrderServiceInner { repository, cache }),
        }
    }

    /// The cache mirror.
    #[must_use]
    pub fn cache(&self) -> &OrderCache {
        &self.inner.cache
    }

    /// The authoritative repository.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.inner.repository
    }

    /// Persist an order, then cache the stored aggregate.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the save failed and
    /// `OrderError::DeadlineExceeded` if `deadline` elapsed first. The cache
    /// is untouched in both cases.
    #[instrument(skip(self, order, deadline), fields(order_id = %order.order_id))]
    pub async fn save_order(&self, order: Order, deadline: Instant) -> Result<(), OrderError> {
        let saved = with_deadline(
            deadline,
            "save order",
            Some(&order.order_id),
            self.inner.repository.save_order(&order),
        )
        .await??;

        info!(lines = saved.items.len(), "order saved");
        self.inner.cache.set(saved);
        Ok(())
    }

    /// Get an order from the cache, falling back to the repository.
    ///
    /// Returns `Ok(None)` if the order does not exist; the cache is not
    /// modified in that case.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the lookup failed and
    /// `OrderError::DeadlineExceeded` if `deadline` elapsed first.
    #[instrument(skip(self, deadline), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: &OrderId,
        deadline: Instant,
    ) -> Result<Option<Arc<Order>>, OrderError> {
        if let Some(order) = self.inner.cache.get(order_id) {
            debug!("cache hit");
            return Ok(Some(order));
        }
        debug!("cache miss");

        let found = with_deadline(
            deadline,
            "get order",
            Some(order_id),
            self.inner.repository.get_order(order_id),
        )
        .await??;

        Ok(found.map(|order| {
            let order = Arc::new(order);
            self.inner.cache.set(Arc::clone(&order));
            order
        }))
    }

    /// Merge the most recent orders from the repository into the cache.
    ///
    /// Returns the number of orders loaded.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the read failed and
    /// `OrderError::DeadlineExceeded` if `deadline` elapsed first. The cache
    /// is untouched in both cases.
    #[instrument(skip(self, deadline))]
    pub async fn warm_cache(&self, deadline: Instant) -> Result<usize, OrderError> {
        let orders = with_deadline(
            deadline,
            "warm cache",
            None,
            self.inner.repository.get_recent_orders(),
        )
        .await??;

        let count = orders.len();
        self.inner.cache.load_bulk(orders);
        info!(count, "loaded orders into cache");
        Ok(count)
    }

    /// Drop an order from the cache only; the store is not touched.
    pub fn evict(&self, order_id: &OrderId) {
        self.inner.cache.delete(order_id);
    }
}

async fn with_deadline<T>(
    deadline: Instant,
    operation: &'static str,
    order_id: Option<&OrderId>,
    fut: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<Result<T, RepositoryError>, OrderError> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| OrderError::DeadlineExceeded {
            operation,
            order_id: order_id.cloned(),
        })
}
