//! Application state shared across handlers.

use std::time::Duration;

use tokio::time::Instant;

use crate::db::OrderRepository;
use crate::service::OrderService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable; clones share the order service.
pub struct AppState<R> {
    orders: OrderService<R>,
    request_timeout: Duration,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<R: OrderRepository> AppState<R> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `orders` - Order coordinator
    /// * `request_timeout` - Deadline applied to each order request
    #[must_use]
    pub const fn new(orders: OrderService<R>, request_timeout: Duration) -> Self {
        Self {
            orders,
            request_timeout,
        }
    }

    /// Get a reference to the order coordinator.
    #[must_use]
    pub const fn orders(&self) -> &OrderService<R> {
        &self.orders
    }

    /// Deadline for a request starting now.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }
}
