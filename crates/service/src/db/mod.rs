//! Database operations for the order `PostgreSQL` store.
//!
//! # Tables
//!
//! - `orders` - Order header (one row per order, upserted)
//! - `delivery` - Delivery details (one row per order, upserted)
//! - `payment` - Payment details (inserted once per order, never updated)
//! - `item` - Product catalog shared across orders (upserted)
//! - `items` - Order lines joining orders to products (inserted once per pair)
//!
//! # Schema
//!
//! The tables are created on startup by [`schema::init_schema`] when the
//! `orders` table does not exist yet. There is no migration mechanism beyond
//! that bootstrap.

pub mod memory;
pub mod orders;
pub mod schema;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use order_service_core::{Order, OrderId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryOrderRepository;
pub use orders::PgOrderRepository;

/// Number of orders returned by [`OrderRepository::get_recent_orders`].
pub const RECENT_ORDERS_LIMIT: i64 = 100;

/// The steps of a save transaction, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveStep {
    Begin,
    Header,
    Delivery,
    Payment,
    Product,
    OrderLine,
    Reload,
    Commit,
}

impl SaveStep {
    /// Human-readable step name used in error messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin transaction",
            Self::Header => "save order",
            Self::Delivery => "save delivery",
            Self::Payment => "save payment",
            Self::Product => "save product",
            Self::OrderLine => "save order line",
            Self::Reload => "reload order",
            Self::Commit => "commit transaction",
        }
    }
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sub-entity being read when a lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStage {
    Connection,
    Header,
    Delivery,
    Payment,
    OrderLines,
}

impl FetchStage {
    /// Human-readable stage name used in error messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Header => "order",
            Self::Delivery => "delivery",
            Self::Payment => "payment",
            Self::OrderLines => "order lines",
        }
    }
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during repository operations.
///
/// A missing order is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A step of the save transaction failed; the transaction was rolled back.
    #[error("failed to {step} for order {order_id}: {source}")]
    Persistence {
        order_id: OrderId,
        step: SaveStep,
        #[source]
        source: sqlx::Error,
    },

    /// Reading an order (or the recent-orders scan when `order_id` is `None`) failed.
    #[error("failed to get {stage}{}: {source}", fmt_order_suffix(.order_id.as_ref()))]
    Lookup {
        order_id: Option<OrderId>,
        stage: FetchStage,
        #[source]
        source: sqlx::Error,
    },

    /// Creating the schema failed.
    #[error("failed to {step}: {source}")]
    Schema {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

fn fmt_order_suffix(order_id: Option<&OrderId>) -> String {
    order_id.map_or_else(String::new, |id| format!(" for order {id}"))
}

impl RepositoryError {
    /// The save step that failed, for persistence failures.
    #[must_use]
    pub const fn save_step(&self) -> Option<SaveStep> {
        match self {
            Self::Persistence { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Authoritative storage of order aggregates.
///
/// Implementations must make [`save_order`](Self::save_order) atomic: either
/// every row of the aggregate is written or none is. Dropping a returned
/// future before it completes must leave the store unchanged.
pub trait OrderRepository: Send + Sync + 'static {
    /// Persist an order aggregate and return it as stored.
    ///
    /// Upserts the header, delivery and referenced products; inserts the
    /// payment and each order line only if they do not exist yet. The
    /// returned aggregate is read back before commit, so it carries the kept
    /// payment and lines and the column precision of the store.
    fn save_order(
        &self,
        order: &Order,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Fetch an order aggregate, or `None` if no header row exists.
    fn get_order(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Fetch the [`RECENT_ORDERS_LIMIT`] most recently created orders,
    /// newest first.
    fn get_recent_orders(&self) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Check that the store answers queries.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_names_step_and_order() {
        let err = RepositoryError::Persistence {
            order_id: OrderId::parse("O1").unwrap(),
            step: SaveStep::Payment,
            source: sqlx::Error::RowNotFound,
        };
        let message = err.to_string();
        assert!(message.starts_with("failed to save payment for order O1"));
        assert_eq!(err.save_step(), Some(SaveStep::Payment));
    }

    #[test]
    fn test_lookup_error_without_order() {
        let err = RepositoryError::Lookup {
            order_id: None,
            stage: FetchStage::Header,
            source: sqlx::Error::PoolTimedOut,
        };
        assert!(err.to_string().starts_with("failed to get order: "));
        assert_eq!(err.save_step(), None);
    }

    #[test]
    fn test_lookup_error_with_order() {
        let err = RepositoryError::Lookup {
            order_id: Some(OrderId::parse("O7").unwrap()),
            stage: FetchStage::OrderLines,
            source: sqlx::Error::PoolTimedOut,
        };
        assert!(err.to_string().starts_with("failed to get order lines for order O7: "));
    }
}
