//! Core types for the order service.
//!
//! This module provides the order aggregate and type-safe wrappers for its
//! identifiers.

pub mod id;
pub mod order;
pub mod order_id;

pub use id::*;
pub use order::{DEFAULT_CURRENCY, Delivery, Order, OrderLine, Payment, Product};
pub use order_id::{OrderId, OrderIdError};
