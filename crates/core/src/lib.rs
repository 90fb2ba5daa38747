//! Order Service Core - Shared types library.
//!
//! This crate provides the order aggregate shared by every component of the
//! order service:
//! - `order-service` - Persistence, cache mirror and HTTP surface
//! - `order-service-cli` - Command-line tools for schema bootstrap and imports
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding for identifiers is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Order aggregate, delivery, payment, catalog products and
//!   type-safe identifiers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
