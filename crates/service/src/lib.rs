//! Order service library.
//!
//! Order aggregates are persisted in `PostgreSQL` and mirrored in an in-memory
//! cache. This crate provides the cache, the repository, the coordinator that
//! ties them together and the HTTP surface, so they can be tested and reused
//! by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;
