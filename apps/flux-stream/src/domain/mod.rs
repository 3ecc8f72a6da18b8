//! Domain Layer - Gateway protocol types and the patch cache.
//!
//! Everything here is synchronous and free of I/O: frame shapes, query
//! signatures, per-service data and the cache that mirrors it.

/// Service tags and cache namespaces.
pub mod service;

/// Query signatures, correlation IDs and generation counters.
pub mod signature;

/// Inbound and outbound frame shapes.
pub mod frame;

/// Per-service data subtrees.
pub mod market;

/// Logical queries and their request parameters.
pub mod query;

/// JSON-Patch synchronized cache document.
pub mod cache;

/// Connection and authentication status.
pub mod state;
