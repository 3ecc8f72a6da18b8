//! Application Layer - Request correlation and frame routing.
//!
//! This layer turns the multiplexed frame stream into request/response
//! calls and defines the ports it needs from the outside world.

/// Port interfaces for external systems (transport, credentials, discovery).
pub mod ports;

/// Correlation of calls with inbound frames.
pub mod correlator;

/// Routing of inbound messages to the cache and waiting calls.
pub mod dispatcher;
