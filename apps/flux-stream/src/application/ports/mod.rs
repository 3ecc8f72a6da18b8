//! Port Interfaces
//!
//! Contracts between the request engine and the outside world. Driven
//! (outbound) ports only:
//!
//! - `FrameSender`: writes request envelopes to the gateway
//! - `CredentialProvider`: supplies the login bearer token
//! - `GatewayResolver`: locates the gateway WebSocket URL

mod credential_port;
mod frame_sender_port;
mod gateway_resolver_port;

pub use credential_port::{BearerToken, CredentialError, CredentialProvider};
pub use frame_sender_port::{FrameSender, SendError};
pub use gateway_resolver_port::{GatewayError, GatewayResolver};

#[cfg(test)]
pub use credential_port::MockCredentialProvider;
#[cfg(test)]
pub use frame_sender_port::MockFrameSender;
#[cfg(test)]
pub use gateway_resolver_port::MockGatewayResolver;
