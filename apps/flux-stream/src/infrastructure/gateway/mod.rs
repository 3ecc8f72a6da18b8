//! Gateway Adapters
//!
//! WebSocket connection to the streaming gateway and the HTTP lookup that
//! locates it.
//!
//! # Components
//!
//! - [`supervisor`]: connection lifecycle, ingestion task, reconnection
//! - [`writer`]: serialized send path, implements the `FrameSender` port
//! - [`scheduler`]: periodic reconnect task
//! - [`codec`]: JSON encoding and heartbeat detection
//! - [`messages`]: handshake, login and discovery wire types
//! - [`auth`]: credential providers
//! - [`resolver`]: gateway URL resolution

pub mod auth;
pub mod codec;
pub mod messages;
pub mod resolver;
pub mod scheduler;
pub mod supervisor;
pub mod writer;

pub use auth::{ACCESS_TOKEN_VAR, AuthError, EnvCredentials, StaticCredentials};
pub use codec::{CodecError, Inbound, JsonCodec};
pub use resolver::{HttpGatewayResolver, StaticGatewayResolver};
pub use scheduler::ReconnectScheduler;
pub use supervisor::{ConnectionSupervisor, SessionError};
pub use writer::GatewayWriter;
