#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Flux Stream - Patch-Synchronized Gateway Client
//!
//! Keeps a single WebSocket session to a trading platform's streaming
//! gateway and turns its multiplexed, JSON-Patch based push protocol into
//! request/response calls, while mirroring server state in a local cache.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and algorithms
//!   - `signature`: Query identity and generation counters
//!   - `frame`: Wire envelopes
//!   - `market`: Per-service data shapes
//!   - `query`: Typed queries for each service
//!   - `cache`: JSON-Patch cache with per-service subtrees
//!   - `state`: Connection and authentication state
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Frame sender, credential provider, gateway resolver
//!   - `correlator`: Correlation of calls with inbound frames
//!   - `dispatcher`: Routing of inbound frames
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `gateway`: WebSocket supervisor, writer, codec, resolver, credentials
//!   - `config`: Configuration from environment variables
//!   - `metrics`: Prometheus metrics
//!   - `telemetry`: Tracing subscriber and OpenTelemetry export
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────────┐   frames   ┌──────────────┐
//! Gateway WS ─────►│  Ingestion   │───────────►│  Dispatcher  │
//!                  │    task      │            └──────┬───────┘
//!                  └──────────────┘          apply    │   resolve
//!                                        ┌────────────┴──────────┐
//!                                        ▼                       ▼
//!                                 ┌─────────────┐        ┌──────────────┐
//!                                 │ PatchCache  │◄───────│  Correlator  │◄── Session calls
//!                                 └─────────────┘  hits  └──────┬───────┘
//!                                                               │ send
//! Gateway WS ◄──────────────────────────────────────────── GatewayWriter
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Public session facade.
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

// Session
pub use session::{MultiChart, Session};

// Domain types
pub use domain::cache::{CacheDocument, Stamped};
pub use domain::market::{
    Candles, ChartData, OptionChainData, OptionQuoteData, OptionSeriesData, QuoteData,
    QuoteField, QuoteItem, SearchData,
};
pub use domain::query::{
    ChartQuery, MultiChartQuery, OptionChainQuery, OptionQuoteQuery, OptionSeriesQuery, Query,
    QuoteQuery, SearchQuery,
};
pub use domain::service::Service;
pub use domain::signature::{CorrelationId, Signature};
pub use domain::state::{AuthState, ConnectionState};

// Application errors and ports
pub use application::correlator::{BatchOutcome, CallError};
pub use application::ports::{
    BearerToken, CredentialError, CredentialProvider, GatewayError, GatewayResolver, SendError,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Environment, SessionConfig};

// Gateway adapters
pub use infrastructure::gateway::{
    AuthError, EnvCredentials, HttpGatewayResolver, SessionError, StaticCredentials,
    StaticGatewayResolver,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
