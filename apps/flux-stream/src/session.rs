//! Session
//!
//! Public entry point: one long-lived gateway session exposing market data
//! calls. Cloning a `Session` shares the same connection and cache.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use flux_stream::{EnvCredentials, Session, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new(SessionConfig::from_env()?, Arc::new(EnvCredentials::default()));
//! session.open().await?;
//!
//! let chart = session.chart("AAPL", "DAY1", "HOUR1").await?;
//! println!("{} candles", chart.data.candles.len());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::application::correlator::{CallError, RequestCorrelator};
use crate::application::dispatcher::FrameDispatcher;
use crate::application::ports::{CredentialProvider, GatewayResolver};
use crate::domain::cache::{CacheDocument, PatchCache, Stamped};
use crate::domain::market::{
    ChartData, OptionChainData, OptionQuoteData, OptionSeriesData, QuoteData, QuoteField,
    SearchData,
};
use crate::domain::query::{
    ChartQuery, MultiChartQuery, OptionChainQuery, OptionQuoteQuery, OptionSeriesQuery,
    QuoteQuery, SearchQuery,
};
use crate::domain::state::{AuthState, ConnectionState, LinkStatus};
use crate::infrastructure::config::SessionConfig;
use crate::infrastructure::gateway::{
    ConnectionSupervisor, GatewayWriter, HttpGatewayResolver, SessionError,
};

/// Result of a batched chart call.
#[derive(Debug, Clone, Default)]
pub struct MultiChart {
    /// Charts received, in normalized ticker order. Tickers are
    /// upper-cased, sorted and de-duplicated before the request is sent.
    pub charts: Vec<Stamped<ChartData>>,
    /// Tickers that failed, with the reason.
    pub failed: Vec<(String, CallError)>,
}

/// Handle to a gateway session.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    config: SessionConfig,
    cache: Arc<PatchCache>,
    correlator: Arc<RequestCorrelator>,
    dispatcher: Arc<FrameDispatcher>,
    status: Arc<LinkStatus>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.supervisor.shutdown();
    }
}

impl Session {
    /// Create a closed session that resolves the gateway over HTTP.
    #[must_use]
    pub fn new(config: SessionConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let resolver = Arc::new(HttpGatewayResolver::new(
            config.config_url.clone(),
            config.environment,
        ));
        Self::with_resolver(config, credentials, resolver)
    }

    /// Create a closed session with a custom gateway resolver.
    #[must_use]
    pub fn with_resolver(
        config: SessionConfig,
        credentials: Arc<dyn CredentialProvider>,
        resolver: Arc<dyn GatewayResolver>,
    ) -> Self {
        let writer = Arc::new(GatewayWriter::new());
        let cache = Arc::new(PatchCache::new());
        let status = Arc::new(LinkStatus::new());
        let correlator = Arc::new(RequestCorrelator::new(writer.clone(), cache.clone()));
        let dispatcher = Arc::new(FrameDispatcher::new(
            cache.clone(),
            correlator.clone(),
            status.clone(),
            config.debug_frames,
        ));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            config.clone(),
            resolver,
            credentials,
            writer,
            dispatcher.clone(),
            status.clone(),
        ));

        Self {
            inner: Arc::new(SessionInner {
                config,
                cache,
                correlator,
                dispatcher,
                status,
                supervisor,
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect, negotiate and log in.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyOpen`] if the session is open, or the
    /// first failure of the setup sequence.
    pub async fn open(&self) -> Result<(), SessionError> {
        self.inner.supervisor.open().await
    }

    /// Close the connection and stop scheduled reconnects.
    pub async fn close(&self) {
        self.inner.supervisor.close().await;
    }

    /// Clear the cache and generation counters and abandon waiting calls.
    /// The connection is left untouched.
    pub fn reset(&self) {
        self.inner.dispatcher.reset();
    }

    /// Whether handshake and login succeeded and ingestion is running.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.inner.status.is_established()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.status.connection()
    }

    /// Current authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.status.auth()
    }

    /// Snapshot of the mirrored server state.
    #[must_use]
    pub fn cache(&self) -> Arc<CacheDocument> {
        self.inner.cache.snapshot()
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Number of calls waiting for a frame.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Candles for `ticker` over `range`, aggregated by `width`.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn chart(
        &self,
        ticker: &str,
        range: &str,
        width: &str,
    ) -> Result<Stamped<ChartData>, CallError> {
        let query = ChartQuery::new(ticker, range, width);
        self.inner
            .correlator
            .call(&query, self.inner.config.timeouts.default)
            .await
    }

    /// Charts for several tickers in one envelope. Tickers that do not
    /// answer before the batch deadline are listed in `failed`.
    ///
    /// Each distinct ticker is requested once; results come back sorted by
    /// normalized ticker, not in the order given.
    ///
    /// # Errors
    ///
    /// Returns `Send` if the envelope could not be written.
    pub async fn charts<S: AsRef<str>>(
        &self,
        tickers: &[S],
        range: &str,
        width: &str,
    ) -> Result<MultiChart, CallError> {
        let query = MultiChartQuery::new(tickers, range, width);
        let members = query.members();
        let outcome = self
            .inner
            .correlator
            .call_batch(members, self.inner.config.timeouts.batch)
            .await?;

        Ok(MultiChart {
            charts: outcome
                .succeeded
                .into_iter()
                .map(|(_, chart)| chart)
                .collect(),
            failed: outcome
                .failed
                .into_iter()
                .map(|(index, error)| (members[index].ticker().to_string(), error))
                .collect(),
        })
    }

    /// Instruments matching `pattern`, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn search(&self, pattern: &str, limit: u32) -> Result<Stamped<SearchData>, CallError> {
        let query = SearchQuery::new(pattern, limit);
        self.inner
            .correlator
            .call(&query, self.inner.config.timeouts.default)
            .await
    }

    /// Option series listed for `underlying`.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn option_series(
        &self,
        underlying: &str,
    ) -> Result<Stamped<OptionSeriesData>, CallError> {
        let query = OptionSeriesQuery::new(underlying);
        self.inner
            .correlator
            .call(&query, self.inner.config.timeouts.default)
            .await
    }

    /// Option chain of `underlying` restricted to `series_names`, with
    /// `strike_quantity` strikes around the money (all when `None`).
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn option_chain<S: AsRef<str>>(
        &self,
        underlying: &str,
        series_names: &[S],
        strike_quantity: Option<u32>,
    ) -> Result<Stamped<OptionChainData>, CallError> {
        let query = OptionChainQuery::new(underlying, series_names, strike_quantity);
        self.inner
            .correlator
            .call(&query, self.inner.config.timeouts.default)
            .await
    }

    /// Option quotes. Uses the longer option quote deadline.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn option_quote(
        &self,
        query: &OptionQuoteQuery,
    ) -> Result<Stamped<OptionQuoteData>, CallError> {
        self.inner
            .correlator
            .call(query, self.inner.config.timeouts.option_quote)
            .await
    }

    /// Quotes for `tickers` with the requested fields.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn quote<S: AsRef<str>>(
        &self,
        tickers: &[S],
        fields: &[QuoteField],
    ) -> Result<Stamped<QuoteData>, CallError> {
        let query = QuoteQuery::new(tickers, QuoteQuery::DEFAULT_REFRESH_MS, fields);
        self.inner
            .correlator
            .call(&query, self.inner.config.timeouts.default)
            .await
    }
}
