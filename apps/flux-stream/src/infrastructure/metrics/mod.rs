//! Prometheus Metrics Module
//!
//! Counters and histograms recorded at the engine's hot points. Recording
//! goes through the `metrics` facade and is a no-op until a recorder is
//! installed; `init_metrics` installs the Prometheus recorder.
//!
//! # Metrics Categories
//!
//! - **Frames**: inbound frames, heartbeats and drops by reason
//! - **Cache**: skipped patch operations per service
//! - **Requests**: issued requests, cache hits, timeouts, server errors and
//!   round-trip latency per service
//! - **Connection**: reconnects by reason

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::service::Service;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus metrics recorder.
///
/// Calling this again returns the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "flux_frames_received_total",
        "Total WebSocket text messages received from the gateway"
    );
    describe_counter!("flux_heartbeats_total", "Total heartbeat frames discarded");
    describe_counter!(
        "flux_frames_dropped_total",
        "Total inbound frames dropped by reason"
    );
    describe_counter!(
        "flux_patch_ops_skipped_total",
        "Total malformed or inapplicable patch operations skipped"
    );

    // Request counters
    describe_counter!("flux_requests_total", "Total request frames sent");
    describe_counter!(
        "flux_cache_hits_total",
        "Total calls answered from the cache without a round trip"
    );
    describe_counter!(
        "flux_request_timeouts_total",
        "Total calls that timed out waiting for a frame"
    );
    describe_counter!(
        "flux_server_errors_total",
        "Total error frames returned by the gateway"
    );

    // Connection counters
    describe_counter!("flux_reconnects_total", "Total reconnects by reason");

    // Latency histograms
    describe_histogram!(
        "flux_request_seconds",
        "Time from sending a request to receiving its frame"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why an inbound frame was dropped.
#[derive(Debug, Clone, Copy)]
pub enum DropReason {
    /// Envelope or frame did not decode.
    Decode,
    /// Service tag not recognized.
    UnknownService,
    /// Frame could not be applied to the cache.
    Unapplied,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::UnknownService => "unknown_service",
            Self::Unapplied => "unapplied",
        }
    }
}

/// Why the session reconnected.
#[derive(Debug, Clone, Copy)]
pub enum ReconnectReason {
    /// Periodic scheduled reconnect.
    Scheduled,
    /// Recovery after a read failure.
    ConnectionLost,
}

impl ReconnectReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::ConnectionLost => "connection_lost",
        }
    }
}

/// Record a text message received from the gateway.
pub fn record_frame_received() {
    counter!("flux_frames_received_total").increment(1);
}

/// Record a discarded heartbeat.
pub fn record_heartbeat() {
    counter!("flux_heartbeats_total").increment(1);
}

/// Record a dropped frame.
pub fn record_frame_dropped(reason: DropReason) {
    counter!("flux_frames_dropped_total", "reason" => reason.as_str()).increment(1);
}

/// Record patch operations skipped while applying a frame.
pub fn record_patch_ops_skipped(service: Service, count: usize) {
    if count == 0 {
        return;
    }
    counter!("flux_patch_ops_skipped_total", "service" => service.as_wire())
        .increment(count as u64);
}

/// Record a request frame sent.
pub fn record_request(service: Service) {
    counter!("flux_requests_total", "service" => service.as_wire()).increment(1);
}

/// Record a call answered from the cache.
pub fn record_cache_hit(service: Service) {
    counter!("flux_cache_hits_total", "service" => service.as_wire()).increment(1);
}

/// Record a call that timed out.
pub fn record_request_timeout(service: Service) {
    counter!("flux_request_timeouts_total", "service" => service.as_wire()).increment(1);
}

/// Record an error frame from the gateway.
pub fn record_server_error(service: Service) {
    counter!("flux_server_errors_total", "service" => service.as_wire()).increment(1);
}

/// Record a reconnect.
pub fn record_reconnect(reason: ReconnectReason) {
    counter!("flux_reconnects_total", "reason" => reason.as_str()).increment(1);
}

/// Record request round-trip duration.
pub fn record_request_duration(service: Service, duration: Duration) {
    histogram!("flux_request_seconds", "service" => service.as_wire())
        .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
