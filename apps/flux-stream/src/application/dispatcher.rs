//! Frame Dispatcher
//!
//! Routes every inbound text message from the ingestion task. Heartbeats are
//! discarded before parsing, login acknowledgements update the auth state and
//! every data frame is applied to its cache subtree before the waiting call
//! (if any) is resolved.

use std::sync::Arc;

use crate::application::correlator::{Delivery, RequestCorrelator};
use crate::domain::cache::{PatchCache, Subtree};
use crate::domain::frame::{ErrorBody, Frame, FrameKind};
use crate::domain::market::{
    ChartData, OptionChainData, OptionQuoteData, OptionSeriesData, QuoteData, SearchData,
};
use crate::domain::service::Service;
use crate::domain::state::LinkStatus;
use crate::infrastructure::gateway::codec::{Inbound, JsonCodec};
use crate::infrastructure::metrics::{self, DropReason};

/// Demultiplexes inbound envelopes.
#[derive(Debug)]
pub struct FrameDispatcher {
    codec: JsonCodec,
    cache: Arc<PatchCache>,
    correlator: Arc<RequestCorrelator>,
    status: Arc<LinkStatus>,
    debug_frames: bool,
}

impl FrameDispatcher {
    /// Create a dispatcher feeding `cache` and `correlator`.
    #[must_use]
    pub const fn new(
        cache: Arc<PatchCache>,
        correlator: Arc<RequestCorrelator>,
        status: Arc<LinkStatus>,
        debug_frames: bool,
    ) -> Self {
        Self {
            codec: JsonCodec::new(),
            cache,
            correlator,
            status,
            debug_frames,
        }
    }

    /// Handle one inbound text message.
    pub fn dispatch(&self, text: &str) {
        metrics::record_frame_received();
        if self.debug_frames {
            tracing::trace!(frame = %text, "Inbound message");
        }

        let envelope = match self.codec.decode(text) {
            Ok(Inbound::Heartbeat) => {
                metrics::record_heartbeat();
                return;
            }
            Ok(Inbound::Envelope(envelope)) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable message");
                metrics::record_frame_dropped(DropReason::Decode);
                return;
            }
        };

        for frame in envelope.frames() {
            match frame {
                Ok(frame) => self.route(&frame),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed frame");
                    metrics::record_frame_dropped(DropReason::Decode);
                }
            }
        }
    }

    /// Clear the cache, generation counters and waiting calls.
    pub fn reset(&self) {
        self.cache.reset();
        self.correlator.reset();
    }

    fn route(&self, frame: &Frame) {
        match Service::from_wire(&frame.header.service) {
            Some(Service::Login) => self.on_login(frame),
            Some(Service::Chart) => self.apply::<ChartData>(frame),
            Some(Service::InstrumentSearch) => self.apply::<SearchData>(frame),
            Some(Service::Quotes) => self.apply::<QuoteData>(frame),
            Some(Service::OptionSeries) => self.apply::<OptionSeriesData>(frame),
            Some(Service::OptionChainGet) => self.apply::<OptionChainData>(frame),
            Some(Service::QuoteOptions) => self.apply::<OptionQuoteData>(frame),
            None => {
                tracing::debug!(service = %frame.header.service, "Dropping frame for unknown service");
                metrics::record_frame_dropped(DropReason::UnknownService);
            }
        }
    }

    fn on_login(&self, frame: &Frame) {
        if frame.header.kind == FrameKind::Error {
            let message = error_message(frame);
            tracing::error!(error = %message, "Login rejected");
            self.status.reject_login();
        } else {
            tracing::info!("Login acknowledged");
            self.status.accept_login();
        }
    }

    fn apply<T: Subtree>(&self, frame: &Frame) {
        let id = frame.header.correlation_id();

        if frame.header.kind == FrameKind::Error {
            let message = error_message(frame);
            tracing::warn!(service = %T::SERVICE, id = %id, error = %message, "Server reported error");
            metrics::record_server_error(T::SERVICE);
            self.correlator.resolve(&id, Delivery::Rejected(message));
            return;
        }

        match self.cache.apply::<T>(frame) {
            Ok(applied) => {
                metrics::record_patch_ops_skipped(T::SERVICE, applied.skipped_ops);
                let waiting = self
                    .correlator
                    .resolve(&id, Delivery::Applied(applied.document));
                tracing::trace!(service = %T::SERVICE, id = %id, ver = frame.header.ver, waiting, "Frame applied");
            }
            Err(e) => {
                tracing::warn!(service = %T::SERVICE, id = %id, error = %e, "Dropping frame");
                metrics::record_frame_dropped(DropReason::Unapplied);
            }
        }
    }
}

fn error_message(frame: &Frame) -> String {
    serde_json::from_value::<ErrorBody>(frame.body.clone()).map_or_else(
        |_| "error frame without a message".to_string(),
        |body| body.message,
    )
}
