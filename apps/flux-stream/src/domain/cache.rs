//! Patch Cache
//!
//! Local mirror of server state. The document holds one subtree per data
//! service; each subtree remembers the correlation ID and version of the
//! frame that last produced it.
//!
//! # Application
//!
//! - `snapshot` frames replace a subtree wholesale.
//! - `patch` frames carry JSON Patch (RFC 6902) operations scoped to the
//!   bare subtree. If any operation targets the empty path the subtree is
//!   reset to its zero value first. Paths are then prefixed with the
//!   subtree's namespace and merged into a JSON copy of the whole document,
//!   which is decoded back into a typed document.
//!
//! Operations that cannot be decoded or applied are skipped individually. A
//! merged document that no longer decodes drops the whole frame.
//!
//! Every successful application publishes a new immutable
//! `Arc<CacheDocument>`; readers hold on to whatever version they loaded.

use std::sync::Arc;

use json_patch::PatchOperation;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::{Frame, FrameKind, PatchBody};
use super::market::{
    ChartData, OptionChainData, OptionQuoteData, OptionSeriesData, QuoteData, SearchData,
};
use super::service::Service;
use super::signature::CorrelationId;

// =============================================================================
// Errors
// =============================================================================

/// Reasons a frame could not be applied to the cache.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Snapshot body did not decode as the subtree type.
    #[error("snapshot body does not decode: {0}")]
    Snapshot(#[source] serde_json::Error),

    /// Patch body is not `{"patches": [...]}`.
    #[error("patch body does not decode: {0}")]
    PatchBody(#[source] serde_json::Error),

    /// Merged document no longer decodes; the frame is dropped.
    #[error("patched document does not decode: {0}")]
    Document(#[source] serde_json::Error),

    /// Frame kind carries no subtree data.
    #[error("frame kind {0:?} carries no data")]
    NoData(FrameKind),
}

// =============================================================================
// Document
// =============================================================================

/// A subtree value stamped with the frame that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamped<T> {
    /// Correlation ID of the last frame applied to this subtree.
    #[serde(default)]
    pub request_id: String,
    /// Version of the last frame applied to this subtree.
    #[serde(default)]
    pub request_ver: u64,
    /// Subtree value.
    #[serde(flatten)]
    pub data: T,
}

impl<T> Stamped<T> {
    /// Whether this subtree was produced by the given correlation ID.
    #[must_use]
    pub fn is_stamped(&self, id: &CorrelationId) -> bool {
        !self.request_id.is_empty() && id == self.request_id.as_str()
    }
}

/// The whole mirrored state, one subtree per data service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheDocument {
    /// Chart subtree.
    pub chart: Stamped<ChartData>,
    /// Instrument search subtree.
    pub search: Stamped<SearchData>,
    /// Quote subtree.
    pub quote: Stamped<QuoteData>,
    /// Option series subtree.
    pub option_series: Stamped<OptionSeriesData>,
    /// Option chain subtree.
    pub option_chain: Stamped<OptionChainData>,
    /// Option quote subtree.
    pub option_quote: Stamped<OptionQuoteData>,
}

/// A value type that owns one namespace of the cache document.
pub trait Subtree:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Service whose frames populate this subtree.
    const SERVICE: Service;

    /// Key of this subtree in the serialized document.
    const NAMESPACE: &'static str;

    /// Borrow this subtree from a document.
    fn slot(document: &CacheDocument) -> &Stamped<Self>;

    /// Mutably borrow this subtree from a document.
    fn slot_mut(document: &mut CacheDocument) -> &mut Stamped<Self>;
}

macro_rules! subtree {
    ($ty:ty, $service:expr, $field:ident, $namespace:literal) => {
        impl Subtree for $ty {
            const SERVICE: Service = $service;
            const NAMESPACE: &'static str = $namespace;

            fn slot(document: &CacheDocument) -> &Stamped<Self> {
                &document.$field
            }

            fn slot_mut(document: &mut CacheDocument) -> &mut Stamped<Self> {
                &mut document.$field
            }
        }
    };
}

subtree!(ChartData, Service::Chart, chart, "chart");
subtree!(SearchData, Service::InstrumentSearch, search, "search");
subtree!(QuoteData, Service::Quotes, quote, "quote");
subtree!(OptionSeriesData, Service::OptionSeries, option_series, "optionSeries");
subtree!(OptionChainData, Service::OptionChainGet, option_chain, "optionChain");
subtree!(OptionQuoteData, Service::QuoteOptions, option_quote, "optionQuote");

// =============================================================================
// Cache
// =============================================================================

/// Outcome of a successful application.
#[derive(Debug, Clone)]
pub struct Applied {
    /// Newly published document.
    pub document: Arc<CacheDocument>,
    /// Patch operations that were skipped as malformed or inapplicable.
    pub skipped_ops: usize,
}

/// Copy-on-write cache of the mirrored document.
#[derive(Debug, Default)]
pub struct PatchCache {
    current: RwLock<Arc<CacheDocument>>,
}

impl PatchCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CacheDocument> {
        Arc::clone(&self.current.read())
    }

    /// Whether subtree `T` was last produced by `id`.
    #[must_use]
    pub fn stamp_matches<T: Subtree>(&self, id: &CorrelationId) -> bool {
        T::slot(&self.current.read()).is_stamped(id)
    }

    /// Discard all cached state.
    pub fn reset(&self) {
        *self.current.write() = Arc::new(CacheDocument::default());
    }

    /// Apply a `snapshot` or `patch` frame to subtree `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame carries no data or does not decode. The
    /// cache is unchanged in that case.
    pub fn apply<T: Subtree>(&self, frame: &Frame) -> Result<Applied, ApplyError> {
        // Upgradable guard: readers proceed, other writers wait.
        let guard = self.current.upgradable_read();
        let base: &CacheDocument = &guard;

        let (mut next, skipped_ops) = match frame.header.kind {
            FrameKind::Snapshot => {
                let data: T =
                    serde_json::from_value(frame.body.clone()).map_err(ApplyError::Snapshot)?;
                let mut next = base.clone();
                T::slot_mut(&mut next).data = data;
                (next, 0)
            }
            FrameKind::Patch => {
                let body: PatchBody =
                    serde_json::from_value(frame.body.clone()).map_err(ApplyError::PatchBody)?;
                merge::<T>(base, &body.patches)?
            }
            kind => return Err(ApplyError::NoData(kind)),
        };

        let slot = T::slot_mut(&mut next);
        slot.request_id.clone_from(&frame.header.id);
        slot.request_ver = frame.header.ver;

        let document = Arc::new(next);
        *RwLockUpgradableReadGuard::upgrade(guard) = Arc::clone(&document);

        Ok(Applied {
            document,
            skipped_ops,
        })
    }
}

/// Merge scoped patch operations into subtree `T` of `base`.
///
/// Only subtree `T` of the result is taken from the merged JSON; every other
/// subtree is carried over from `base` untouched.
fn merge<T: Subtree>(
    base: &CacheDocument,
    patches: &[Value],
) -> Result<(CacheDocument, usize), ApplyError> {
    let mut working = base.clone();
    if patches.iter().any(is_reset_op) {
        *T::slot_mut(&mut working) = Stamped::default();
    }

    let mut tree = serde_json::to_value(&working).map_err(ApplyError::Document)?;
    let mut skipped = 0;

    for raw in patches {
        let Some(op) = scope_op(raw, T::NAMESPACE) else {
            tracing::debug!(namespace = T::NAMESPACE, op = %raw, "Skipping malformed patch op");
            skipped += 1;
            continue;
        };
        if let Err(e) = json_patch::patch(&mut tree, std::slice::from_ref(&op)) {
            tracing::debug!(namespace = T::NAMESPACE, error = %e, "Skipping inapplicable patch op");
            skipped += 1;
        }
    }

    let merged: CacheDocument = serde_json::from_value(tree).map_err(ApplyError::Document)?;
    *T::slot_mut(&mut working) = T::slot(&merged).clone();
    Ok((working, skipped))
}

fn is_reset_op(op: &Value) -> bool {
    op.get("path").and_then(Value::as_str) == Some("")
}

/// Prefix `path` (and `from`) of a raw operation with `/<namespace>`.
fn scope_op(raw: &Value, namespace: &str) -> Option<PatchOperation> {
    let mut op = raw.as_object()?.clone();
    for key in ["path", "from"] {
        if let Some(pointer) = op.get_mut(key) {
            let bare = pointer.as_str()?;
            if !bare.is_empty() && !bare.starts_with('/') {
                return None;
            }
            let scoped = format!("/{namespace}{bare}");
            *pointer = Value::String(scoped);
        }
    }
    serde_json::from_value(Value::Object(op)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::FrameHeader;
    use crate::domain::market::SearchInstrument;
    use proptest::prelude::*;
    use serde_json::json;

    fn frame(service: Service, id: &str, ver: u64, kind: FrameKind, body: Value) -> Frame {
        Frame {
            header: FrameHeader {
                service: service.as_wire().to_string(),
                id: id.to_string(),
                ver,
                kind,
            },
            body,
        }
    }

    fn patch(service: Service, id: &str, ver: u64, ops: Value) -> Frame {
        frame(service, id, ver, FrameKind::Patch, json!({ "patches": ops }))
    }

    #[test]
    fn namespaces_match_document_keys() {
        let value = serde_json::to_value(CacheDocument::default()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        for (namespace, service) in [
            (ChartData::NAMESPACE, ChartData::SERVICE),
            (SearchData::NAMESPACE, SearchData::SERVICE),
            (QuoteData::NAMESPACE, QuoteData::SERVICE),
            (OptionSeriesData::NAMESPACE, OptionSeriesData::SERVICE),
            (OptionChainData::NAMESPACE, OptionChainData::SERVICE),
            (OptionQuoteData::NAMESPACE, OptionQuoteData::SERVICE),
        ] {
            assert!(keys.contains(&namespace), "{namespace} missing from document");
            assert_eq!(service.namespace(), Some(namespace));
        }
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn snapshot_replaces_and_stamps() {
        let cache = PatchCache::new();
        let f = frame(
            Service::InstrumentSearch,
            "SEARCH#AAP@5-0",
            0,
            FrameKind::Snapshot,
            json!({"instruments": [{"symbol": "AAPL", "displaySymbol": "AAPL", "description": "Apple"}]}),
        );

        let applied = cache.apply::<SearchData>(&f).unwrap();
        let search = &applied.document.search;
        assert_eq!(search.request_id, "SEARCH#AAP@5-0");
        assert_eq!(search.data.instruments.len(), 1);
        assert!(cache.stamp_matches::<SearchData>(&CorrelationId::from_wire("SEARCH#AAP@5-0")));
    }

    #[test]
    fn reset_op_discards_previous_subtree() {
        let cache = PatchCache::new();
        cache
            .apply::<ChartData>(&patch(
                Service::Chart,
                "CHART#MSFT@DAY1:HOUR1-0",
                0,
                json!([{"op": "replace", "path": "", "value": {"symbol": "MSFT", "candles": {"timestamps": [1, 2, 3]}}}]),
            ))
            .unwrap();

        // Reset with a value missing `candles` must not inherit MSFT's candles.
        let applied = cache
            .apply::<ChartData>(&patch(
                Service::Chart,
                "CHART#AAPL@DAY1:HOUR1-0",
                0,
                json!([
                    {"op": "replace", "path": "", "value": {"symbol": "AAPL"}},
                    {"op": "add", "path": "/events/-", "value": {"symbol": "AAPL", "time": 5}}
                ]),
            ))
            .unwrap();

        let chart = &applied.document.chart;
        assert_eq!(chart.data.symbol, "AAPL");
        assert!(chart.data.candles.is_empty());
        assert_eq!(chart.data.events.len(), 1);
        assert_eq!(chart.request_id, "CHART#AAPL@DAY1:HOUR1-0");
    }

    #[test]
    fn replaying_a_reset_batch_is_idempotent() {
        let cache = PatchCache::new();
        let f = patch(
            Service::Quotes,
            "QUOTE#AAPL@300(BID)-0",
            0,
            json!([
                {"op": "replace", "path": "", "value": {"items": [{"symbol": "AAPL", "values": {}}]}},
                {"op": "add", "path": "/items/0/values/BID", "value": 189.5}
            ]),
        );

        let first = cache.apply::<QuoteData>(&f).unwrap().document;
        let second = cache.apply::<QuoteData>(&f).unwrap().document;
        assert_eq!(first, second);
    }

    #[test]
    fn incremental_patch_builds_on_current_state() {
        let cache = PatchCache::new();
        cache
            .apply::<QuoteData>(&patch(
                Service::Quotes,
                "Q-0",
                0,
                json!([{"op": "replace", "path": "", "value": {"items": [{"symbol": "AAPL", "values": {"BID": 1.0}}]}}]),
            ))
            .unwrap();

        let applied = cache
            .apply::<QuoteData>(&patch(
                Service::Quotes,
                "Q-0",
                1,
                json!([{"op": "replace", "path": "/items/0/values/BID", "value": 2.0}]),
            ))
            .unwrap();

        assert_eq!(applied.document.quote.data.items[0].values["BID"], json!(2.0));
        assert_eq!(applied.document.quote.request_ver, 1);
    }

    #[test]
    fn malformed_ops_are_skipped() {
        let cache = PatchCache::new();
        let applied = cache
            .apply::<SearchData>(&patch(
                Service::InstrumentSearch,
                "S-0",
                0,
                json!([
                    {"op": "replace", "path": "", "value": {"instruments": []}},
                    {"op": "teleport", "path": "/instruments"},
                    "not an op",
                    {"op": "remove", "path": "/instruments/7"},
                    {"op": "add", "path": "instruments", "value": []},
                    {"op": "add", "path": "/instruments/-", "value": {"symbol": "AAPL"}}
                ]),
            ))
            .unwrap();

        assert_eq!(applied.skipped_ops, 4);
        assert_eq!(
            applied.document.search.data.instruments,
            vec![SearchInstrument {
                symbol: "AAPL".to_string(),
                ..SearchInstrument::default()
            }]
        );
    }

    #[test]
    fn move_rewrites_from_pointer() {
        let cache = PatchCache::new();
        let applied = cache
            .apply::<OptionQuoteData>(&patch(
                Service::QuoteOptions,
                "OQ-0",
                0,
                json!([
                    {"op": "replace", "path": "", "value": {"exchanges": ["A", "B"]}},
                    {"op": "move", "from": "/exchanges/0", "path": "/exchanges/-"}
                ]),
            ))
            .unwrap();

        assert_eq!(applied.skipped_ops, 0);
        assert_eq!(applied.document.option_quote.data.exchanges, vec!["B", "A"]);
    }

    #[test]
    fn undecodable_document_drops_frame() {
        let cache = PatchCache::new();
        cache
            .apply::<ChartData>(&patch(
                Service::Chart,
                "C-0",
                0,
                json!([{"op": "replace", "path": "", "value": {"symbol": "AAPL"}}]),
            ))
            .unwrap();
        let before = cache.snapshot();

        let result = cache.apply::<ChartData>(&patch(
            Service::Chart,
            "C-0",
            1,
            json!([{"op": "replace", "path": "/symbol", "value": 42}]),
        ));

        assert!(matches!(result, Err(ApplyError::Document(_))));
        assert_eq!(*cache.snapshot(), *before);
    }

    #[test]
    fn error_frames_are_not_applied() {
        let cache = PatchCache::new();
        let f = frame(Service::Chart, "C-0", 0, FrameKind::Error, json!({"message": "nope"}));
        assert!(matches!(cache.apply::<ChartData>(&f), Err(ApplyError::NoData(FrameKind::Error))));
    }

    #[test]
    fn reset_clears_everything() {
        let cache = PatchCache::new();
        cache
            .apply::<SearchData>(&frame(
                Service::InstrumentSearch,
                "S-0",
                0,
                FrameKind::Snapshot,
                json!({"instruments": [{"symbol": "A"}]}),
            ))
            .unwrap();

        cache.reset();
        assert_eq!(*cache.snapshot(), CacheDocument::default());
    }

    fn arbitrary_op() -> impl Strategy<Value = Value> {
        let path = prop::sample::select(vec!["", "/symbol", "/events/-", "/candles/timestamps/-", "/x"]);
        let op = prop::sample::select(vec!["add", "replace", "remove", "test"]);
        (op, path, any::<i64>()).prop_map(|(op, path, n)| {
            let value = match path {
                "" => json!({"symbol": n.to_string()}),
                "/symbol" => json!(n.to_string()),
                "/events/-" => json!({"time": n}),
                _ => json!(n),
            };
            json!({"op": op, "path": path, "value": value})
        })
    }

    proptest! {
        #[test]
        fn patches_never_touch_other_subtrees(ops in prop::collection::vec(arbitrary_op(), 0..12)) {
            let cache = PatchCache::new();
            cache
                .apply::<SearchData>(&frame(
                    Service::InstrumentSearch,
                    "S-0",
                    0,
                    FrameKind::Snapshot,
                    json!({"instruments": [{"symbol": "AAPL"}]}),
                ))
                .unwrap();
            cache
                .apply::<QuoteData>(&frame(
                    Service::Quotes,
                    "Q-0",
                    3,
                    FrameKind::Snapshot,
                    json!({"items": [{"symbol": "AAPL", "values": {"BID": 1.5}}]}),
                ))
                .unwrap();
            let before = cache.snapshot();

            let _ = cache.apply::<ChartData>(&patch(Service::Chart, "C-0", 0, Value::Array(ops)));
            let after = cache.snapshot();

            prop_assert_eq!(&after.search, &before.search);
            prop_assert_eq!(&after.quote, &before.quote);
            prop_assert_eq!(&after.option_series, &before.option_series);
            prop_assert_eq!(&after.option_chain, &before.option_chain);
            prop_assert_eq!(&after.option_quote, &before.option_quote);
        }
    }
}
