//! Queries
//!
//! A query describes one logical request: its normalized signature and the
//! parameters sent to the gateway. Constructors normalize their inputs, so
//! two queries built from equivalent arguments produce the same signature
//! and the same parameters.

use serde_json::{Map, Value, json};

use super::cache::Subtree;
use super::market::{
    ChartData, OptionChainData, OptionQuoteData, OptionSeriesData, QuoteData, QuoteField,
    SearchData,
};
use super::signature::{Signature, normalize, normalize_list};

/// Account name the quote service expects.
const QUOTE_ACCOUNT: &str = "COMBINED ACCOUNT";

/// A logical request against one data service.
pub trait Query: Send + Sync {
    /// Subtree the response is mirrored into.
    type Output: Subtree;

    /// Normalized identity of this query.
    fn signature(&self) -> Signature;

    /// Service-specific request parameters.
    fn params(&self) -> Value;
}

fn join_fields(fields: &[QuoteField]) -> String {
    let mut fields = fields.to_vec();
    fields.sort_unstable();
    fields.dedup();
    fields
        .iter()
        .map(QuoteField::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn sorted_fields(fields: &[QuoteField]) -> Vec<QuoteField> {
    let mut fields = fields.to_vec();
    fields.sort_unstable();
    fields.dedup();
    fields
}

fn split_list(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(',').map(str::to_string).collect()
    }
}

// =============================================================================
// Chart
// =============================================================================

/// Candle chart for one ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartQuery {
    ticker: String,
    range: String,
    width: String,
}

impl ChartQuery {
    /// Chart of `ticker` over `range` (e.g. `DAY1`) with candles of `width`
    /// (e.g. `HOUR1`).
    #[must_use]
    pub fn new(ticker: &str, range: &str, width: &str) -> Self {
        Self {
            ticker: normalize(ticker),
            range: normalize(range),
            width: normalize(width),
        }
    }

    /// Normalized ticker.
    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }
}

impl Query for ChartQuery {
    type Output = ChartData;

    fn signature(&self) -> Signature {
        Signature::new(format!("CHART#{}@{}:{}", self.ticker, self.range, self.width))
    }

    fn params(&self) -> Value {
        json!({
            "symbol": self.ticker,
            "aggregationPeriod": self.width,
            "range": self.range,
            "studies": [],
            "extendedHours": true,
        })
    }
}

/// Charts for several tickers sharing one range and width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiChartQuery {
    members: Vec<ChartQuery>,
}

impl MultiChartQuery {
    /// One chart per distinct ticker.
    #[must_use]
    pub fn new<S: AsRef<str>>(tickers: &[S], range: &str, width: &str) -> Self {
        let members = split_list(&normalize_list(tickers))
            .iter()
            .map(|ticker| ChartQuery::new(ticker, range, width))
            .collect();
        Self { members }
    }

    /// Member queries, one per ticker, in ticker order.
    #[must_use]
    pub fn members(&self) -> &[ChartQuery] {
        &self.members
    }
}

// =============================================================================
// Search
// =============================================================================

/// Instrument search by pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pattern: String,
    limit: u32,
}

impl SearchQuery {
    /// Default number of results.
    pub const DEFAULT_LIMIT: u32 = 5;

    /// Search for `pattern`, returning at most `limit` instruments.
    #[must_use]
    pub fn new(pattern: &str, limit: u32) -> Self {
        Self {
            pattern: normalize(pattern),
            limit,
        }
    }
}

impl Query for SearchQuery {
    type Output = SearchData;

    fn signature(&self) -> Signature {
        Signature::new(format!("SEARCH#{}@{}", self.pattern, self.limit))
    }

    fn params(&self) -> Value {
        json!({ "pattern": self.pattern, "limit": self.limit })
    }
}

// =============================================================================
// Quotes
// =============================================================================

/// Quotes for a set of tickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteQuery {
    tickers: String,
    refresh_rate: u32,
    fields: Vec<QuoteField>,
}

impl QuoteQuery {
    /// Default refresh rate in milliseconds.
    pub const DEFAULT_REFRESH_MS: u32 = 300;

    /// Quotes of `tickers` with the requested `fields`.
    #[must_use]
    pub fn new<S: AsRef<str>>(tickers: &[S], refresh_rate: u32, fields: &[QuoteField]) -> Self {
        Self {
            tickers: normalize_list(tickers),
            refresh_rate,
            fields: sorted_fields(fields),
        }
    }
}

impl Query for QuoteQuery {
    type Output = QuoteData;

    fn signature(&self) -> Signature {
        Signature::new(format!(
            "QUOTE#{}@{}({})",
            self.tickers,
            self.refresh_rate,
            join_fields(&self.fields)
        ))
    }

    fn params(&self) -> Value {
        json!({
            "account": QUOTE_ACCOUNT,
            "symbols": split_list(&self.tickers),
            "refreshRate": self.refresh_rate,
            "fields": self.fields,
        })
    }
}

// =============================================================================
// Options
// =============================================================================

/// Option series listed for an underlying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSeriesQuery {
    underlying: String,
}

impl OptionSeriesQuery {
    /// Series listed for `underlying`.
    #[must_use]
    pub fn new(underlying: &str) -> Self {
        Self {
            underlying: normalize(underlying),
        }
    }
}

impl Query for OptionSeriesQuery {
    type Output = OptionSeriesData;

    fn signature(&self) -> Signature {
        Signature::new(format!("OPTIONSERIES#{}", self.underlying))
    }

    fn params(&self) -> Value {
        json!({ "underlying": self.underlying })
    }
}

/// Option chain for an underlying, optionally filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionChainQuery {
    underlying: String,
    series_names: String,
    strike_quantity: Option<u32>,
}

impl OptionChainQuery {
    /// Chain of `underlying`. Empty `series_names` means every series;
    /// `None` strike quantity means every strike.
    #[must_use]
    pub fn new<S: AsRef<str>>(
        underlying: &str,
        series_names: &[S],
        strike_quantity: Option<u32>,
    ) -> Self {
        Self {
            underlying: normalize(underlying),
            series_names: normalize_list(series_names),
            strike_quantity,
        }
    }
}

impl Query for OptionChainQuery {
    type Output = OptionChainData;

    fn signature(&self) -> Signature {
        let strikes = self
            .strike_quantity
            .map_or_else(|| "ALL".to_string(), |n| n.to_string());
        Signature::new(format!(
            "OPTIONCHAIN#{}@{}:{strikes}",
            self.underlying, self.series_names
        ))
    }

    fn params(&self) -> Value {
        let mut filter = Map::new();
        if let Some(quantity) = self.strike_quantity {
            filter.insert("strikeQuantity".to_string(), json!(quantity));
        }
        if !self.series_names.is_empty() {
            filter.insert("seriesNames".to_string(), json!(split_list(&self.series_names)));
        }
        json!({ "underlyingSymbol": self.underlying, "filter": filter })
    }
}

/// Option quotes for a strike window of an underlying's chain.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionQuoteQuery {
    underlying: String,
    exchange: String,
    series_names: String,
    min_strike: f64,
    max_strike: f64,
    fields: Vec<QuoteField>,
}

impl OptionQuoteQuery {
    /// Option quotes of `underlying` on `exchange` for strikes in
    /// `[min_strike, max_strike]`.
    #[must_use]
    pub fn new<S: AsRef<str>>(
        underlying: &str,
        exchange: &str,
        series_names: &[S],
        min_strike: f64,
        max_strike: f64,
        fields: &[QuoteField],
    ) -> Self {
        Self {
            underlying: normalize(underlying),
            exchange: normalize(exchange),
            series_names: normalize_list(series_names),
            min_strike,
            max_strike,
            fields: sorted_fields(fields),
        }
    }
}

impl Query for OptionQuoteQuery {
    type Output = OptionQuoteData;

    fn signature(&self) -> Signature {
        Signature::new(format!(
            "OPTIONQUOTE#{}@{}[{}]({},{})({})",
            self.underlying,
            self.exchange,
            self.series_names,
            self.min_strike,
            self.max_strike,
            join_fields(&self.fields)
        ))
    }

    fn params(&self) -> Value {
        json!({
            "underlyingSymbol": self.underlying,
            "exchange": self.exchange,
            "filter": {
                "seriesNames": split_list(&self.series_names),
                "minStrike": self.min_strike,
                "maxStrike": self.max_strike,
            },
            "quoteFields": self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn chart_signature_and_params() {
        let query = ChartQuery::new(" aapl", "day1", "HOUR1");

        assert_eq!(query.signature().as_str(), "CHART#AAPL@DAY1:HOUR1");
        assert_eq!(
            query.params(),
            json!({
                "symbol": "AAPL",
                "aggregationPeriod": "HOUR1",
                "range": "DAY1",
                "studies": [],
                "extendedHours": true
            })
        );
    }

    #[test]
    fn multi_chart_dedups_members() {
        let query = MultiChartQuery::new(&["msft", "AAPL", "aapl", "SPY"], "DAY1", "HOUR1");
        let tickers: Vec<&str> = query.members().iter().map(ChartQuery::ticker).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT", "SPY"]);
    }

    #[test_case(&["msft", "aapl"], &[QuoteField::Bid, QuoteField::Ask] ; "unordered")]
    #[test_case(&["AAPL", "MSFT", "aapl"], &[QuoteField::Ask, QuoteField::Bid, QuoteField::Bid] ; "duplicated")]
    fn quote_signature_is_canonical(tickers: &[&str], fields: &[QuoteField]) {
        let query = QuoteQuery::new(tickers, 300, fields);
        assert_eq!(query.signature().as_str(), "QUOTE#AAPL,MSFT@300(BID,ASK)");
        assert_eq!(query.params()["symbols"], json!(["AAPL", "MSFT"]));
        assert_eq!(query.params()["account"], "COMBINED ACCOUNT");
    }

    #[test]
    fn search_signature() {
        assert_eq!(SearchQuery::new("aap", 5).signature().as_str(), "SEARCH#AAP@5");
    }

    #[test]
    fn option_chain_filter_omits_unset_fields() {
        let all = OptionChainQuery::new::<&str>("spy", &[], None);
        assert_eq!(all.signature().as_str(), "OPTIONCHAIN#SPY@:ALL");
        assert_eq!(all.params(), json!({"underlyingSymbol": "SPY", "filter": {}}));

        let filtered = OptionChainQuery::new("spy", &["17 jan 25"], Some(10));
        assert_eq!(filtered.signature().as_str(), "OPTIONCHAIN#SPY@17 JAN 25:10");
        assert_eq!(filtered.params()["filter"]["seriesNames"], json!(["17 JAN 25"]));
    }

    #[test]
    fn option_quote_signature() {
        let query = OptionQuoteQuery::new(
            "aapl",
            "bats",
            &["17 JAN 25"],
            150.0,
            200.5,
            &[QuoteField::Delta, QuoteField::Bid],
        );
        assert_eq!(
            query.signature().as_str(),
            "OPTIONQUOTE#AAPL@BATS[17 JAN 25](150,200.5)(BID,DELTA)"
        );
        assert_eq!(query.params()["quoteFields"], json!(["BID", "DELTA"]));
    }
}
