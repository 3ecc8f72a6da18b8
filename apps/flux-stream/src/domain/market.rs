//! Market Data Subtrees
//!
//! Value types mirrored in the cache, one per data service. Field names
//! follow the gateway's camelCase JSON so that server patch paths address
//! them directly. Every type defaults all fields so a subtree can be reset
//! to its zero value and rebuilt by patches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Chart
// =============================================================================

/// Candle chart for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartData {
    /// Charted symbol.
    pub symbol: String,
    /// Instrument metadata.
    pub instrument: ChartInstrument,
    /// Candle columns.
    pub candles: Candles,
    /// Corporate events overlaid on the chart.
    pub events: Vec<ChartEvent>,
}

/// Instrument metadata attached to a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartInstrument {
    /// Symbol.
    pub symbol: String,
    /// Root symbol.
    pub root_symbol: String,
    /// Display symbol.
    pub display_symbol: String,
    /// Description.
    pub description: String,
    /// Contract multiplier.
    pub multiplier: f64,
    /// Instrument type (e.g. `EQUITY`).
    pub instrument_type: String,
    /// Whether the instrument is tradeable.
    pub tradeable: bool,
    /// Whether options are listed.
    pub has_options: bool,
}

/// Column-oriented candles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Candles {
    /// Candle open times (epoch millis).
    pub timestamps: Vec<i64>,
    /// Open prices.
    pub opens: Vec<f64>,
    /// High prices.
    pub highs: Vec<f64>,
    /// Low prices.
    pub lows: Vec<f64>,
    /// Close prices.
    pub closes: Vec<f64>,
    /// Volumes.
    pub volumes: Vec<f64>,
}

impl Candles {
    /// Number of candles (length of the timestamp column).
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether there are no candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Event marker on a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartEvent {
    /// Symbol.
    pub symbol: String,
    /// Company name.
    pub company_name: String,
    /// Whether the event has happened.
    pub is_actual: bool,
    /// Event time (epoch millis).
    pub time: i64,
}

// =============================================================================
// Instrument Search
// =============================================================================

/// Instrument search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchData {
    /// Matching instruments.
    pub instruments: Vec<SearchInstrument>,
}

/// One search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchInstrument {
    /// Description.
    pub description: String,
    /// Display symbol.
    pub display_symbol: String,
    /// Symbol.
    pub symbol: String,
}

// =============================================================================
// Quotes
// =============================================================================

/// Fields that can be requested in quote and option quote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteField {
    /// Mark price.
    Mark,
    /// Mark change.
    MarkChange,
    /// Mark percent change.
    MarkPercentChange,
    /// Net change.
    NetChange,
    /// Net change percent.
    #[serde(rename = "NET_CHANGE_PERCENT")]
    NetPercentChange,
    /// Bid.
    Bid,
    /// Bid exchange.
    BidExchange,
    /// Bid size.
    BidSize,
    /// Ask.
    Ask,
    /// Ask exchange.
    AskExchange,
    /// Ask size.
    AskSize,
    /// Last trade price.
    Last,
    /// Last trade size.
    LastSize,
    /// Last trade exchange.
    LastExchange,
    /// Volume.
    Volume,
    /// Open.
    Open,
    /// High.
    High,
    /// Low.
    Low,
    /// Close.
    Close,
    /// 52-week high.
    High52,
    /// 52-week low.
    Low52,
    /// Volume-weighted average price.
    Vwap,
    /// Implied volatility.
    ImpliedVolatility,
    /// Historical volatility, 30 days.
    #[serde(rename = "HISTORICAL_VOLATILITY_30_DAYS")]
    HistoricalVolatility30Days,
    /// Market maker move.
    MarketMakerMove,
    /// Market capitalization.
    MarketCap,
    /// Beta.
    Beta,
    /// Price/earnings ratio.
    Pe,
    /// Delta.
    Delta,
    /// Gamma.
    Gamma,
    /// Theta.
    Theta,
    /// Vega.
    Vega,
    /// Rho.
    Rho,
    /// Open interest.
    #[serde(rename = "OPEN_INT")]
    OpenInterest,
    /// Probability in the money.
    #[serde(rename = "PROBABILITY_ITM")]
    ProbabilityItm,
}

impl QuoteField {
    /// Wire name of the field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mark => "MARK",
            Self::MarkChange => "MARK_CHANGE",
            Self::MarkPercentChange => "MARK_PERCENT_CHANGE",
            Self::NetChange => "NET_CHANGE",
            Self::NetPercentChange => "NET_CHANGE_PERCENT",
            Self::Bid => "BID",
            Self::BidExchange => "BID_EXCHANGE",
            Self::BidSize => "BID_SIZE",
            Self::Ask => "ASK",
            Self::AskExchange => "ASK_EXCHANGE",
            Self::AskSize => "ASK_SIZE",
            Self::Last => "LAST",
            Self::LastSize => "LAST_SIZE",
            Self::LastExchange => "LAST_EXCHANGE",
            Self::Volume => "VOLUME",
            Self::Open => "OPEN",
            Self::High => "HIGH",
            Self::Low => "LOW",
            Self::Close => "CLOSE",
            Self::High52 => "HIGH52",
            Self::Low52 => "LOW52",
            Self::Vwap => "VWAP",
            Self::ImpliedVolatility => "IMPLIED_VOLATILITY",
            Self::HistoricalVolatility30Days => "HISTORICAL_VOLATILITY_30_DAYS",
            Self::MarketMakerMove => "MARKET_MAKER_MOVE",
            Self::MarketCap => "MARKET_CAP",
            Self::Beta => "BETA",
            Self::Pe => "PE",
            Self::Delta => "DELTA",
            Self::Gamma => "GAMMA",
            Self::Theta => "THETA",
            Self::Vega => "VEGA",
            Self::Rho => "RHO",
            Self::OpenInterest => "OPEN_INT",
            Self::ProbabilityItm => "PROBABILITY_ITM",
        }
    }
}

/// Quote values keyed by wire field name.
///
/// Values stay as raw JSON because the gateway mixes numbers (prices,
/// sizes) and strings (exchange codes) in the same map.
pub type QuoteValues = BTreeMap<String, Value>;

/// Quotes for a set of symbols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteData {
    /// One item per symbol.
    pub items: Vec<QuoteItem>,
}

/// Quote for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteItem {
    /// Symbol.
    pub symbol: String,
    /// Field values.
    pub values: QuoteValues,
}

impl QuoteItem {
    /// Numeric value of a field, if present and numeric.
    #[must_use]
    pub fn number(&self, field: QuoteField) -> Option<f64> {
        self.values.get(field.as_str()).and_then(Value::as_f64)
    }
}

// =============================================================================
// Options
// =============================================================================

/// Option series listed for an underlying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionSeriesData {
    /// Listed series.
    pub series: Vec<OptionSeries>,
}

/// One option series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionSeries {
    /// Underlying symbol.
    pub underlying: String,
    /// Series name.
    pub name: String,
    /// Shares per contract.
    pub spc: f64,
    /// Contract multiplier.
    pub multiplier: f64,
    /// Expiration style (e.g. `REGULAR`).
    pub expiration_style: String,
    /// Whether exercise is European.
    pub is_european: bool,
    /// Expiration time.
    pub expiration: Option<DateTime<Utc>>,
    /// Last trade date.
    pub last_trade_date: Option<DateTime<Utc>>,
    /// Settlement type.
    pub settlement_type: String,
}

/// Option chain for an underlying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionChainData {
    /// Series in the chain.
    pub option_series: Vec<OptionChainSeries>,
}

/// One series of an option chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionChainSeries {
    /// Expiration date.
    pub expiration: String,
    /// Human-readable expiration.
    pub expiration_string: String,
    /// Price fraction type.
    pub fractional_type: String,
    /// Strike pairs.
    pub option_pairs: Vec<OptionPair>,
    /// Shares per contract.
    pub spc: f64,
    /// Series name.
    pub name: String,
    /// Contract.
    pub contract: String,
    /// Contract display name.
    pub contract_display: String,
    /// Days to expiration.
    pub days_to_expiration: i64,
    /// Settlement type.
    pub settlement_type: String,
}

/// Call/put pair at one strike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionPair {
    /// Strike price.
    pub strike: f64,
    /// Call symbol.
    pub call_symbol: String,
    /// Put symbol.
    pub put_symbol: String,
    /// Call display symbol.
    pub call_display_symbol: String,
    /// Put display symbol.
    pub put_display_symbol: String,
}

/// Option quotes for a filtered chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionQuoteData {
    /// Quotes per option symbol.
    pub items: Vec<QuoteItem>,
    /// Exchanges contributing quotes.
    pub exchanges: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chart_decodes_partial_body() {
        let chart: ChartData = serde_json::from_value(json!({
            "symbol": "AAPL",
            "candles": {"timestamps": [1, 2], "closes": [10.0, 11.0]}
        }))
        .unwrap();

        assert_eq!(chart.symbol, "AAPL");
        assert_eq!(chart.candles.len(), 2);
        assert!(chart.candles.opens.is_empty());
    }

    #[test]
    fn quote_field_wire_names_match_serde() {
        for field in [
            QuoteField::Bid,
            QuoteField::NetPercentChange,
            QuoteField::HistoricalVolatility30Days,
            QuoteField::OpenInterest,
            QuoteField::ProbabilityItm,
            QuoteField::High52,
        ] {
            assert_eq!(serde_json::to_value(field).unwrap(), json!(field.as_str()));
        }
    }

    #[test]
    fn quote_item_number_lookup() {
        let item: QuoteItem = serde_json::from_value(json!({
            "symbol": "AAPL",
            "values": {"BID": 189.5, "BID_EXCHANGE": "Q"}
        }))
        .unwrap();

        assert_eq!(item.number(QuoteField::Bid), Some(189.5));
        assert_eq!(item.number(QuoteField::BidExchange), None);
        assert_eq!(item.number(QuoteField::Ask), None);
    }

    #[test]
    fn option_series_parses_timestamps() {
        let data: OptionSeriesData = serde_json::from_value(json!({
            "series": [{"underlying": "AAPL", "name": "17 JAN 25", "expiration": "2025-01-17T21:00:00Z"}]
        }))
        .unwrap();

        assert!(data.series[0].expiration.is_some());
        assert!(data.series[0].last_trade_date.is_none());
    }
}
