//! Gateway Services
//!
//! Every frame on the wire carries a service tag in its header. Data
//! services also own one namespace (subtree) of the cache document.

use std::fmt;

/// A service addressable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Session login.
    Login,
    /// Candle charts.
    Chart,
    /// Instrument search.
    InstrumentSearch,
    /// Option series for an underlying.
    OptionSeries,
    /// Option chain lookup.
    OptionChainGet,
    /// Streaming quotes.
    Quotes,
    /// Option quotes.
    QuoteOptions,
}

impl Service {
    /// All data-bearing services, in cache order.
    pub const DATA: [Self; 6] = [
        Self::Chart,
        Self::InstrumentSearch,
        Self::Quotes,
        Self::OptionSeries,
        Self::OptionChainGet,
        Self::QuoteOptions,
    ];

    /// Parse a wire service tag.
    #[must_use]
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "login" => Some(Self::Login),
            "chart" => Some(Self::Chart),
            "instrument_search" => Some(Self::InstrumentSearch),
            "option_series" => Some(Self::OptionSeries),
            "option_chain/get" => Some(Self::OptionChainGet),
            "quotes" => Some(Self::Quotes),
            "quotes/options" => Some(Self::QuoteOptions),
            _ => None,
        }
    }

    /// Tag used in frame headers.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Chart => "chart",
            Self::InstrumentSearch => "instrument_search",
            Self::OptionSeries => "option_series",
            Self::OptionChainGet => "option_chain/get",
            Self::Quotes => "quotes",
            Self::QuoteOptions => "quotes/options",
        }
    }

    /// Cache namespace owned by this service, `None` for login.
    #[must_use]
    pub const fn namespace(&self) -> Option<&'static str> {
        match self {
            Self::Login => None,
            Self::Chart => Some("chart"),
            Self::InstrumentSearch => Some("search"),
            Self::Quotes => Some("quote"),
            Self::OptionSeries => Some("optionSeries"),
            Self::OptionChainGet => Some("optionChain"),
            Self::QuoteOptions => Some("optionQuote"),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
