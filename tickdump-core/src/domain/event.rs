//! Unified tick events.
//!
//! Trades and quotes come from separate endpoints with different shapes. Both
//! are folded into one tagged enum that shares a single ordering key, the SIP
//! timestamp, so a symbol's day can be stored as one chronological stream.
//!
//! Serialized field names are the short Polygon-style keys (`t`, `p`, `bx`, ...)
//! because the archive encoding repeats field names on every record.

use serde::{Deserialize, Serialize};

/// Which endpoint an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Trade,
    Quote,
}

impl EventKind {
    /// Single-letter event code used in archives and logs.
    pub fn code(self) -> &'static str {
        match self {
            EventKind::Trade => "T",
            EventKind::Quote => "Q",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Trade => write!(f, "trade"),
            EventKind::Quote => write!(f, "quote"),
        }
    }
}

/// One trade or quote for one symbol, keyed by SIP timestamp (nanoseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ev")]
pub enum UnifiedEvent {
    #[serde(rename = "T")]
    Trade(TradeEvent),
    #[serde(rename = "Q")]
    Quote(QuoteEvent),
}

/// Trade fields, copied verbatim from a trade record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    #[serde(rename = "sym")]
    pub symbol: String,
    /// SIP timestamp, the ordering key.
    #[serde(rename = "t")]
    pub sip_timestamp: i64,
    #[serde(rename = "y")]
    pub participant_timestamp: i64,
    /// Trade Reporting Facility timestamp; zero when the trade has no TRF.
    #[serde(rename = "f")]
    pub trf_timestamp: i64,
    #[serde(rename = "q")]
    pub sequence_number: i64,
    #[serde(rename = "i")]
    pub trade_id: String,
    #[serde(rename = "p")]
    pub price: f64,
    #[serde(rename = "s")]
    pub size: i64,
    #[serde(rename = "x")]
    pub exchange: i32,
    #[serde(rename = "r")]
    pub trf_id: i32,
    #[serde(rename = "z")]
    pub tape: i32,
    #[serde(rename = "c")]
    pub conditions: Vec<i32>,
    #[serde(rename = "e")]
    pub correction: i32,
}

/// Quote fields, copied verbatim from a quote record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteEvent {
    #[serde(rename = "sym")]
    pub symbol: String,
    #[serde(rename = "t")]
    pub sip_timestamp: i64,
    #[serde(rename = "y")]
    pub participant_timestamp: i64,
    #[serde(rename = "q")]
    pub sequence_number: i64,
    #[serde(rename = "bx")]
    pub bid_exchange: i32,
    #[serde(rename = "bp")]
    pub bid_price: f64,
    #[serde(rename = "bs")]
    pub bid_size: i64,
    #[serde(rename = "ax")]
    pub ask_exchange: i32,
    #[serde(rename = "ap")]
    pub ask_price: f64,
    #[serde(rename = "as")]
    pub ask_size: i64,
    #[serde(rename = "c")]
    pub conditions: Vec<i32>,
    #[serde(rename = "i")]
    pub indicators: Vec<i32>,
    #[serde(rename = "z")]
    pub tape: i32,
}

impl UnifiedEvent {
    /// SIP timestamp in nanoseconds.
    pub fn timestamp(&self) -> i64 {
        match self {
            UnifiedEvent::Trade(t) => t.sip_timestamp,
            UnifiedEvent::Quote(q) => q.sip_timestamp,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            UnifiedEvent::Trade(_) => EventKind::Trade,
            UnifiedEvent::Quote(_) => EventKind::Quote,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            UnifiedEvent::Trade(t) => &t.symbol,
            UnifiedEvent::Quote(q) => &q.symbol,
        }
    }

    pub fn as_trade(&self) -> Option<&TradeEvent> {
        match self {
            UnifiedEvent::Trade(t) => Some(t),
            UnifiedEvent::Quote(_) => None,
        }
    }

    pub fn as_quote(&self) -> Option<&QuoteEvent> {
        match self {
            UnifiedEvent::Quote(q) => Some(q),
            UnifiedEvent::Trade(_) => None,
        }
    }
}
