//! Raw record shapes returned by the REST endpoints.
//!
//! Every field defaults when absent: the endpoints omit empty lists and
//! optional TRF fields, and the normalizer maps missing values to zero.

use serde::{Deserialize, Serialize};

/// One page of any listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageBody<T> {
    /// Absent when the listing is empty.
    pub results: Option<Vec<T>>,
    /// Absolute URL of the next page. Absent or empty on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl<T> PageBody<T> {
    pub fn new(results: Vec<T>, next_url: Option<String>) -> Self {
        Self {
            results: Some(results),
            next_url,
            status: Some("OK".into()),
            request_id: None,
        }
    }
}

/// `/v3/trades/{ticker}` result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeRecord {
    pub conditions: Option<Vec<i32>>,
    pub correction: Option<i32>,
    pub exchange: i32,
    pub id: String,
    pub participant_timestamp: i64,
    pub price: f64,
    pub sequence_number: i64,
    pub sip_timestamp: i64,
    pub size: i64,
    pub tape: i32,
    pub trf_id: Option<i32>,
    pub trf_timestamp: Option<i64>,
}

/// `/v3/quotes/{ticker}` result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteRecord {
    pub ask_exchange: i32,
    pub ask_price: f64,
    pub ask_size: i64,
    pub bid_exchange: i32,
    pub bid_price: f64,
    pub bid_size: i64,
    pub conditions: Option<Vec<i32>>,
    pub indicators: Option<Vec<i32>>,
    pub participant_timestamp: i64,
    pub sequence_number: i64,
    pub sip_timestamp: i64,
    pub tape: i32,
}

/// `/v3/reference/tickers` result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerRecord {
    pub ticker: String,
    pub name: String,
    pub market: String,
    pub locale: String,
    pub primary_exchange: String,
    #[serde(rename = "type")]
    pub ticker_type: String,
    pub active: bool,
    pub currency_name: String,
    pub cik: Option<String>,
    pub composite_figi: Option<String>,
    pub share_class_figi: Option<String>,
    pub last_updated_utc: Option<String>,
}
