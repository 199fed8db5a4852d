//! Seeded offline page source.
//!
//! Serves the same three listings as the REST API (tickers, trades, quotes)
//! from a deterministic generator, paginated with absolute `next_url` cursors.
//! The same seed, symbol and day always produce byte-identical pages, so runs
//! against this source produce identical archives.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use url::Url;

use super::records::{PageBody, QuoteRecord, TickerRecord, TradeRecord};
use super::source::{FetchError, PageSource, RawPage};

const SYNTHETIC_ORIGIN: &str = "https://synthetic.invalid";

/// Universe served when no symbols are given.
pub const DEFAULT_SYMBOLS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

/// Exchange ids drawn for trades and quotes.
const EXCHANGES: [i32; 6] = [1, 4, 7, 11, 12, 19];

/// FINRA TRF exchange id; trades on it carry TRF fields.
const TRF_EXCHANGE: i32 = 4;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Regular session length, 09:30 to 16:00 New York.
const SESSION_NANOS: i64 = 6 * 3600 * NANOS_PER_SEC + 1800 * NANOS_PER_SEC;

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    symbols: Vec<String>,
    events_per_kind: usize,
}

impl SyntheticSource {
    pub fn new(seed: u64, symbols: Vec<String>, events_per_kind: usize) -> Self {
        Self {
            seed,
            symbols,
            events_per_kind,
        }
    }

    /// A small fixed universe for smoke runs.
    pub fn with_default_universe(seed: u64, events_per_kind: usize) -> Self {
        Self::new(
            seed,
            DEFAULT_SYMBOLS.map(String::from).to_vec(),
            events_per_kind,
        )
    }

    fn rng_for(&self, symbol: &str, day: NaiveDate, stream: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(day.to_string().as_bytes());
        hasher.update(stream.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    /// Session open in UTC nanoseconds. Ignores DST; 14:30 UTC is close enough
    /// for generated data.
    fn session_open(day: NaiveDate) -> i64 {
        let open = NaiveTime::from_hms_opt(14, 30, 0).unwrap_or_default();
        day.and_time(open)
            .and_utc()
            .timestamp_nanos_opt()
            .unwrap_or_default()
    }

    /// Ascending timestamps with occasional exact repeats.
    fn timestamps(rng: &mut StdRng, day: NaiveDate, n: usize) -> Vec<i64> {
        let mut t = Self::session_open(day);
        let mean_gap = (SESSION_NANOS / (n.max(1) as i64)).max(1);
        (0..n)
            .map(|_| {
                if !rng.gen_bool(0.05) {
                    t += rng.gen_range(1..=2 * mean_gap);
                }
                t
            })
            .collect()
    }

    fn start_price(&self, symbol: &str, day: NaiveDate) -> f64 {
        self.rng_for(symbol, day, "price").gen_range(5.0..500.0)
    }

    pub fn trades(&self, symbol: &str, day: NaiveDate) -> Vec<TradeRecord> {
        let mut rng = self.rng_for(symbol, day, "trades");
        let mut price = self.start_price(symbol, day);
        let stamps = Self::timestamps(&mut rng, day, self.events_per_kind);

        stamps
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                price = walk(&mut rng, price);
                let exchange = EXCHANGES[rng.gen_range(0..EXCHANGES.len())];
                let on_trf = exchange == TRF_EXCHANGE;
                let size = if rng.gen_bool(0.7) {
                    100 * rng.gen_range(1..=5)
                } else {
                    rng.gen_range(1..100)
                };
                let conditions = match rng.gen_range(0..4) {
                    0 => None,
                    1 => Some(vec![37]),
                    2 => Some(vec![12, 37]),
                    _ => Some(vec![14, 41]),
                };
                TradeRecord {
                    conditions,
                    correction: None,
                    exchange,
                    id: (i + 1).to_string(),
                    participant_timestamp: t - rng.gen_range(1_000..200_000),
                    price: round_tick(price),
                    sequence_number: (i as i64 + 1) * 10,
                    sip_timestamp: t,
                    size,
                    tape: 3,
                    trf_id: on_trf.then_some(202),
                    trf_timestamp: on_trf.then(|| t - rng.gen_range(1_000..50_000)),
                }
            })
            .collect()
    }

    pub fn quotes(&self, symbol: &str, day: NaiveDate) -> Vec<QuoteRecord> {
        let mut rng = self.rng_for(symbol, day, "quotes");
        let mut mid = self.start_price(symbol, day);
        let stamps = Self::timestamps(&mut rng, day, self.events_per_kind);

        stamps
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                mid = walk(&mut rng, mid);
                let half_spread = 0.01 * rng.gen_range(1..=5) as f64 / 2.0;
                QuoteRecord {
                    ask_exchange: EXCHANGES[rng.gen_range(0..EXCHANGES.len())],
                    ask_price: round_tick(mid + half_spread),
                    ask_size: rng.gen_range(1..=20),
                    bid_exchange: EXCHANGES[rng.gen_range(0..EXCHANGES.len())],
                    bid_price: round_tick(mid - half_spread),
                    bid_size: rng.gen_range(1..=20),
                    conditions: None,
                    indicators: rng.gen_bool(0.1).then(|| vec![604]),
                    participant_timestamp: t - rng.gen_range(1_000..200_000),
                    sequence_number: (i as i64 + 1) * 10 + 5,
                    sip_timestamp: t,
                    tape: 3,
                }
            })
            .collect()
    }

    fn tickers(&self) -> Vec<TickerRecord> {
        let mut symbols = self.symbols.clone();
        symbols.sort();
        symbols
            .into_iter()
            .map(|ticker| TickerRecord {
                name: format!("{ticker} Synthetic Corp"),
                ticker,
                market: "stocks".into(),
                locale: "us".into(),
                primary_exchange: "XNAS".into(),
                ticker_type: "CS".into(),
                active: true,
                currency_name: "usd".into(),
                ..Default::default()
            })
            .collect()
    }

    /// Slice `records` at the request's cursor and wrap it as a page.
    fn page<T: Serialize>(
        &self,
        url: &Url,
        params: &HashMap<String, String>,
        records: &[T],
    ) -> RawPage {
        let offset = params
            .get("cursor")
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0)
            .min(records.len());
        let limit = params
            .get("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(1000)
            .max(1);
        let end = (offset + limit).min(records.len());

        let next_url = (end < records.len()).then(|| {
            let mut next = url.clone();
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| k != "cursor")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            next.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("cursor", &end.to_string());
            next.to_string()
        });

        let body = PageBody {
            results: Some(records[offset..end].iter().collect::<Vec<&T>>()),
            next_url,
            status: Some("OK".into()),
            request_id: Some(format!("synthetic-{}", self.seed)),
        };
        match serde_json::to_vec(&body) {
            Ok(bytes) => RawPage::ok(bytes).with_header("content-type", "application/json"),
            Err(e) => RawPage::with_status(500, e.to_string()),
        }
    }
}

fn walk(rng: &mut StdRng, price: f64) -> f64 {
    (price + rng.gen_range(-0.03..=0.03)).max(0.01)
}

fn round_tick(price: f64) -> f64 {
    (price * 10_000.0).round() / 10_000.0
}

fn bad_request(message: String) -> RawPage {
    RawPage::with_status(400, format!("{{\"status\":\"ERROR\",\"error\":\"{message}\"}}"))
}

impl PageSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn get(&self, path_and_query: &str) -> Result<RawPage, FetchError> {
        let url = Url::parse(SYNTHETIC_ORIGIN)
            .and_then(|origin| origin.join(path_and_query))
            .map_err(|e| FetchError::Cursor {
                cursor: path_and_query.to_string(),
                reason: e.to_string(),
            })?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        let day_param = |name: &str| {
            params
                .get(name)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        };

        let page = match segments.as_slice() {
            ["v3", "reference", "tickers"] => self.page(&url, &params, &self.tickers()),
            ["v3", "trades", symbol] => match day_param("timestamp") {
                Some(day) => self.page(&url, &params, &self.trades(symbol, day)),
                None => bad_request(format!("trades for {symbol} need a timestamp day")),
            },
            ["v3", "quotes", symbol] => match day_param("timestamp") {
                Some(day) => self.page(&url, &params, &self.quotes(symbol, day)),
                None => bad_request(format!("quotes for {symbol} need a timestamp day")),
            },
            _ => RawPage::with_status(404, "{\"status\":\"NOT_FOUND\"}"),
        };
        Ok(page)
    }
}
