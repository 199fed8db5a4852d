//! One-second trade bars from an archived event stream.
//!
//! Trades are folded into buckets keyed by the floor of their SIP timestamp to
//! the whole second. Quotes are ignored. Input must be in archive order; each
//! bucket's open is its first trade and its close its last.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{TradeEvent, UnifiedEvent};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One second of trading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondBar {
    /// Shares traded.
    #[serde(rename = "v")]
    pub volume: i64,
    #[serde(rename = "vw")]
    pub vwap: f64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    /// Distinct exchange ids in order of first appearance.
    #[serde(rename = "x")]
    pub exchanges: Vec<i32>,
    /// Number of trades.
    #[serde(rename = "n")]
    pub ticks: u64,
    /// Timestamp of the bucket's last trade, Unix milliseconds.
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
}

/// Running state of the bucket being filled.
struct Bucket {
    second: i64,
    bar: SecondBar,
    notional: f64,
}

impl Bucket {
    fn open(second: i64, trade: &TradeEvent) -> Self {
        Self {
            second,
            bar: SecondBar {
                volume: trade.size,
                vwap: 0.0,
                open: trade.price,
                close: trade.price,
                high: trade.price,
                low: trade.price,
                exchanges: vec![trade.exchange],
                ticks: 1,
                timestamp_ms: trade.sip_timestamp.div_euclid(NANOS_PER_MILLI),
            },
            notional: trade.price * trade.size as f64,
        }
    }

    fn add(&mut self, trade: &TradeEvent) {
        let bar = &mut self.bar;
        bar.close = trade.price;
        // Zero prices show up on some condition codes; they never set an extreme.
        if trade.price != 0.0 {
            bar.high = bar.high.max(trade.price);
            bar.low = bar.low.min(trade.price);
        }
        if !bar.exchanges.contains(&trade.exchange) {
            bar.exchanges.push(trade.exchange);
        }
        bar.volume += trade.size;
        bar.ticks += 1;
        bar.timestamp_ms = trade.sip_timestamp.div_euclid(NANOS_PER_MILLI);
        self.notional += trade.price * trade.size as f64;
    }

    fn close(mut self) -> SecondBar {
        self.bar.vwap = if self.bar.volume > 0 {
            self.notional / self.bar.volume as f64
        } else {
            self.bar.close
        };
        self.bar
    }
}

/// Fold the trades in `events` into one-second bars, oldest first.
pub fn aggregate_seconds(events: &[UnifiedEvent]) -> Vec<SecondBar> {
    let mut bars = Vec::new();
    let mut current: Option<Bucket> = None;

    for trade in events.iter().filter_map(UnifiedEvent::as_trade) {
        let second = trade.sip_timestamp.div_euclid(NANOS_PER_SEC);
        if let Some(bucket) = current.as_mut().filter(|b| b.second == second) {
            bucket.add(trade);
            continue;
        }
        if let Some(done) = current.replace(Bucket::open(second, trade)) {
            bars.push(done.close());
        }
    }
    if let Some(done) = current {
        bars.push(done.close());
    }
    bars
}

#[derive(Serialize)]
struct BarsDocument<'a> {
    results: &'a [SecondBar],
}

/// Write bars as `{"results": [...]}`.
pub fn write_json<W: Write>(mut writer: W, bars: &[SecondBar]) -> Result<(), AggregateError> {
    serde_json::to_writer_pretty(&mut writer, &BarsDocument { results: bars })?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write bars as CSV with a header row. Exchanges are `;`-separated.
pub fn write_csv<W: Write>(writer: W, bars: &[SecondBar]) -> Result<(), AggregateError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["t", "o", "h", "l", "c", "v", "vw", "n", "x"])?;
    for bar in bars {
        let exchanges = bar
            .exchanges
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            &bar.timestamp_ms.to_string(),
            &bar.open.to_string(),
            &bar.high.to_string(),
            &bar.low.to_string(),
            &bar.close.to_string(),
            &bar.volume.to_string(),
            &format!("{:.6}", bar.vwap),
            &bar.ticks.to_string(),
            &exchanges,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
