//! Polygon REST page source and endpoint layout.
//!
//! Requests go out one at a time over a blocking client with a fixed timeout.
//! There is no retry and no rate limiting: a failed request is reported to the
//! caller, which decides whether the run survives it.
//!
//! The API key is appended to every outgoing URL here and nowhere else. Errors
//! and logs only ever see the credential-free path and query.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use url::form_urlencoded;
use url::Url;

use super::paginator::{PageQuery, QueryKind};
use super::source::{FetchError, PageSource, RawPage};
use super::universe::UniverseFilter;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Default page size for trades and quotes, the endpoint maximum.
pub const DEFAULT_TICK_PAGE_LIMIT: usize = 50_000;

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Live Polygon REST source.
pub struct PolygonSource {
    client: reqwest::blocking::Client,
    base_url: Url,
    api_key: String,
}

impl PolygonSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::Config("API key is empty".into()));
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Config(format!(
                "base URL '{base_url}' cannot carry a path"
            )));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tickdump/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Absolute request URL for a credential-free path, with the key appended.
    ///
    /// Any `apiKey` already present in the path is replaced.
    fn url_for(&self, path_and_query: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.join(path_and_query).map_err(|e| FetchError::Cursor {
            cursor: path_and_query.to_string(),
            reason: e.to_string(),
        })?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !key.eq_ignore_ascii_case("apikey"))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("apiKey", &self.api_key);
        Ok(url)
    }
}

impl fmt::Debug for PolygonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonSource")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl PageSource for PolygonSource {
    fn name(&self) -> &str {
        "polygon"
    }

    fn get(&self, path_and_query: &str) -> Result<RawPage, FetchError> {
        let url = self.url_for(path_and_query)?;
        let network = |e: reqwest::Error| FetchError::Network {
            url: path_and_query.to_string(),
            reason: e.without_url().to_string(),
        };

        let resp = self.client.get(url).send().map_err(network)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("<non-ascii>").to_string(),
                )
            })
            .collect();
        let body = resp.bytes().map_err(network)?.to_vec();

        Ok(RawPage {
            status,
            headers,
            body,
        })
    }
}

// ── Endpoint layout ─────────────────────────────────────────────────

fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

fn tick_query(
    kind: QueryKind,
    endpoint: &str,
    symbol: &str,
    day: NaiveDate,
    limit: usize,
) -> PageQuery {
    let limit = limit.max(1);
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("timestamp", &day.format("%Y-%m-%d").to_string())
        .append_pair("limit", &limit.to_string())
        .finish();
    PageQuery::new(
        kind,
        symbol,
        format!("/v3/{endpoint}/{}?{query}", encode_segment(symbol)),
        limit,
    )
}

/// First page of a symbol's trades for one day.
pub fn trades_query(symbol: &str, day: NaiveDate, limit: usize) -> PageQuery {
    tick_query(QueryKind::Trades, "trades", symbol, day, limit)
}

/// First page of a symbol's quotes for one day.
pub fn quotes_query(symbol: &str, day: NaiveDate, limit: usize) -> PageQuery {
    tick_query(QueryKind::Quotes, "quotes", symbol, day, limit)
}

/// First page of the active ticker listing as of `day`, ascending by ticker.
pub fn tickers_query(filter: &UniverseFilter, day: NaiveDate) -> PageQuery {
    let limit = filter.page_limit.max(1);
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("market", &filter.market)
        .append_pair("type", &filter.ticker_type)
        .append_pair("date", &day.format("%Y-%m-%d").to_string())
        .append_pair("active", "true")
        .append_pair("sort", "ticker")
        .append_pair("order", "asc")
        .append_pair("limit", &limit.to_string())
        .finish();
    PageQuery::new(
        QueryKind::Tickers,
        day.to_string(),
        format!("/v3/reference/tickers?{query}"),
        limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 12, 23).unwrap()
    }

    fn source() -> PolygonSource {
        PolygonSource::new(DEFAULT_BASE_URL, "k3y", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trades_and_quotes_paths() {
        let trades = trades_query("AAPL", day(), 50_000);
        assert_eq!(
            trades.path_and_query,
            "/v3/trades/AAPL?timestamp=2022-12-23&limit=50000"
        );
        assert_eq!(trades.kind, QueryKind::Trades);
        assert_eq!(trades.limit, 50_000);

        let quotes = quotes_query("BRK/A", day(), 10);
        assert_eq!(
            quotes.path_and_query,
            "/v3/quotes/BRK%2FA?timestamp=2022-12-23&limit=10"
        );
    }

    #[test]
    fn tickers_path_filters_active_common_stock() {
        let q = tickers_query(&UniverseFilter::default(), day());
        assert_eq!(
            q.path_and_query,
            "/v3/reference/tickers?market=stocks&type=CS&date=2022-12-23&active=true&sort=ticker&order=asc&limit=1000"
        );
        assert_eq!(q.limit, 1000);
    }

    #[test]
    fn key_is_appended_once() {
        let url = source()
            .url_for("/v3/trades/AAA?cursor=abc&apiKey=stale")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.polygon.io/v3/trades/AAA?cursor=abc&apiKey=k3y"
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let shown = format!("{:?}", source());
        assert!(!shown.contains("k3y"));
        assert!(shown.contains("redacted"));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            PolygonSource::new(DEFAULT_BASE_URL, "  ", DEFAULT_TIMEOUT),
            Err(FetchError::Config(_))
        ));
        assert!(matches!(
            PolygonSource::new("not a url", "k", DEFAULT_TIMEOUT),
            Err(FetchError::Config(_))
        ));
    }
}
