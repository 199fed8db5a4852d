//! Page source trait and structured fetch errors.
//!
//! The PageSource trait abstracts over where pages come from (the Polygon REST
//! API, a scripted fixture, the synthetic generator) so the paginator and the
//! workers can be exercised without a network.

use thiserror::Error;

/// Longest body excerpt kept in errors and logs.
const BODY_PREVIEW_LEN: usize = 512;

/// One HTTP response as seen by the paginator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawPage {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Headers as `name: value` pairs joined with `; `, for diagnostics.
    pub fn header_dump(&self) -> String {
        self.headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Lossy UTF-8 prefix of the body.
    pub fn body_preview(&self) -> String {
        let end = self.body.len().min(BODY_PREVIEW_LEN);
        String::from_utf8_lossy(&self.body[..end]).into_owned()
    }
}

/// Errors raised while fetching or decoding a page.
///
/// `url` fields hold the request path and query only; credentials are never
/// part of them.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network unreachable for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("malformed page from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("unusable next-page cursor '{cursor}': {reason}")]
    Cursor { cursor: String, reason: String },

    #[error("source configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// Transport failures are the ones the dispatcher's failure policy applies
    /// to; everything else is attributed to the single page.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Network { .. } | FetchError::Status { .. })
    }
}

/// A paginated read-only source of JSON pages.
pub trait PageSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Issue one GET for `path_and_query`.
    ///
    /// The argument is relative to the source's base URL and carries no
    /// credential; the source adds its own. Non-success statuses are returned
    /// as pages, not errors. `Err` is reserved for requests that produced no
    /// response at all.
    fn get(&self, path_and_query: &str) -> Result<RawPage, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(RawPage::ok("{}").is_success());
        assert!(RawPage::with_status(204, "").is_success());
        assert!(!RawPage::with_status(404, "").is_success());
        assert!(!RawPage::with_status(500, "").is_success());
    }

    #[test]
    fn header_dump_lists_all_headers() {
        let page = RawPage::with_status(500, "oops")
            .with_header("x-request-id", "r1")
            .with_header("retry-after", "5");
        assert_eq!(page.header_dump(), "x-request-id: r1; retry-after: 5");
    }

    #[test]
    fn body_preview_is_bounded() {
        let page = RawPage::ok(vec![b'a'; 4096]);
        assert_eq!(page.body_preview().len(), BODY_PREVIEW_LEN);
    }

    #[test]
    fn transport_classification() {
        let status = FetchError::Status {
            status: 500,
            url: "/v3/trades/AAA".into(),
            body: String::new(),
        };
        let decode = FetchError::Decode {
            url: "/v3/trades/AAA".into(),
            reason: "eof".into(),
        };
        assert!(status.is_transport());
        assert!(!decode.is_transport());
    }
}
