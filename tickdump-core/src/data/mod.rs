//! Fetching, normalizing and storing tick data.

pub mod archive;
pub mod counter;
pub mod fixture;
pub mod normalize;
pub mod paginator;
pub mod polygon;
pub mod records;
pub mod source;
pub mod synthetic;
pub mod universe;

pub use archive::{read_archive, ArchiveError, ArchiveInfo, ArchiveStore, ARCHIVE_EXTENSION};
pub use counter::ErrorCounter;
pub use fixture::FixtureSource;
pub use normalize::IntoEvent;
pub use paginator::{cursor_request_uri, Page, PageQuery, Paginator, QueryKind, TraversalStats};
pub use polygon::{quotes_query, tickers_query, trades_query, PolygonSource, DEFAULT_BASE_URL};
pub use records::{PageBody, QuoteRecord, TickerRecord, TradeRecord};
pub use source::{FetchError, PageSource, RawPage};
pub use synthetic::SyntheticSource;
pub use universe::{list_symbols, UniverseFilter};
