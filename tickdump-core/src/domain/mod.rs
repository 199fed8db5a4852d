//! Domain types: unified events and the per-symbol archive.

pub mod archive;
pub mod event;

pub use archive::{is_chronological, SymbolArchive};
pub use event::{EventKind, QuoteEvent, TradeEvent, UnifiedEvent};
