//! Tickdump core: tick events, page sources, pagination and archives.
//!
//! - Domain types (trade/quote events, the per-symbol day archive)
//! - Page sources behind one trait (Polygon REST, fixtures, synthetic)
//! - Cursor-following paginator shared by every listing
//! - Compressed MessagePack archive store
//! - One-second trade bars for downstream consumers

pub mod aggregate;
pub mod data;
pub mod domain;
