//! Property tests for ordering and pagination invariants.
//!
//! Uses proptest to verify:
//! 1. Archive ordering: timestamps never decrease after the merge
//! 2. Stability: equal timestamps keep append order, trades before quotes
//! 3. Pagination: every record arrives once, in at most ceil(total/limit) fetches
//! 4. Codec: archives survive encode, compress, decompress, decode unchanged

use chrono::NaiveDate;
use proptest::prelude::*;
use tickdump_core::data::archive::{read_events, write_events};
use tickdump_core::data::{
    ErrorCounter, FixtureSource, IntoEvent, PageQuery, Paginator, QueryKind, QuoteRecord,
    TradeRecord,
};
use tickdump_core::domain::{is_chronological, EventKind, SymbolArchive, UnifiedEvent};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 23).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

/// Timestamps from a narrow range so collisions are common.
fn arb_timestamp() -> impl Strategy<Value = i64> {
    0..20_i64
}

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_trades() -> impl Strategy<Value = Vec<TradeRecord>> {
    prop::collection::vec((arb_timestamp(), arb_price(), 1..1000_i64), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (t, price, size))| TradeRecord {
                sip_timestamp: t,
                price,
                size,
                id: i.to_string(),
                sequence_number: i as i64,
                ..Default::default()
            })
            .collect()
    })
}

fn arb_quotes() -> impl Strategy<Value = Vec<QuoteRecord>> {
    prop::collection::vec((arb_timestamp(), arb_price()), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (t, bid))| QuoteRecord {
                sip_timestamp: t,
                bid_price: bid,
                ask_price: bid + 0.01,
                sequence_number: i as i64,
                ..Default::default()
            })
            .collect()
    })
}

fn merged(trades: &[TradeRecord], quotes: &[QuoteRecord]) -> SymbolArchive {
    let events: Vec<UnifiedEvent> = trades
        .iter()
        .cloned()
        .map(|r| r.into_event("AAA"))
        .chain(quotes.iter().cloned().map(|r| r.into_event("AAA")))
        .collect();
    SymbolArchive::from_appended("AAA", day(), events)
}

fn sequence_of(event: &UnifiedEvent) -> i64 {
    match event {
        UnifiedEvent::Trade(t) => t.sequence_number,
        UnifiedEvent::Quote(q) => q.sequence_number,
    }
}

// ── 1-2. Ordering and stability ──────────────────────────────────────

proptest! {
    #[test]
    fn merged_archive_is_chronological(trades in arb_trades(), quotes in arb_quotes()) {
        let archive = merged(&trades, &quotes);
        prop_assert!(is_chronological(archive.events()));
        prop_assert_eq!(archive.len(), trades.len() + quotes.len());
        prop_assert_eq!(archive.count_of(EventKind::Trade), trades.len());
    }

    #[test]
    fn equal_timestamps_keep_append_order(trades in arb_trades(), quotes in arb_quotes()) {
        let archive = merged(&trades, &quotes);
        for pair in archive.events().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.timestamp() != b.timestamp() {
                continue;
            }
            // No quote may precede a trade at the same timestamp.
            prop_assert!(!(a.kind() == EventKind::Quote && b.kind() == EventKind::Trade));
            // Within a kind, arrival order (the sequence number here) is kept.
            if a.kind() == b.kind() {
                prop_assert!(sequence_of(a) < sequence_of(b));
            }
        }
    }
}

// ── 3. Pagination ────────────────────────────────────────────────────

fn paged_fixture(total: usize, limit: usize) -> FixtureSource {
    let rows: Vec<TradeRecord> = (0..total)
        .map(|i| TradeRecord {
            sip_timestamp: i as i64,
            ..Default::default()
        })
        .collect();

    let mut source = FixtureSource::new();
    let pages = total.div_ceil(limit);
    if pages == 0 {
        source.insert("/v3/trades/AAA?p=0", FixtureSource::json_page::<TradeRecord>(&[], None));
    }
    for (i, chunk) in rows.chunks(limit).enumerate() {
        let next = (i + 1 < pages)
            .then(|| format!("https://api.polygon.io:443/v3/trades/AAA?p={}", i + 1));
        source.insert(
            format!("/v3/trades/AAA?p={i}"),
            FixtureSource::json_page(chunk, next.as_deref()),
        );
    }
    source
}

proptest! {
    #[test]
    fn pagination_visits_each_record_once(total in 0..300_usize, limit in 1..64_usize) {
        let source = paged_fixture(total, limit);
        let errors = ErrorCounter::new();
        let query = PageQuery::new(QueryKind::Trades, "AAA", "/v3/trades/AAA?p=0", limit);
        let mut seen = Vec::new();

        let stats = Paginator::<TradeRecord>::new(&source, query, &errors)
            .for_each_record(|r| seen.push(r.sip_timestamp))
            .unwrap();

        let expected: Vec<i64> = (0..total as i64).collect();
        prop_assert_eq!(seen, expected);
        prop_assert!(source.fetch_count() <= total.div_ceil(limit).max(1));
        prop_assert_eq!(stats.pages, source.fetch_count());
        prop_assert_eq!(errors.count(), 0);
    }
}

// ── 4. Codec ─────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn codec_is_lossless(trades in arb_trades(), quotes in arb_quotes()) {
        let archive = merged(&trades, &quotes);
        let (bytes, digest) = write_events(Vec::new(), archive.events()).unwrap();
        prop_assert_eq!(digest.bytes, bytes.len() as u64);

        let back = read_events(bytes.as_slice()).unwrap();
        prop_assert_eq!(back.as_slice(), archive.events());
    }
}
