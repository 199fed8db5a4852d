//! Criterion benchmarks for the per-symbol write path.
//!
//! Benchmarks:
//! 1. Stable merge-sort of appended trades and quotes
//! 2. MessagePack encode + LZ4 frame compression
//! 3. Decompress + decode
//! 4. One-second aggregation

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tickdump_core::aggregate::aggregate_seconds;
use tickdump_core::data::archive::{read_events, write_events};
use tickdump_core::data::{IntoEvent, SyntheticSource};
use tickdump_core::domain::{SymbolArchive, UnifiedEvent};

// ── Helpers ──────────────────────────────────────────────────────────

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 23).unwrap()
}

fn appended_events(per_kind: usize) -> Vec<UnifiedEvent> {
    let source = SyntheticSource::new(1, vec!["BENCH".into()], per_kind);
    source
        .trades("BENCH", day())
        .into_iter()
        .map(|r| r.into_event("BENCH"))
        .chain(
            source
                .quotes("BENCH", day())
                .into_iter()
                .map(|r| r.into_event("BENCH")),
        )
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_sort");
    for per_kind in [10_000, 100_000] {
        let events = appended_events(per_kind);
        group.bench_with_input(BenchmarkId::from_parameter(per_kind), &events, |b, events| {
            b.iter(|| SymbolArchive::from_appended("BENCH", day(), black_box(events.clone())))
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let archive = SymbolArchive::from_appended("BENCH", day(), appended_events(50_000));
    c.bench_function("encode_compress_100k", |b| {
        b.iter(|| write_events(Vec::new(), black_box(archive.events())).unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let archive = SymbolArchive::from_appended("BENCH", day(), appended_events(50_000));
    let (bytes, _) = write_events(Vec::new(), archive.events()).unwrap();
    c.bench_function("decompress_decode_100k", |b| {
        b.iter(|| read_events(black_box(bytes.as_slice())).unwrap())
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let archive = SymbolArchive::from_appended("BENCH", day(), appended_events(50_000));
    c.bench_function("aggregate_seconds_100k", |b| {
        b.iter(|| aggregate_seconds(black_box(archive.events())))
    });
}

criterion_group!(benches, bench_merge, bench_encode, bench_decode, bench_aggregate);
criterion_main!(benches);
