//! # Compile Benchmarks
//!
//! Performance benchmarks for the lineage-core compile pipeline and photo
//! maintenance.
//!
//! Run with: `cargo bench -p lineage-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lineage_core::{
    Assembler, LayoutConfig, LineageConfig, MemoryRecordStore, PhotoSlot, ProviderLocator, Record,
};
use std::hint::black_box;

/// A store with one zoo and `size` animals, each the child of the previous
/// one and carrying a few photos.
fn create_lineage_store(size: usize) -> MemoryRecordStore {
    let mut store = MemoryRecordStore::new(LayoutConfig::default());
    store.insert("zoos/bench/0001_zoo.txt", "[zoo]\n_id: 1\nen.name: Bench Zoo\n");

    for i in 1..=size {
        let year = 1900 + i;
        let mut text = format!(
            "[panda]\n_id: {i}\nen.name: Panda {i}\nbirthday: {year}/01/01\ngender: f\nzoo: 1\n"
        );
        if i < size {
            text.push_str(&format!("children: {}\n", i + 1));
        }
        for p in 1..=3 {
            text.push_str(&format!(
                "photo.{p}: https://example.com/{i}/{p}.jpg\nphoto.{p}.author: author{}\n",
                i % 7
            ));
        }
        store.insert(format!("pandas/bench/1_zoo/{:04}_panda.txt", i), text);
    }
    store
}

/// A record with `size` slots, every other one a duplicate, with gaps.
fn create_messy_record(size: u32) -> Record {
    let mut record = Record::new("panda");
    for i in 1..=size {
        let uri = if i % 2 == 0 {
            format!("ig://C{}", i / 4)
        } else {
            format!("https://www.instagram.com/p/C{}/", i / 4)
        };
        let mut slot = PhotoSlot::new(uri);
        slot.tags = vec![format!("{}", i % 5)];
        record.photos.insert(i * 2, slot);
    }
    record
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let config = LineageConfig::default();

    for size in [10, 100, 500] {
        let store = create_lineage_store(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| {
                let compilation = Assembler::new(&config)
                    .compile(black_box(store), None)
                    .expect("compile");
                black_box(compilation.graph.vertex_count())
            });
        });
    }
    group.finish();
}

fn bench_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");
    let provider = ProviderLocator::default();

    for size in [10u32, 100, 1000] {
        let record = create_messy_record(size);
        group.bench_with_input(BenchmarkId::new("dedupe_and_sort", size), &record, |b, record| {
            b.iter(|| {
                let mut record = record.clone();
                record.merge_duplicates(&provider, 0);
                record.reorder_by_provider_locator(&provider);
                black_box(record.photos.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_maintenance);
criterion_main!(benches);
