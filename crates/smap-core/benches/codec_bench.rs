//! Criterion benchmarks for the smap-core codec.
//!
//! Measures metadata flattening, record building and full batch
//! encode/decode for batches of increasing size.
//!
//! Run with:
//! ```bash
//! cargo bench --package smap-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use smap_core::{
    build_record, decode_frame, flatten, BatchRequest, Document, KeyPathConfig, Node, NodeMap,
    PathRecord, Reading,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_metadata() -> NodeMap {
    let mut instrument = NodeMap::new();
    instrument.insert("Manufacturer".into(), Node::from("Acme"));
    instrument.insert("Model".into(), Node::from("PM-7"));
    let mut location = NodeMap::new();
    location.insert("Building".into(), Node::from("Soda Hall"));
    location.insert("Floor".into(), Node::from("4"));
    location.insert("Room".into(), Node::from("410"));

    let mut metadata = NodeMap::new();
    metadata.insert("Site".into(), Node::from("Test Site"));
    metadata.insert("Instrument".into(), Node::Map(instrument));
    metadata.insert("Location".into(), Node::Map(location));
    metadata
}

fn make_record(readings: usize) -> PathRecord {
    let mut properties = NodeMap::new();
    properties.insert("UnitofMeasure".into(), Node::from("V"));
    properties.insert("UnitofTime".into(), Node::from("s"));
    PathRecord {
        contents: vec![],
        properties,
        metadata: make_metadata(),
        readings: (0..readings)
            .map(|i| Reading::new(1_400_000_000_000 + i as i64, i as f64 * 0.5))
            .collect(),
        uuid: Some("b86df176-6b40-5d58-8f29-3b85f5cfbf1e".into()),
    }
}

fn make_document(paths: usize) -> Document {
    (0..paths)
        .map(|i| (format!("/fast/sensor{i}"), make_record(10)))
        .collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_flatten(c: &mut Criterion) {
    let metadata = make_metadata();
    let config = KeyPathConfig::default();
    c.bench_function("flatten_metadata", |b| {
        b.iter(|| flatten("", black_box(&metadata), &config))
    });
}

fn bench_build_record(c: &mut Criterion) {
    let record = make_record(10);
    let config = KeyPathConfig::default();
    c.bench_function("build_record_10_readings", |b| {
        b.iter(|| build_record("/fast/sensor0", black_box(&record), &config))
    });
}

fn bench_batch(c: &mut Criterion) {
    let config = KeyPathConfig::default();
    let mut group = c.benchmark_group("batch");
    for paths in [1usize, 10, 100] {
        let doc = make_document(paths);
        group.bench_with_input(BenchmarkId::new("build_encode", paths), &doc, |b, doc| {
            b.iter(|| {
                BatchRequest::build("apikey", black_box(doc), &config)
                    .and_then(|batch| batch.encode())
            })
        });

        let frame = BatchRequest::build("apikey", &doc, &config)
            .and_then(|batch| batch.encode())
            .expect("fixture encodes");
        group.bench_with_input(BenchmarkId::new("decode_read", paths), &frame, |b, frame| {
            b.iter(|| decode_frame(black_box(frame), &config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_flatten, bench_build_record, bench_batch);
criterion_main!(benches);
