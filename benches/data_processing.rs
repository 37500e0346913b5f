//! Benchmarks for the container write/read path and trial slicing
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use streamlog_rs::session::inclusive_range;
use streamlog_rs::{ContainerReader, ContainerWriter, SampleEncoding, StreamInfo};

const CHANNELS: usize = 32;

fn records(count: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let timestamps = (0..count).map(|i| i as f64 / 1000.0).collect();
    let rows = (0..count)
        .map(|i| (0..CHANNELS).map(|c| (i + c) as f64 * 0.5).collect())
        .collect();
    (timestamps, rows)
}

fn bench_container_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("container_append");
    let (timestamps, rows) = records(1000);

    for encoding in [SampleEncoding::F32, SampleEncoding::F64] {
        group.throughput(Throughput::Elements(timestamps.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("chunk_1000", encoding.display_name()),
            &encoding,
            |b, &encoding| {
                let dir = tempfile::tempdir().unwrap();
                let info = StreamInfo::new("bench", CHANNELS, 1000.0, encoding);
                let mut writer = ContainerWriter::create(dir.path().join("bench.bin"), &info).unwrap();
                b.iter(|| {
                    writer
                        .append_chunk(black_box(&timestamps), black_box(&rows))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_container_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("container_load");

    for size in [1000, 10_000, 100_000].iter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.bin");
        let info = StreamInfo::new("bench", CHANNELS, 1000.0, SampleEncoding::F32);
        let (timestamps, rows) = records(*size);
        let mut writer = ContainerWriter::create(&path, &info).unwrap();
        writer.append_chunk(&timestamps, &rows).unwrap();
        writer.close().unwrap();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("load", size), &path, |b, path| {
            b.iter(|| {
                let loaded = ContainerReader::load(black_box(path)).unwrap();
                black_box(loaded.record_count())
            });
        });
    }

    group.finish();
}

fn bench_trial_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("trial_range");

    for size in [10_000, 1_000_000].iter() {
        let timestamps: Vec<f64> = (0..*size).map(|i| i as f64 / 1000.0).collect();
        let start = timestamps[size / 3];
        let end = timestamps[2 * size / 3];

        group.bench_with_input(BenchmarkId::new("inclusive_range", size), &timestamps, |b, ts| {
            b.iter(|| inclusive_range(black_box(ts), black_box(start), black_box(Some(end))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_container_append,
    bench_container_load,
    bench_trial_range
);
criterion_main!(benches);
