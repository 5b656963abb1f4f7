//! Benchmarks for grouping and archive building.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use climate_archiver::archive::build_archive;
use climate_archiver::grouping::{group_by_deciphered_date, group_by_size};
use climate_archiver::models::FileEntry;
use std::fs;
use tempfile::TempDir;

/// Daily files spread over several years with known sizes
fn daily_files(count: usize) -> Vec<FileEntry> {
    (0..count)
        .map(|i| {
            let year = 1980 + i / 365;
            let month = (i / 28) % 12 + 1;
            let day = i % 28 + 1;
            FileEntry::with_size(
                format!("/data/era5/tas_{:04}-{:02}-{:02}.nc", year, month, day),
                (i as u64 % 7 + 1) * 1024 * 1024,
            )
        })
        .collect()
}

/// Benchmark date grouping for growing file counts
fn bench_group_by_date(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_by_deciphered_date");

    for count in [100, 1_000, 10_000] {
        let files = daily_files(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &files, |b, files| {
            b.iter(|| group_by_deciphered_date(black_box(files)));
        });
    }

    group.finish();
}

/// Benchmark size grouping against different thresholds
fn bench_group_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_by_size");
    let files = daily_files(10_000);

    for (threshold, name) in [(64 * 1024 * 1024, "64MiB"), (1024 * 1024 * 1024, "1GiB")] {
        group.bench_with_input(BenchmarkId::new("threshold", name), &threshold, |b, threshold| {
            b.iter(|| group_by_size(black_box(&files), *threshold).unwrap());
        });
    }

    group.finish();
}

/// Benchmark writing archives in memory, with and without gzip
fn bench_build_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_archive");
    let temp_dir = TempDir::new().unwrap();

    let files: Vec<FileEntry> = (1..=10)
        .map(|day| {
            let path = temp_dir.path().join(format!("2020-01-{:02}.nc", day));
            fs::write(&path, vec![day as u8; 256 * 1024]).unwrap();
            FileEntry::new(path)
        })
        .collect();
    group.throughput(Throughput::Bytes(10 * 256 * 1024));

    for compression in [false, true] {
        let name = if compression { "tar.gz" } else { "tar" };
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut buffer = Vec::new();
                build_archive(black_box(&files), temp_dir.path(), compression, false, &mut buffer)
                    .unwrap();
                buffer
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_group_by_date, bench_group_by_size, bench_build_archive);
criterion_main!(benches);
