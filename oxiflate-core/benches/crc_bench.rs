//! CRC-32 throughput benchmarks.
//!
//! Covers single-shot checksums across sizes (the 16-byte point sits on the
//! slicing-by-8 threshold) and chunked updates at the chunk sizes a
//! streaming compressor feeds in.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_core::crc::Crc32;
use std::hint::black_box;

fn text_like(size: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect()
}

fn bench_crc32_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32_sizes");

    for (name, size) in [
        ("16B", 16),
        ("256B", 256),
        ("4KB", 4 * 1024),
        ("64KB", 64 * 1024),
        ("1MB", 1024 * 1024),
    ] {
        let data = text_like(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| black_box(Crc32::compute(black_box(data))));
        });
    }

    group.finish();
}

fn bench_crc32_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32_chunked");
    let data = text_like(256 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk_size in [1024, 16384, 32768] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("chunks_{chunk_size}")),
            &data,
            |b, data| {
                b.iter(|| {
                    let mut crc = Crc32::new();
                    for chunk in data.chunks(chunk_size) {
                        crc.update(black_box(chunk));
                    }
                    black_box(crc.finalize())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_crc32_sizes, bench_crc32_chunked);
criterion_main!(benches);
