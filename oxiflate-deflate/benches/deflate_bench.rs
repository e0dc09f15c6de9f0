//! Compression and decompression throughput.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_deflate::{BlockStrategy, DeflateConfig, deflate, deflate_with, inflate};
use std::hint::black_box;

fn text_like(size: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"lorem", b"ipsum", b"dolor", b"sit", b"amet", b"consectetur", b"adipiscing", b"elit",
        b"sed", b"do", b"eiusmod", b"tempor",
    ];
    let mut data = Vec::with_capacity(size);
    let mut seed = 7u32;
    while data.len() < size {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        data.extend_from_slice(words[(seed >> 16) as usize % words.len()]);
        data.push(b' ');
    }
    data.truncate(size);
    data
}

fn noise(size: usize) -> Vec<u8> {
    let mut seed = 0x9E37_79B9u32;
    (0..size)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as u8
        })
        .collect()
}

fn bench_deflate_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("deflate_levels");
    let data = text_like(256 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for level in [0u8, 1, 6, 9] {
        group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
            b.iter(|| deflate(black_box(data), level));
        });
    }

    group.finish();
}

fn bench_deflate_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("deflate_strategies");
    let data = text_like(256 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for strategy in [BlockStrategy::Auto, BlockStrategy::Fixed, BlockStrategy::Dynamic] {
        let config = DeflateConfig::default().with_strategy(strategy);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{strategy:?}")),
            &data,
            |b, data| {
                b.iter(|| deflate_with(black_box(data), &config));
            },
        );
    }

    group.finish();
}

fn bench_inflate(c: &mut Criterion) {
    let mut group = c.benchmark_group("inflate");

    for (name, data) in [
        ("text", text_like(1024 * 1024)),
        ("noise", noise(1024 * 1024)),
        ("zeros", vec![0u8; 1024 * 1024]),
    ] {
        let compressed = deflate(&data, 6).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &compressed, |b, input| {
            b.iter(|| inflate(black_box(input)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deflate_levels,
    bench_deflate_strategies,
    bench_inflate
);
criterion_main!(benches);
