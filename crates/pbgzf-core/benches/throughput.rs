use std::io::Cursor;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pbgzf_core::{PipelineConfig, compress_stream, decompress_stream};

fn corpus(len: usize) -> Vec<u8> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        // Mostly text-like bytes with some entropy so deflate has work to do.
        let byte = if state >> 61 == 0 {
            (state >> 24) as u8
        } else {
            b'a' + ((state >> 33) % 26) as u8
        };
        out.push(byte);
    }
    out
}

fn bench_compress(c: &mut Criterion) {
    let input = corpus(8 * 1024 * 1024);
    let mut group = c.benchmark_group("compress_stream");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(input.len() as u64));

    for workers in [1usize, 2, 4, 8] {
        let config = PipelineConfig::default().with_workers(workers);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &config, |b, config| {
            b.iter(|| {
                let (out, _) = compress_stream(
                    Cursor::new(black_box(input.clone())),
                    Vec::with_capacity(input.len()),
                    config,
                )
                .expect("compress_stream failed");
                out.len()
            })
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let input = corpus(8 * 1024 * 1024);
    let (compressed, _) = compress_stream(
        Cursor::new(input.clone()),
        Vec::new(),
        &PipelineConfig::default(),
    )
    .expect("seed compression failed");

    let mut group = c.benchmark_group("decompress_stream");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(input.len() as u64));

    for workers in [1usize, 2, 4, 8] {
        let config = PipelineConfig::default().with_workers(workers);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &config, |b, config| {
            b.iter(|| {
                let (out, _) = decompress_stream(
                    Cursor::new(black_box(compressed.clone())),
                    Vec::with_capacity(input.len()),
                    config,
                )
                .expect("decompress_stream failed");
                out.len()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
