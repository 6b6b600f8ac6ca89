//! Frame Codec Benchmarks
//!
//! Run with: cargo bench -p ethphy-core --bench frame_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ethphy_core::crc::Crc32;
use ethphy_core::{ClockRate, Frame, FrameDecoder};
use rand::rngs::StdRng;
use rand::SeedableRng;

const PAYLOAD_SIZES: [usize; 4] = [46, 256, 1024, 1500];

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let mut rng = StdRng::seed_from_u64(1);

    for len in PAYLOAD_SIZES.iter() {
        let frame = Frame::builder().num_data_bytes(*len).build(&mut rng);
        group.throughput(Throughput::Bytes(*len as u64));

        group.bench_with_input(BenchmarkId::new("to_nibbles", len), len, |b, _| {
            b.iter(|| black_box(&frame).to_nibbles())
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let mut rng = StdRng::seed_from_u64(2);

    for len in PAYLOAD_SIZES.iter() {
        let nibbles = Frame::builder().num_data_bytes(*len).build(&mut rng).to_nibbles();
        group.throughput(Throughput::Bytes(*len as u64));

        group.bench_with_input(BenchmarkId::new("from_nibbles", len), len, |b, _| {
            b.iter(|| Frame::from_nibbles(black_box(&nibbles)))
        });

        group.bench_with_input(BenchmarkId::new("decode_and_check", len), len, |b, _| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new();
                for &nibble in black_box(&nibbles) {
                    decoder.push_nibble(nibble);
                }
                decoder.complete().check(ClockRate::Clk125MHz)
            })
        });
    }

    group.finish();
}

fn bench_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32");

    for len in PAYLOAD_SIZES.iter() {
        let data: Vec<u8> = (0..*len).map(|i| i as u8).collect();
        group.throughput(Throughput::Bytes(*len as u64));

        group.bench_with_input(BenchmarkId::new("compute", len), len, |b, _| {
            b.iter(|| Crc32::compute(black_box(&data)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_crc);
criterion_main!(benches);
