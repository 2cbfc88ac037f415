//! Benchmarks for descriptor parsing
//!
//! Measures single-descriptor decoding and the chunked walk over a
//! configuration block of increasing size.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use descriptor::{descriptors, parse};

const DEVICE: [u8; 18] = [
    0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x34, 0x12, 0x78, 0x56, 0x00, 0x01, 0x01,
    0x02, 0x03, 0x01,
];

const INTERFACE: [u8; 9] = [0x09, 0x04, 0x00, 0x00, 0x02, 0xFF, 0x00, 0x00, 0x00];
const ENDPOINT_IN: [u8; 7] = [0x07, 0x05, 0x81, 0x02, 0x00, 0x02, 0x00];
const ENDPOINT_OUT: [u8; 7] = [0x07, 0x05, 0x02, 0x02, 0x00, 0x02, 0x00];

fn config_block(interfaces: u8) -> Vec<u8> {
    let total = 9 + usize::from(interfaces) * (INTERFACE.len() + 2 * ENDPOINT_IN.len());
    let [lo, hi] = (total as u16).to_le_bytes();
    let mut block = vec![0x09, 0x02, lo, hi, interfaces, 0x01, 0x00, 0x80, 0x32];
    for number in 0..interfaces {
        let mut interface = INTERFACE;
        interface[2] = number;
        block.extend_from_slice(&interface);
        block.extend_from_slice(&ENDPOINT_IN);
        block.extend_from_slice(&ENDPOINT_OUT);
    }
    block
}

fn benchmark_single_descriptors(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_descriptor");

    group.bench_function("parse_device", |b| b.iter(|| parse(black_box(&DEVICE))));
    group.bench_function("parse_endpoint", |b| {
        b.iter(|| parse(black_box(&ENDPOINT_IN)))
    });

    let string = [0x0A, 0x03, b'U', 0x00, b'S', 0x00, b'B', 0x00, b'!', 0x00];
    group.bench_function("parse_string", |b| b.iter(|| parse(black_box(&string))));

    group.finish();
}

fn benchmark_config_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_walk");

    for interfaces in [1u8, 4, 16] {
        let block = config_block(interfaces);
        group.throughput(Throughput::Bytes(block.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(interfaces),
            &block,
            |b, block| b.iter(|| descriptors(black_box(block)).filter(Result::is_ok).count()),
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_single_descriptors, benchmark_config_walk);
criterion_main!(benches);
