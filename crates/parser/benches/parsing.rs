//! Benchmarks for tool output parsing
//!
//! Measures parsing throughput for:
//! - Local listings of growing size
//! - Remote listings with many detail lines
//! - Lines that only the loose pattern recognises

use common::test_utils::{LSUSB, USBIP_LIST_REMOTE, USBIP_PORT};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use parser::{parse_attached_ports, parse_local_devices, parse_lsusb, parse_remote_devices};

fn local_listing(devices: usize) -> String {
    (1..=devices)
        .map(|i| {
            format!(
                " - busid {}-{} (1234:{:04x})\n   Test Vendor : Test Device {} (1234:{:04x})\n\n",
                i / 8 + 1,
                i % 8 + 1,
                i,
                i,
                i
            )
        })
        .collect()
}

fn benchmark_local_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_listing");

    for size in [1usize, 10, 100] {
        let output = local_listing(size);
        group.throughput(Throughput::Bytes(output.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &output, |b, output| {
            b.iter(|| parse_local_devices(black_box(output)))
        });
    }

    group.finish();
}

fn benchmark_loose_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("loose_lines");

    let output: String = (1..=50)
        .map(|i| format!("dev 1-{} [abcd:{:04x}] something\n", i, i))
        .collect();
    group.throughput(Throughput::Bytes(output.len() as u64));
    group.bench_function("loose_50", |b| {
        b.iter(|| parse_local_devices(black_box(&output)))
    });

    group.finish();
}

fn benchmark_other_surfaces(c: &mut Criterion) {
    let mut group = c.benchmark_group("other_surfaces");

    group.bench_function("remote", |b| {
        b.iter(|| parse_remote_devices(black_box(USBIP_LIST_REMOTE)))
    });
    group.bench_function("port", |b| {
        b.iter(|| parse_attached_ports(black_box(USBIP_PORT)))
    });
    group.bench_function("lsusb", |b| b.iter(|| parse_lsusb(black_box(LSUSB))));

    group.finish();
}

criterion_group!(
    benches,
    benchmark_local_listing,
    benchmark_loose_lines,
    benchmark_other_surfaces
);
criterion_main!(benches);
