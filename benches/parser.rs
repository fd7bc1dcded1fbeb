//! Reply decoding benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use relayboard::{PollScheduler, ResponseParser};

fn parser_benchmark(c: &mut Criterion) {
    // What a board sends back for one poll cycle, echo and prompt included.
    let cycle: Vec<u8> = (0..4)
        .flat_map(|i| format!("relay read {}\n\r{}\n\r>", i, i % 2).into_bytes())
        .collect();

    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(cycle.len() as u64));

    group.bench_function("whole_cycle", |b| {
        let mut parser = ResponseParser::new();
        b.iter(|| black_box(parser.push(black_box(&cycle))))
    });

    group.bench_function("byte_at_a_time", |b| {
        let mut parser = ResponseParser::new();
        b.iter(|| {
            for byte in black_box(&cycle) {
                black_box(parser.push(std::slice::from_ref(byte)));
            }
        })
    });

    group.finish();
}

fn scheduler_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");

    group.bench_function("query_build", |b| {
        let mut scheduler = PollScheduler::new(true);
        b.iter(|| black_box(scheduler.advance().read_command()))
    });

    group.finish();
}

criterion_group!(benches, parser_benchmark, scheduler_benchmark);
criterion_main!(benches);
