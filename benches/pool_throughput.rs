//! Benchmarks for pool batch throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fanout::prelude::*;

struct SumWorker;

impl Worker for SumWorker {
    type Item = u64;
    type Output = u64;

    fn process(&mut self, item: u64, output: &Queue<u64>) -> Result<()> {
        output.push((0..item % 64).sum());
        Ok(())
    }
}

fn bench_flat_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_pool");
    let size = 1000u64;

    group.throughput(Throughput::Elements(size));

    for concurrency in [1, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    let results = run_pool(0..black_box(size), |_| SumWorker, concurrency).unwrap();
                    black_box(results);
                });
            },
        );
    }

    group.finish();
}

fn bench_nested_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_pool");
    let outer = 8u64;
    let inner = 125u64;

    group.throughput(Throughput::Elements(outer * inner));

    for inner_concurrency in [1, 2, 4].iter() {
        group.bench_with_input(
            BenchmarkId::new("inner_concurrency", inner_concurrency),
            inner_concurrency,
            |b, &inner_concurrency| {
                b.iter(|| {
                    let results = run_pool(
                        0..outer,
                        |_| {
                            FanOut::new(
                                move |o: u64| -> std::result::Result<Vec<u64>, Error> {
                                    Ok((0..inner).map(|i| o * inner + i).collect())
                                },
                                |_| SumWorker,
                                PoolConfig::new().with_concurrency(inner_concurrency),
                            )
                        },
                        4,
                    )
                    .unwrap();
                    black_box(results);
                });
            },
        );
    }

    group.finish();
}

fn bench_map_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_concurrent");
    let size = 1000u64;

    group.throughput(Throughput::Elements(size));

    group.bench_function("double", |b| {
        b.iter(|| {
            let results = map_concurrent(
                0..black_box(size),
                |x: u64| Ok::<_, Error>(x * 2),
                4,
            )
            .unwrap();
            black_box(results);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_flat_pool, bench_nested_pool, bench_map_concurrent);

criterion_main!(benches);
