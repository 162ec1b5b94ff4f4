//! Throughput benchmarks for the wait-free table: single-thread
//! get/put, and a snapshot of the view builder over a populated table.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use waithash::config::TableConfigBuilder;
use waithash::table::Table;

fn populated(n: u128) -> Table<u64> {
    let table = Table::new(TableConfigBuilder::new().build().unwrap());
    let handle = table.register();
    for i in 0..n {
        table.put(handle, i + 1, (i + 1) as u64);
    }
    table
}

fn bench_put(c: &mut Criterion) {
    let table = Table::<u64>::new(TableConfigBuilder::new().build().unwrap());
    let handle = table.register();
    let mut i = 0u128;
    c.bench_function("put_distinct_keys", |b| {
        b.iter(|| {
            i += 1;
            black_box(table.put(handle, i, i as u64));
        })
    });
}

fn bench_get_hit(c: &mut Criterion) {
    let table = populated(10_000);
    let handle = table.register();
    c.bench_function("get_hit", |b| {
        b.iter(|| black_box(table.get(handle, 1234)))
    });
}

fn bench_get_miss(c: &mut Criterion) {
    let table = populated(10_000);
    let handle = table.register();
    c.bench_function("get_miss", |b| {
        b.iter(|| black_box(table.get(handle, 999_999_999)))
    });
}

fn bench_view(c: &mut Criterion) {
    let table = populated(10_000);
    let handle = table.register();
    c.bench_function("view_10k", |b| b.iter(|| black_box(table.view(handle))));
}

criterion_group!(benches, bench_put, bench_get_hit, bench_get_miss, bench_view);
criterion_main!(benches);
