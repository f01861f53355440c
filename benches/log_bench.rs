use criterion::{criterion_group, criterion_main, Criterion};

use runlog::{record, Capacity, Logger};

fn bench_memory_only(c: &mut Criterion) {
    let mut logger = Logger::builder()
        .capacity(Capacity::Bounded(1000))
        .build()
        .unwrap();
    let mut step = 0u64;
    c.bench_function("log_memory_only", |b| {
        b.iter(|| {
            step += 1;
            logger
                .log(record! { "step": step, "loss": 0.125, "acc": 0.9 })
                .unwrap();
        })
    });
}

fn bench_plain_file(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut logger = Logger::builder()
        .file(dir.path().join("bench.jsonl"))
        .build()
        .unwrap();
    let mut step = 0u64;
    c.bench_function("log_plain_file", |b| {
        b.iter(|| {
            step += 1;
            logger
                .log(record! { "step": step, "loss": 0.125, "acc": 0.9 })
                .unwrap();
        })
    });
}

fn bench_compressed_file(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut logger = Logger::builder()
        .file(dir.path().join("bench.jsonl.lz4"))
        .build()
        .unwrap();
    let mut step = 0u64;
    c.bench_function("log_compressed_file", |b| {
        b.iter(|| {
            step += 1;
            logger
                .log(record! { "step": step, "loss": 0.125, "acc": 0.9 })
                .unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_memory_only,
    bench_plain_file,
    bench_compressed_file
);
criterion_main!(benches);
