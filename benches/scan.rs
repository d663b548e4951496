use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lodestore::*;
use rand::Rng;

fn populated(n: usize) -> Shard {
    let shard = Shard::new(0);
    let mut rng = rand::thread_rng();
    for i in 0..n {
        let prefix = if rng.gen_bool(0.1) { "user" } else { "item" };
        shard.execute(&["SET".to_string(), format!("{prefix}:{i}"), "v".into()]);
    }
    shard
}

fn bench_scan(c: &mut Criterion) {
    let shard = populated(10_000);
    let mut group = c.benchmark_group("scan");
    group.bench_function("full_pass_count_100", |b| {
        b.iter(|| black_box(shard.scan_iter(None, Some(100)).count()))
    });
    group.bench_function("full_pass_match", |b| {
        b.iter(|| black_box(shard.scan_iter(Some(&b"user:*"[..]), Some(100)).count()))
    });
    group.bench_function("keys_match", |b| {
        b.iter(|| black_box(shard.execute(&["KEYS", "user:*"])))
    });
    group.finish();
}

fn bench_glob(c: &mut Criterion) {
    let p = Pattern::new(b"user:*:[a-z]?me");
    c.bench_function("glob/match", |b| {
        b.iter(|| black_box(p.matches(black_box(b"user:1000:name"))))
    });
}

criterion_group!(benches, bench_scan, bench_glob);
criterion_main!(benches);
