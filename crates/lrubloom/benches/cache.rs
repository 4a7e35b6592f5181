use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lrubloom::{ExactConfig, FilterConfig, LruBloom};

fn populated(capacity: usize, filter: FilterConfig) -> (LruBloom<String, Vec<u8>>, Vec<String>) {
    let cache = LruBloom::new(ExactConfig::default().with_capacity(capacity), filter).unwrap();
    let data = vec![b'x'; 1024];

    let keys: Vec<String> = (0..100).map(|i| format!("key-{i}")).collect();
    for key in &keys {
        cache.set(key.clone(), data.clone());
    }
    (cache, keys)
}

fn bench_cached_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    for (name, filter) in [
        ("get_1kb_with_bloom", FilterConfig::default()),
        ("get_1kb_lru_only", FilterConfig::disabled()),
    ] {
        group.bench_function(name, |b| {
            let (cache, keys) = populated(1000, filter);

            let mut counter = 0;
            b.iter(|| {
                black_box(cache.get(&keys[counter % 100]));
                counter += 1;
            });
        });
    }

    group.finish();
}

fn bench_rejection(c: &mut Criterion) {
    let mut group = c.benchmark_group("absent_key");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    let absent: Vec<String> = (0..100).map(|i| format!("absent-{i}")).collect();

    for (name, filter) in [
        ("bloom_reject", FilterConfig::default()),
        ("lru_miss", FilterConfig::disabled()),
    ] {
        group.bench_function(name, |b| {
            let (cache, _) = populated(1000, filter);

            let mut counter = 0;
            b.iter(|| {
                black_box(cache.get(&absent[counter % 100]));
                counter += 1;
            });
        });
    }

    group.finish();
}

fn bench_mixed_50_50(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("50_read_50_write", |b| {
        let (cache, keys) = populated(1000, FilterConfig::default());
        let data = vec![b'x'; 1024];

        let mut counter = 0u64;
        b.iter(|| {
            let key = &keys[(counter as usize) % 100];
            if counter % 2 == 0 {
                black_box(cache.get(key));
            } else {
                cache.set(key.clone(), data.clone());
            }
            counter += 1;
        });
    });

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");
    group.sample_size(20);

    group.bench_function("rebuild_10k", |b| {
        let cache: LruBloom<u64, u64> =
            LruBloom::new(ExactConfig::default().with_capacity(10_000), FilterConfig::default())
                .unwrap();
        for i in 0..10_000 {
            cache.set(i, i);
        }

        b.iter(|| cache.rebuild_bloom_from_lru());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cached_get,
    bench_rejection,
    bench_mixed_50_50,
    bench_rebuild
);
criterion_main!(benches);
