//! Synthetic multi-threaded workload against an LruBloom cache

use std::thread;
use std::time::{Duration, Instant};

use lrubloom::LruBloom;
use rand::{thread_rng, Rng};
use serde::Serialize;
use tracing::debug;

/// Shape of the generated traffic
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    /// Worker threads
    pub threads: usize,
    /// Operations per thread
    pub ops: usize,
    /// Keys are drawn uniformly from `0..key_space`
    pub key_space: u64,
    /// Fraction of operations that are writes
    pub write_ratio: f64,
    /// Fraction of operations that are deletes
    pub delete_ratio: f64,
    /// Rebuild the filter every this many operations on thread 0; 0 disables
    pub rebuild_every: usize,
}

/// What the run observed
#[derive(Debug, Serialize)]
pub struct Report {
    pub elapsed_ms: u128,
    pub ops_per_sec: f64,
    pub hits: u64,
    pub misses: u64,
    pub rejections: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub rebuilds: u64,
    pub hit_ratio: f64,
    pub lru_len: Option<usize>,
    pub bloom_estimated_fpr: Option<f64>,
    /// Share of never-written keys the filter let through
    pub bloom_observed_fpr: Option<f64>,
}

/// Run `workload` and collect a [`Report`]
pub fn run(cache: &LruBloom<u64, u64>, workload: &Workload) -> Report {
    let started = Instant::now();

    thread::scope(|s| {
        for worker in 0..workload.threads {
            s.spawn(move || drive(cache, workload, worker));
        }
    });

    let elapsed = started.elapsed();
    report(cache, workload, elapsed)
}

fn drive(cache: &LruBloom<u64, u64>, workload: &Workload, worker: usize) {
    let mut rng = thread_rng();

    for op in 0..workload.ops {
        let key = rng.gen_range(0..workload.key_space);
        let roll: f64 = rng.gen();

        if roll < workload.write_ratio {
            cache.set(key, key);
        } else if roll < workload.write_ratio + workload.delete_ratio {
            cache.delete(&key);
        } else {
            cache.get(&key);
        }

        if worker == 0 && workload.rebuild_every > 0 && (op + 1) % workload.rebuild_every == 0 {
            debug!(op, "periodic rebuild");
            cache.rebuild_bloom_from_lru();
        }
    }
}

fn report(cache: &LruBloom<u64, u64>, workload: &Workload, elapsed: Duration) -> Report {
    let stats = cache.stats();
    let total_ops = (workload.threads * workload.ops) as f64;
    let secs = elapsed.as_secs_f64();

    let bloom = cache.bloom_client();
    // Keys above the key space were never written.
    let bloom_observed_fpr = bloom.as_ref().map(|filter| {
        const SAMPLES: u64 = 10_000;
        let false_hits = (0..SAMPLES)
            .map(|i| workload.key_space + i)
            .filter(|key| filter.contains(key.to_string().as_bytes()))
            .count();
        false_hits as f64 / SAMPLES as f64
    });

    Report {
        elapsed_ms: elapsed.as_millis(),
        ops_per_sec: if secs > 0.0 { total_ops / secs } else { 0.0 },
        hits: stats.hits(),
        misses: stats.misses(),
        rejections: stats.rejections(),
        inserts: stats.inserts(),
        evictions: stats.evictions(),
        expirations: stats.expirations(),
        rebuilds: stats.rebuilds(),
        hit_ratio: stats.hit_ratio(),
        lru_len: cache.lru_client().map(|store| store.len()),
        bloom_estimated_fpr: bloom.as_ref().map(|f| f.estimated_false_positive_rate()),
        bloom_observed_fpr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrubloom::{ExactConfig, FilterConfig};

    fn small_workload() -> Workload {
        Workload {
            threads: 2,
            ops: 500,
            key_space: 200,
            write_ratio: 0.5,
            delete_ratio: 0.1,
            rebuild_every: 100,
        }
    }

    #[test]
    fn test_run_counts_operations() {
        let cache = LruBloom::new(ExactConfig::default(), FilterConfig::default()).unwrap();
        let report = run(&cache, &small_workload());

        assert!(report.inserts > 0);
        assert_eq!(report.rebuilds, 5);
        assert!(report.lru_len.unwrap() <= 200);
        assert!(report.bloom_observed_fpr.is_some());
    }

    #[test]
    fn test_lru_only_has_no_bloom_figures() {
        let cache = LruBloom::new(ExactConfig::default(), FilterConfig::disabled()).unwrap();
        let report = run(&cache, &small_workload());

        assert_eq!(report.rejections, 0);
        assert_eq!(report.rebuilds, 0);
        assert!(report.bloom_estimated_fpr.is_none());
        assert!(report.bloom_observed_fpr.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let cache = LruBloom::new(ExactConfig::disabled(), FilterConfig::default()).unwrap();
        let report = run(&cache, &small_workload());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["hits"], 0);
        assert!(json["lru_len"].is_null());
    }
}
