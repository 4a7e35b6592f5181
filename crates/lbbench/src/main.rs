//! lbbench - drive an LruBloom cache with a synthetic workload

mod workload;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lrubloom::{CacheConfig, ExactConfig, FilterConfig, LruBloom};
use tracing::info;

use crate::workload::Workload;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON cache config; overrides the layer flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the LRU layer
    #[arg(long)]
    no_lru: bool,

    /// LRU capacity (number of items)
    #[arg(short, long, default_value_t = 1000)]
    capacity: usize,

    /// LRU entry lifetime in milliseconds (0 = never expire)
    #[arg(long, default_value_t = 0)]
    ttl_ms: u64,

    /// Disable the Bloom layer
    #[arg(long)]
    no_bloom: bool,

    /// Expected distinct keys for filter sizing
    #[arg(long, default_value_t = 10_000)]
    expected: usize,

    /// Target false positive rate
    #[arg(long, default_value_t = 0.01)]
    fp_rate: f64,

    /// Worker threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Operations per thread
    #[arg(short, long, default_value_t = 100_000)]
    ops: usize,

    /// Size of the key space
    #[arg(short, long, default_value_t = 20_000)]
    keys: u64,

    /// Fraction of writes
    #[arg(long, default_value_t = 0.2)]
    write_ratio: f64,

    /// Fraction of deletes
    #[arg(long, default_value_t = 0.02)]
    delete_ratio: f64,

    /// Rebuild the filter every N operations (0 = never)
    #[arg(long, default_value_t = 0)]
    rebuild_every: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn cache_config(&self) -> Result<CacheConfig> {
        if let Some(path) = &self.config {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()));
        }

        Ok(CacheConfig {
            exact: ExactConfig {
                enabled: !self.no_lru,
                capacity: self.capacity,
                ttl: Duration::from_millis(self.ttl_ms),
            },
            filter: FilterConfig {
                enabled: !self.no_bloom,
                expected_items: self.expected,
                false_positive_rate: self.fp_rate,
            },
        })
    }

    fn workload(&self) -> Result<Workload> {
        anyhow::ensure!(self.keys > 0, "--keys must be positive");
        anyhow::ensure!(
            self.write_ratio >= 0.0
                && self.delete_ratio >= 0.0
                && self.write_ratio + self.delete_ratio <= 1.0,
            "write and delete ratios must be non-negative and sum to at most 1"
        );

        Ok(Workload {
            threads: self.threads.max(1),
            ops: self.ops,
            key_space: self.keys,
            write_ratio: self.write_ratio,
            delete_ratio: self.delete_ratio,
            rebuild_every: self.rebuild_every,
        })
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = args.cache_config()?;
    let workload = args.workload()?;

    info!("Starting lbbench v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "Cache configuration");
    info!(?workload, "Workload");

    let cache: LruBloom<u64, u64> =
        LruBloom::from_config(config).context("building cache")?;
    let report = workload::run(&cache, &workload);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nlbbench results");
    println!("  elapsed:        {} ms", report.elapsed_ms);
    println!("  throughput:     {:.0} ops/s", report.ops_per_sec);
    println!("  hits / misses:  {} / {}", report.hits, report.misses);
    println!("  hit ratio:      {:.3}", report.hit_ratio);
    println!("  bloom rejects:  {}", report.rejections);
    println!("  inserts:        {}", report.inserts);
    println!("  evictions:      {}", report.evictions);
    println!("  expirations:    {}", report.expirations);
    println!("  rebuilds:       {}", report.rebuilds);
    if let Some(len) = report.lru_len {
        println!("  lru entries:    {}", len);
    }
    if let (Some(estimated), Some(observed)) =
        (report.bloom_estimated_fpr, report.bloom_observed_fpr)
    {
        println!("  bloom fpr:      {:.4} estimated, {:.4} observed", estimated, observed);
    }

    Ok(())
}
