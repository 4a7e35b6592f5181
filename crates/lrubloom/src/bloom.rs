//! Bloom filter with lock-free inserts
//!
//! Sizing follows the usual optimal formulas:
//! - m = -n * ln(fpr) / ln(2)^2  (bits)
//! - k = (m / n) * ln(2)         (hash functions)
//!
//! Positions are derived by double hashing, h(i) = h1 + i * h2, where h1
//! and h2 are the two halves of one MurmurHash3 x64_128 digest of the
//! key's canonical bytes. Bits live in atomic words so concurrent inserts
//! into the same filter need only shared access.

use std::f64::consts::LN_2;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const WORD_BITS: usize = 64;

/// Fixed seed so every filter instance hashes a key to the same positions.
const HASH_SEED: u32 = 0;

/// Sizing derived from an expected element count and a target FPR
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomParams {
    /// Number of bits in the filter (m)
    pub size_bits: usize,
    /// Number of hash functions (k)
    pub hash_count: u32,
}

impl BloomParams {
    /// Optimal parameters for `expected_items` at `target_fpr`.
    ///
    /// Callers are expected to pass `expected_items > 0` and
    /// `0 < target_fpr < 1`; degenerate input yields a minimal filter.
    pub fn optimal(expected_items: usize, target_fpr: f64) -> Self {
        if expected_items == 0 || !(target_fpr > 0.0 && target_fpr < 1.0) {
            return Self {
                size_bits: WORD_BITS,
                hash_count: 1,
            };
        }

        let n = expected_items as f64;
        let m = (-n * target_fpr.ln() / (LN_2 * LN_2)).ceil() as usize;
        let m = m.max(WORD_BITS);
        let k = ((m as f64 / n) * LN_2).round() as u32;

        Self {
            size_bits: m,
            hash_count: k.clamp(1, 32),
        }
    }
}

/// False positive rate for `n` items in `m` bits with `k` hashes:
/// (1 - e^(-kn/m))^k
pub fn false_positive_rate(m: usize, n: usize, k: u32) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}

/// Probabilistic set membership: "possibly present" or "definitely absent".
///
/// No deletion, no enumeration. A key that was inserted always tests
/// positive for the lifetime of the instance.
pub struct BloomFilter {
    words: Box<[AtomicU64]>,
    params: BloomParams,
    inserted: AtomicUsize,
}

impl BloomFilter {
    /// Create an empty filter with explicit parameters
    pub fn new(params: BloomParams) -> Self {
        let size_bits = params.size_bits.max(1);
        let word_count = size_bits.div_ceil(WORD_BITS);
        let words = (0..word_count).map(|_| AtomicU64::new(0)).collect();

        Self {
            words,
            params: BloomParams {
                size_bits,
                hash_count: params.hash_count.max(1),
            },
            inserted: AtomicUsize::new(0),
        }
    }

    /// Create an empty filter sized for `expected_items` at `target_fpr`
    pub fn with_estimates(expected_items: usize, target_fpr: f64) -> Self {
        Self::new(BloomParams::optimal(expected_items, target_fpr))
    }

    /// Add an element. Safe to call concurrently with `insert`/`contains`.
    pub fn insert(&self, element: &[u8]) {
        for pos in self.positions(element) {
            let mask = 1u64 << (pos % WORD_BITS);
            self.words[pos / WORD_BITS].fetch_or(mask, Ordering::Relaxed);
        }
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// `false` means the element was never inserted
    pub fn contains(&self, element: &[u8]) -> bool {
        self.positions(element).all(|pos| {
            let mask = 1u64 << (pos % WORD_BITS);
            self.words[pos / WORD_BITS].load(Ordering::Relaxed) & mask != 0
        })
    }

    fn positions(&self, element: &[u8]) -> impl Iterator<Item = usize> {
        let (h1, h2) = split_hash(element);
        let m = self.params.size_bits as u64;

        (0..self.params.hash_count as u64)
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
    }

    /// Sizing this filter was built with
    pub fn params(&self) -> BloomParams {
        self.params
    }

    /// Filter size in bits (m)
    pub fn size_bits(&self) -> usize {
        self.params.size_bits
    }

    /// Number of hash functions (k)
    pub fn hash_count(&self) -> u32 {
        self.params.hash_count
    }

    /// Insert calls made so far, duplicates included
    pub fn items_inserted(&self) -> usize {
        self.inserted.load(Ordering::Relaxed)
    }

    /// Number of bits currently set
    pub fn bits_set(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// FPR implied by the current insert count. Computed on demand.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        false_positive_rate(
            self.params.size_bits,
            self.items_inserted(),
            self.params.hash_count,
        )
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("size_bits", &self.params.size_bits)
            .field("hash_count", &self.params.hash_count)
            .field("items_inserted", &self.items_inserted())
            .finish()
    }
}

/// Independent (h1, h2) pair from one 128-bit digest.
///
/// h2 is forced odd so the k positions never collapse onto one bit.
fn split_hash(element: &[u8]) -> (u64, u64) {
    // Reading from an in-memory slice cannot fail.
    let digest = murmur3::murmur3_x64_128(&mut Cursor::new(element), HASH_SEED).unwrap_or(0);
    (digest as u64, ((digest >> 64) as u64) | 1)
}
