//! # lrubloom
//!
//! In-process hybrid cache: an exact, size- and time-bounded LRU store
//! layered with a Bloom filter.
//!
//! ## Architecture
//! - **Filter**: lock-free bit array; a negative test rejects a lookup
//!   without touching the LRU store
//! - **LRU store**: AHash map over an index-linked recency list, with an
//!   optional per-entry deadline checked lazily
//! - **Maintenance**: reset or rebuild the filter from the LRU contents
//!   while readers and writers keep running
//!
//! ```
//! use lrubloom::{ExactConfig, FilterConfig, LruBloom};
//!
//! let cache: LruBloom<String, Vec<u8>> =
//!     LruBloom::new(ExactConfig::default(), FilterConfig::default())?;
//!
//! cache.set("user:1".to_string(), b"alice".to_vec());
//! assert_eq!(cache.get(&"user:1".to_string()), Some(b"alice".to_vec()));
//! assert_eq!(cache.get(&"user:2".to_string()), None);
//! # Ok::<(), lrubloom::Error>(())
//! ```

#![warn(missing_docs)]

mod bloom;
mod cache;
mod config;
mod error;
mod exact;
mod key;
mod lru;
mod stats;

pub use bloom::{false_positive_rate, BloomFilter, BloomParams};
pub use cache::LruBloom;
pub use config::{CacheConfig, CacheDefaults, ExactConfig, FilterConfig};
pub use error::{Error, Result};
pub use exact::{ExactStore, ExpiryPolicy};
pub use key::CacheKey;
pub use stats::CacheStats;
