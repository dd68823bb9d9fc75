//! # Approximate-LRU Eviction
//!
//! When the store is over its byte budget, draw a handful of random keys,
//! drop the one with the oldest access stamp, repeat. O(samples) per
//! eviction; recently-touched keys can still lose, which is the accepted
//! cost of sampling instead of tracking exact order.

use tracing::debug;

use crate::store::Store;

/// Keys sampled per eviction round. Five is the long-standing sweet spot
/// for this family of caches.
pub const EVICTION_SAMPLES: usize = 5;

impl Store {
    /// Evicts one key chosen as the least-recently-accessed of a random
    /// sample. Returns false when the keyspace is empty.
    pub fn evict_one(&mut self) -> bool {
        if self.dbsize() == 0 {
            return false;
        }

        let mut victim: Option<Vec<u8>> = None;
        let mut oldest = i64::MAX;
        for _ in 0..EVICTION_SAMPLES {
            let key = {
                let (rng, table) = self.rng_and_table();
                match table.random_key(rng) {
                    Some(key) => key.to_vec(),
                    None => break,
                }
            };
            if let Some(entry) = self.entry(&key) {
                if entry.last_access < oldest {
                    oldest = entry.last_access;
                    victim = Some(key);
                }
            }
        }

        match victim {
            Some(key) => {
                debug!(key = %String::from_utf8_lossy(&key), "evicting key");
                self.evict_key(&key)
            }
            None => false,
        }
    }

    /// Runs evictions until usage is back under the budget or nothing is
    /// left to evict. No-op with an unlimited budget. Returns the number of
    /// keys evicted.
    pub fn enforce_maxmemory(&mut self) -> usize {
        if self.maxmemory() == 0 {
            return 0;
        }
        let mut evicted = 0;
        while self.used_memory() > self.maxmemory() && self.dbsize() > 0 {
            if !self.evict_one() {
                break;
            }
            evicted += 1;
        }
        evicted
    }
}
