// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Counters describing how a file cache is being used.

use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters updated by the cache; read without taking any lock.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) insertions: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) removals: AtomicU64,
    pub(crate) spills: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// A snapshot of a cache's state and lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    // --- Configuration ---
    /// The configured size of the cache in bytes.
    pub capacity: usize,

    // --- Current State ---
    /// The number of indexed entries.
    pub entries: usize,
    /// The sum of the sizes of all indexed entries.
    pub indexed_bytes: usize,
    /// Region bytes granted to indexed entries, reservations and data still
    /// referenced after leaving the index (includes alignment padding).
    pub region_bytes_in_use: usize,
    /// The largest reservation that currently fits without evicting anything.
    pub largest_free_block: usize,
    /// Bytes allocated outside the region because it was exhausted.
    pub spilled_bytes: usize,

    // --- Lifetime Counters ---
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries added to the index.
    pub insertions: u64,
    /// Entries dropped by the eviction policy.
    pub evictions: u64,
    /// Entries dropped by explicit removal.
    pub removals: u64,
    /// Reservations that had to be served outside the region.
    pub spills: u64,
}

impl CacheStats {
    pub(crate) fn from_counters(counters: &CacheCounters) -> Self {
        Self {
            hits: CacheCounters::load(&counters.hits),
            misses: CacheCounters::load(&counters.misses),
            insertions: CacheCounters::load(&counters.insertions),
            evictions: CacheCounters::load(&counters.evictions),
            removals: CacheCounters::load(&counters.removals),
            spills: CacheCounters::load(&counters.spills),
            ..Default::default()
        }
    }

    /// The fraction of lookups that were hits, or `0.0` before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
