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

//! A bounded cache of file contents with zero-copy I/O.
//!
//! The cache owns one contiguous, page-aligned memory region. Callers reserve a
//! piece of it, read a file straight into that piece, and register the result
//! under its [`VfsPath`]. Subsequent lookups hand out the very same bytes as a
//! shared, read-only [`FileData`]; nothing is copied on the way.
//!
//! ```text
//! retrieve(key) ──hit──▶ FileData
//!      │ miss
//!      ▼
//! reserve(size) ──▶ CacheBuffer ──loader.load()──▶ add(key, buffer, size)
//! ```
//!
//! When the region has no hole large enough, unreferenced entries are evicted
//! in eviction order until the reservation fits. Entries that callers still
//! hold are never evicted. If nothing can be evicted, the reservation spills to
//! a separate allocation so that reserving never fails for a legal size.
//!
//! To keep fragmentation low, a reader should finish one file (reserve, fill,
//! add) before starting the next.

mod buffer;
mod policy;
mod region;
mod stats;

pub use buffer::{CacheBuffer, FileData};
pub use stats::CacheStats;

use ahash::AHashMap;
use buffer::{Arena, Extent};
use policy::{GreedyDual, Priority, Slot};
use serde::{Deserialize, Serialize};
use stats::CacheCounters;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_core::{VfsError, VfsPath};

/// Default cache size: 96 MiB.
pub const DEFAULT_CACHE_SIZE: usize = 96 * 1024 * 1024;
/// Default alignment of reserved buffers, suitable for sector/page-aligned I/O.
pub const DEFAULT_ALIGNMENT: usize = 4096;

/// Configuration of a [`FileCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of bytes the region may hold. Fixed for the cache's lifetime.
    pub size: usize,
    /// Alignment of every reserved buffer; must be a power of two.
    pub alignment: usize,
    /// Record a BLAKE3 digest of every entry on `add` and check that the bytes
    /// are unchanged when the entry leaves the index.
    pub verify_contents: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CACHE_SIZE,
            alignment: DEFAULT_ALIGNMENT,
            verify_contents: cfg!(debug_assertions),
        }
    }
}

impl CacheConfig {
    /// The default configuration with a different size.
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), VfsError> {
        if !self.alignment.is_power_of_two() {
            return Err(VfsError::InvalidConfig(format!(
                "alignment {} is not a power of two",
                self.alignment
            )));
        }
        Ok(())
    }
}

struct Entry {
    data: FileData,
    cost: u32,
    seq: u64,
    priority: Priority,
    digest: Option<blake3::Hash>,
}

#[derive(Default)]
struct Index {
    entries: AHashMap<VfsPath, Entry>,
    policy: GreedyDual,
    next_seq: u64,
    indexed_bytes: usize,
}

impl Index {
    /// Indexes `data` under `key`, returning the entry it supersedes.
    fn insert(
        &mut self,
        key: &VfsPath,
        data: FileData,
        cost: u32,
        digest: Option<blake3::Hash>,
    ) -> Option<Entry> {
        let previous = self.take(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        let priority = self.policy.admit(key, seq, cost, data.len());
        self.indexed_bytes += data.len();
        self.entries.insert(
            key.clone(),
            Entry {
                data,
                cost,
                seq,
                priority,
                digest,
            },
        );
        previous
    }

    fn take(&mut self, key: &VfsPath) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.policy.forget(entry.seq, entry.priority);
        self.indexed_bytes -= entry.data.len();
        Some(entry)
    }

    fn touch(&mut self, key: &VfsPath) -> Option<FileData> {
        let entry = self.entries.get_mut(key)?;
        entry.priority =
            self.policy
                .touch(key, entry.seq, entry.priority, entry.cost, entry.data.len());
        Some(entry.data.clone())
    }

    /// Removes the least valuable entry that no caller references.
    ///
    /// The scan starts after `cursor` and moves it past every referenced entry
    /// it skips, so repeated calls within one reservation do not rescan them.
    fn evict_one(&mut self, cursor: &mut Option<Slot>) -> Option<(VfsPath, Entry)> {
        let entries = &self.entries;
        let mut victim = None;
        for (slot, key) in self.policy.slots_after(*cursor) {
            if entries.get(key).is_some_and(|e| e.data.ref_count() == 1) {
                victim = Some(key.clone());
                break;
            }
            *cursor = Some(slot);
        }
        let key = victim?;
        let entry = self.take(&key)?;
        self.policy.charge(entry.priority);
        Some((key, entry))
    }

    fn drain(&mut self) -> Vec<(VfsPath, Entry)> {
        self.policy.clear();
        self.indexed_bytes = 0;
        self.entries.drain().collect()
    }
}

/// A bounded, thread-safe cache of file contents keyed by virtual pathname.
///
/// See the [module documentation](self) for the reserve/fill/add protocol.
///
/// # Locking
///
/// The index lock is taken first, the region's free-list lock second. Dropping
/// a [`CacheBuffer`] or the last [`FileData`] handle only takes the free-list
/// lock, so releasing data from any thread can never deadlock against the index.
pub struct FileCache {
    config: CacheConfig,
    arena: Arc<Arena>,
    index: Mutex<Index>,
    counters: CacheCounters,
}

impl FileCache {
    /// Creates a cache of `size` bytes with default settings.
    ///
    /// # Panics
    /// Panics if `size` is too large to be described as a single allocation.
    pub fn new(size: usize) -> Self {
        match Self::with_config(CacheConfig::with_size(size)) {
            Ok(cache) => cache,
            Err(err) => panic!("cannot create a file cache of {size} bytes: {err}"),
        }
    }

    /// Creates a cache from an explicit configuration.
    ///
    /// # Errors
    /// Returns [`VfsError::InvalidConfig`] if the alignment is not a power of
    /// two or the size cannot be allocated as one region.
    pub fn with_config(config: CacheConfig) -> Result<Self, VfsError> {
        config.validate()?;
        let arena = Arena::new(config.size, config.alignment)
            .map_err(|err| VfsError::InvalidConfig(err.to_string()))?;
        log::debug!(
            "FileCache: reserved a {} byte region ({} byte alignment)",
            config.size,
            config.alignment
        );
        Ok(Self {
            config,
            arena,
            index: Mutex::new(Index::default()),
            counters: CacheCounters::default(),
        })
    }

    /// The configured size of the cache in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// The configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Reserves a buffer of at least `size` bytes for a file about to be read.
    ///
    /// The buffer is aligned to the configured alignment. It is not visible to
    /// lookups until passed to [`add`](Self::add).
    ///
    /// # Errors
    /// Returns [`VfsError::CacheOversize`] if `size` exceeds the cache size;
    /// such files must be read without the cache. The cache is left untouched.
    pub fn reserve(&self, size: usize) -> Result<CacheBuffer, VfsError> {
        if size > self.capacity() {
            return Err(VfsError::CacheOversize {
                requested: size,
                capacity: self.capacity(),
            });
        }
        if size == 0 {
            return Ok(CacheBuffer::new(Extent::heap(Box::default())));
        }
        if let Some(extent) = self.arena.try_allocate(size) {
            return Ok(CacheBuffer::new(extent));
        }

        let mut cursor = None;
        let mut rescanned = false;
        loop {
            let (key, entry) = {
                let mut index = self.lock_index();
                if let Some(extent) = self.arena.try_allocate(size) {
                    return Ok(CacheBuffer::new(extent));
                }
                match index.evict_one(&mut cursor) {
                    Some(victim) => victim,
                    // Entries added by other threads may sort before the cursor.
                    None if cursor.is_some() && !rescanned => {
                        rescanned = true;
                        cursor = None;
                        continue;
                    }
                    None => break,
                }
            };
            log::debug!(
                "FileCache: evicted '{}' ({} bytes) to reserve {} bytes",
                key,
                entry.data.len(),
                size
            );
            CacheCounters::bump(&self.counters.evictions);
            // Hashing and releasing the victim happen without the index lock.
            self.retire(&key, entry);
        }

        log::warn!(
            "FileCache: all cached data is referenced; spilling {} bytes outside the {} byte region",
            size,
            self.capacity()
        );
        CacheCounters::bump(&self.counters.spills);
        let extent = self
            .arena
            .spill(size)
            .map_err(|err| VfsError::InvalidConfig(err.to_string()))?;
        Ok(CacheBuffer::new(extent))
    }

    /// Registers a filled buffer under `key` with the default cost of 1.
    ///
    /// See [`add_with_cost`](Self::add_with_cost).
    pub fn add(&self, key: &VfsPath, buffer: CacheBuffer, size: usize) -> Result<FileData, VfsError> {
        self.add_with_cost(key, buffer, size, 1)
    }

    /// Registers the first `size` bytes of `buffer` as the contents of `key`.
    ///
    /// `cost` is how expensive the file is to obtain again; higher values keep
    /// the entry cached for longer. Any existing entry for `key` is superseded,
    /// though handles to its data remain valid. Returns a handle to the frozen
    /// contents.
    ///
    /// Buffers that spilled outside the region are returned but not indexed;
    /// an existing entry for `key` is still removed so that later lookups
    /// cannot return the superseded contents.
    ///
    /// # Errors
    /// - [`VfsError::InvalidSize`] if `size` exceeds the buffer's capacity.
    /// - [`VfsError::ForeignBuffer`] if the buffer came from another cache.
    pub fn add_with_cost(
        &self,
        key: &VfsPath,
        buffer: CacheBuffer,
        size: usize,
        cost: u32,
    ) -> Result<FileData, VfsError> {
        let mut extent = buffer.into_extent();
        if size > extent.capacity() {
            return Err(VfsError::InvalidSize {
                size,
                capacity: extent.capacity(),
            });
        }
        if extent
            .arena()
            .is_some_and(|arena| !Arc::ptr_eq(arena, &self.arena))
        {
            return Err(VfsError::ForeignBuffer);
        }

        extent.shrink_to(size);
        let spilled = extent.is_spill();
        let data = FileData::new(extent, size);
        if spilled {
            log::debug!("FileCache: '{key}' was read into a spilled buffer; not indexing it");
            let stale = self.lock_index().take(key);
            if let Some(stale) = stale {
                CacheCounters::bump(&self.counters.removals);
                log::trace!("FileCache: dropped the older entry for '{key}'");
                self.retire(key, stale);
            }
            return Ok(data);
        }

        let digest = self.config.verify_contents.then(|| blake3::hash(&data));
        let previous = self
            .lock_index()
            .insert(key, data.clone(), cost.max(1), digest);
        CacheCounters::bump(&self.counters.insertions);
        log::trace!("FileCache: added '{key}' ({size} bytes, cost {cost})");

        if let Some(previous) = previous {
            log::trace!("FileCache: '{key}' superseded an older entry");
            self.retire(key, previous);
        }
        Ok(data)
    }

    /// Removes the entry for `key`, if any. Returns whether one was removed.
    ///
    /// Handles already given out keep their bytes; only later lookups are
    /// affected. Typically called when the file changed on disk.
    pub fn remove(&self, key: &VfsPath) -> bool {
        let removed = self.lock_index().take(key);
        match removed {
            Some(entry) => {
                CacheCounters::bump(&self.counters.removals);
                log::trace!("FileCache: removed '{key}'");
                self.retire(key, entry);
                true
            }
            None => false,
        }
    }

    /// Looks up the contents of `key` without performing any I/O.
    ///
    /// `None` means the caller must read the file from its source and
    /// populate the cache through [`reserve`](Self::reserve) and [`add`](Self::add).
    pub fn retrieve(&self, key: &VfsPath) -> Option<FileData> {
        let found = self.lock_index().touch(key);
        match &found {
            Some(data) => {
                CacheCounters::bump(&self.counters.hits);
                log::trace!("FileCache: hit '{key}' ({} bytes)", data.len());
            }
            None => {
                CacheCounters::bump(&self.counters.misses);
                log::trace!("FileCache: miss '{key}'");
            }
        }
        found
    }

    /// Returns `true` if `key` is indexed. Does not count as a lookup.
    pub fn contains(&self, key: &VfsPath) -> bool {
        self.lock_index().entries.contains_key(key)
    }

    /// The number of indexed entries.
    pub fn len(&self) -> usize {
        self.lock_index().entries.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry from the index.
    pub fn clear(&self) {
        let drained = self.lock_index().drain();
        let count = drained.len();
        for (key, entry) in drained {
            self.retire(&key, entry);
        }
        log::debug!("FileCache: cleared {count} entries");
    }

    /// Takes a snapshot of the cache's state and counters.
    pub fn stats(&self) -> CacheStats {
        let (entries, indexed_bytes) = {
            let index = self.lock_index();
            (index.entries.len(), index.indexed_bytes)
        };
        CacheStats {
            capacity: self.capacity(),
            entries,
            indexed_bytes,
            region_bytes_in_use: self.arena.in_use(),
            largest_free_block: self.arena.largest_free(),
            spilled_bytes: self.arena.spilled_bytes(),
            ..CacheStats::from_counters(&self.counters)
        }
    }

    fn lock_index(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases an entry that has left the index. Must not be called with the
    /// index lock held.
    fn retire(&self, key: &VfsPath, entry: Entry) {
        let Some(digest) = entry.digest else {
            return;
        };
        if blake3::hash(&entry.data) != digest {
            log::error!("FileCache: contents of '{key}' were modified while cached");
            debug_assert!(false, "contents of '{key}' were modified while cached");
        }
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
