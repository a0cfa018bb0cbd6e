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

//! Zero-copy buffers handed out by the file cache.
//!
//! A [`CacheBuffer`] is a uniquely owned, writable extent obtained from
//! [`FileCache::reserve`](super::FileCache::reserve); I/O fills it in place.
//! Once added, it is frozen into a [`FileData`]: an immutable, reference-counted
//! view of the same bytes. Whichever handle goes last (the cache index or a
//! caller) returns the extent to the region.

use super::region::{AlignedBlock, FreeList};
use std::alloc::LayoutError;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The cache's backing region together with its allocation state.
pub(crate) struct Arena {
    block: AlignedBlock,
    len: usize,
    alignment: usize,
    free: Mutex<FreeList>,
    spilled_bytes: AtomicUsize,
}

impl Arena {
    pub(crate) fn new(len: usize, alignment: usize) -> Result<Arc<Self>, LayoutError> {
        Ok(Arc::new(Self {
            block: AlignedBlock::zeroed(len, alignment)?,
            len,
            alignment,
            free: Mutex::new(FreeList::new(len, alignment)),
            spilled_bytes: AtomicUsize::new(0),
        }))
    }

    /// Places `size` bytes inside the region, if a large enough hole exists.
    pub(crate) fn try_allocate(self: &Arc<Self>, size: usize) -> Option<Extent> {
        let (offset, capacity) = self.free_list().allocate(size)?;
        Some(Extent {
            backing: Backing::Region {
                arena: Arc::clone(self),
                offset,
            },
            capacity,
        })
    }

    /// Allocates `size` bytes outside the region.
    ///
    /// Used when every indexed entry is still referenced and no hole is large
    /// enough: the budget is exceeded temporarily instead of failing.
    pub(crate) fn spill(self: &Arc<Self>, size: usize) -> Result<Extent, LayoutError> {
        let block = AlignedBlock::zeroed(size, self.alignment)?;
        self.spilled_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(Extent {
            backing: Backing::Spill {
                arena: Arc::clone(self),
                block,
            },
            capacity: size,
        })
    }

    /// Bytes of the region currently granted to entries and reservations.
    pub(crate) fn in_use(&self) -> usize {
        self.free_list().in_use()
    }

    /// Length of the largest hole in the region.
    pub(crate) fn largest_free(&self) -> usize {
        self.free_list().largest_free()
    }

    /// Bytes currently allocated outside the region.
    pub(crate) fn spilled_bytes(&self) -> usize {
        self.spilled_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    // The free-list lock is only ever held for a single list operation, and
    // never while acquiring the index lock.
    fn free_list(&self) -> MutexGuard<'_, FreeList> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Backing {
    /// A slice of the shared region.
    Region { arena: Arc<Arena>, offset: usize },
    /// An over-budget allocation, tracked by its arena.
    Spill { arena: Arc<Arena>, block: AlignedBlock },
    /// Plain heap bytes that were never part of the cache.
    Heap(Box<[u8]>),
}

/// A contiguous run of bytes owned by exactly one buffer or data handle.
pub(crate) struct Extent {
    backing: Backing,
    capacity: usize,
}

impl Extent {
    pub(crate) fn heap(bytes: Box<[u8]>) -> Self {
        let capacity = bytes.len();
        Self {
            backing: Backing::Heap(bytes),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn arena(&self) -> Option<&Arc<Arena>> {
        match &self.backing {
            Backing::Region { arena, .. } | Backing::Spill { arena, .. } => Some(arena),
            Backing::Heap(_) => None,
        }
    }

    pub(crate) fn is_spill(&self) -> bool {
        matches!(self.backing, Backing::Spill { .. })
    }

    pub(crate) fn is_region(&self) -> bool {
        matches!(self.backing, Backing::Region { .. })
    }

    /// Hands the unused tail of a region extent back to the free list.
    pub(crate) fn shrink_to(&mut self, len: usize) {
        if let Backing::Region { arena, offset } = &self.backing {
            self.capacity = arena.free_list().shrink(*offset, self.capacity, len);
        }
    }

    fn as_slice(&self) -> &[u8] {
        match &self.backing {
            // SAFETY: the extent covers `capacity` bytes inside the region,
            // which outlives it through the `Arc<Arena>`, and no other extent
            // overlaps it.
            Backing::Region { arena, offset } => unsafe {
                std::slice::from_raw_parts(arena.block.as_ptr().add(*offset), self.capacity)
            },
            // SAFETY: the block is at least `capacity` bytes long.
            Backing::Spill { block, .. } => unsafe {
                std::slice::from_raw_parts(block.as_ptr(), self.capacity)
            },
            Backing::Heap(bytes) => &bytes[..],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.backing {
            // SAFETY: as in `as_slice`; `&mut self` guarantees this is the only
            // live view of the extent.
            Backing::Region { arena, offset } => unsafe {
                std::slice::from_raw_parts_mut(arena.block.as_ptr().add(*offset), self.capacity)
            },
            // SAFETY: as above.
            Backing::Spill { block, .. } => unsafe {
                std::slice::from_raw_parts_mut(block.as_ptr(), self.capacity)
            },
            Backing::Heap(bytes) => &mut bytes[..],
        }
    }
}

impl Drop for Extent {
    fn drop(&mut self) {
        match &self.backing {
            Backing::Region { arena, offset } => {
                arena.free_list().release(*offset, self.capacity);
            }
            Backing::Spill { arena, .. } => {
                arena
                    .spilled_bytes
                    .fetch_sub(self.capacity, Ordering::Relaxed);
            }
            Backing::Heap(_) => {}
        }
    }
}

/// A writable buffer reserved from a [`FileCache`](super::FileCache).
///
/// Its address is aligned for direct I/O and its length (the capacity) is at
/// least the reserved size. Fill it, then register it with
/// [`FileCache::add`](super::FileCache::add). Dropping it without adding gives
/// the memory back to the cache.
pub struct CacheBuffer {
    extent: Extent,
}

impl CacheBuffer {
    pub(crate) fn new(extent: Extent) -> Self {
        Self { extent }
    }

    pub(crate) fn into_extent(self) -> Extent {
        self.extent
    }

    /// The number of usable bytes, which may exceed the reserved size.
    pub fn capacity(&self) -> usize {
        self.extent.capacity()
    }

    /// Returns `true` when the buffer lives outside the cache region because
    /// the region was exhausted by referenced data.
    pub fn is_spilled(&self) -> bool {
        self.extent.is_spill()
    }
}

impl Deref for CacheBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.extent.as_slice()
    }
}

impl DerefMut for CacheBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.extent.as_mut_slice()
    }
}

impl fmt::Debug for CacheBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuffer")
            .field("capacity", &self.capacity())
            .field("spilled", &self.is_spilled())
            .finish()
    }
}

/// Immutable, shared file contents.
///
/// Cloning is cheap: it only bumps a reference count. The bytes stay valid for
/// as long as any clone exists, even after the cache has dropped or replaced
/// the entry they came from.
#[derive(Clone)]
pub struct FileData {
    extent: Arc<Extent>,
    len: usize,
}

impl FileData {
    pub(crate) fn new(extent: Extent, len: usize) -> Self {
        debug_assert!(len <= extent.capacity());
        Self {
            extent: Arc::new(extent),
            len,
        }
    }

    /// Wraps bytes that were read without going through the cache.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self::new(Extent::heap(bytes.into_boxed_slice()), len)
    }

    /// The file size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for an empty file.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.extent.as_slice()[..self.len]
    }

    /// Returns `true` when the bytes live inside a cache region.
    pub fn is_cached(&self) -> bool {
        self.extent.is_region()
    }

    /// Returns `true` when both handles view the same bytes.
    pub fn ptr_eq(&self, other: &FileData) -> bool {
        Arc::ptr_eq(&self.extent, &other.extent)
    }

    /// Number of live handles to these bytes, including the cache's own.
    pub(crate) fn ref_count(&self) -> usize {
        Arc::strong_count(&self.extent)
    }
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for FileData {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for FileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileData")
            .field("len", &self.len)
            .field("cached", &self.is_cached())
            .finish()
    }
}
