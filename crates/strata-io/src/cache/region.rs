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

//! Backing memory of the file cache and the free list that carves it up.

use std::alloc::{self, Layout, LayoutError};
use std::collections::{BTreeMap, BTreeSet};
use std::ptr::NonNull;

/// An owned, zero-initialised heap allocation with a chosen alignment.
///
/// Large zeroed allocations are served by the OS with pages that are only
/// committed once touched, which gives the cache region its commit-on-demand
/// behaviour.
pub(crate) struct AlignedBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the block owns its allocation. Concurrent access to the bytes is
// coordinated by the extents handed out over it, which never overlap.
unsafe impl Send for AlignedBlock {}
unsafe impl Sync for AlignedBlock {}

impl AlignedBlock {
    /// Allocates `len` zeroed bytes aligned to `align`.
    ///
    /// A zero `len` still allocates one byte so the pointer is always valid.
    pub(crate) fn zeroed(len: usize, align: usize) -> Result<Self, LayoutError> {
        let layout = Layout::from_size_align(len.max(1), align)?;
        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Ok(Self { ptr, layout })
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for AlignedBlock {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Address-ordered free list over a region of `len` bytes.
///
/// Grants are rounded up to `align`, so every free block starts on an aligned
/// offset. The only exception to the rounding is the block touching the end of
/// the region, which may be granted whole when it is shorter than the rounded
/// request but still large enough for the raw one. Adjacent free blocks are
/// coalesced on release, and placement is best-fit.
#[derive(Debug)]
pub(crate) struct FreeList {
    len: usize,
    align: usize,
    by_offset: BTreeMap<usize, usize>,
    by_size: BTreeSet<(usize, usize)>,
    in_use: usize,
}

impl FreeList {
    pub(crate) fn new(len: usize, align: usize) -> Self {
        let mut list = Self {
            len,
            align,
            by_offset: BTreeMap::new(),
            by_size: BTreeSet::new(),
            in_use: 0,
        };
        list.insert(0, len);
        list
    }

    /// Carves out room for `size` bytes, returning `(offset, granted_len)`.
    pub(crate) fn allocate(&mut self, size: usize) -> Option<(usize, usize)> {
        debug_assert!(size > 0, "zero-sized grants are never placed in the region");
        if size > self.len {
            return None;
        }

        if let Some(want) = size.checked_next_multiple_of(self.align) {
            if let Some(&(block_len, offset)) = self.by_size.range((want, 0)..).next() {
                self.take(offset, block_len, want);
                return Some((offset, want));
            }
        }

        let (&offset, &block_len) = self.by_offset.iter().next_back()?;
        if offset + block_len == self.len && block_len >= size {
            self.take(offset, block_len, block_len);
            return Some((offset, block_len));
        }
        None
    }

    /// Returns `[offset, offset + len)` to the free list.
    pub(crate) fn release(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        debug_assert!(offset + len <= self.len);
        self.in_use -= len;

        let mut start = offset;
        let mut end = offset + len;

        let prev = self
            .by_offset
            .range(..offset)
            .next_back()
            .map(|(&o, &l)| (o, l));
        if let Some((prev_offset, prev_len)) = prev {
            debug_assert!(prev_offset + prev_len <= offset, "double release");
            if prev_offset + prev_len == offset {
                self.remove(prev_offset, prev_len);
                start = prev_offset;
            }
        }
        if let Some(&next_len) = self.by_offset.get(&end) {
            self.remove(end, next_len);
            end += next_len;
        }
        self.insert(start, end - start);
    }

    /// Gives back the tail of a grant so that it keeps only `keep` bytes
    /// (rounded up to the alignment). Returns the new granted length.
    pub(crate) fn shrink(&mut self, offset: usize, granted: usize, keep: usize) -> usize {
        let keep = match keep.checked_next_multiple_of(self.align) {
            Some(keep) if keep < granted => keep,
            _ => return granted,
        };
        self.release(offset + keep, granted - keep);
        keep
    }

    /// Bytes currently granted out of the region.
    pub(crate) fn in_use(&self) -> usize {
        self.in_use
    }

    /// Length of the largest free block.
    pub(crate) fn largest_free(&self) -> usize {
        self.by_size.iter().next_back().map_or(0, |&(len, _)| len)
    }

    fn take(&mut self, offset: usize, block_len: usize, grant: usize) {
        self.remove(offset, block_len);
        if grant < block_len {
            self.insert(offset + grant, block_len - grant);
        }
        self.in_use += grant;
    }

    fn insert(&mut self, offset: usize, len: usize) {
        if len > 0 {
            self.by_offset.insert(offset, len);
            self.by_size.insert((len, offset));
        }
    }

    fn remove(&mut self, offset: usize, len: usize) {
        self.by_offset.remove(&offset);
        self.by_size.remove(&(len, offset));
    }
}
