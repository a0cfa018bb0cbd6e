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

//! Cost-aware eviction ordering.
//!
//! This is GreedyDual-Size, the lazy form of the Landlord algorithm. Each entry
//! holds a priority `H = L + cost / size`, where `L` is an inflation value that
//! rises to the priority of every evicted entry. Cheap, large, long-untouched
//! entries therefore go first, and a hit lifts an entry back to `L + cost / size`
//! without having to age every other entry. Ties go to the oldest insertion.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use strata_core::VfsPath;

/// An entry's eviction priority. Lower is evicted first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Position in the eviction queue.
pub(crate) type Slot = (Priority, u64);

#[derive(Debug, Default)]
pub(crate) struct GreedyDual {
    inflation: f64,
    queue: BTreeMap<Slot, VfsPath>,
}

impl GreedyDual {
    /// Enqueues a new entry and returns its priority.
    pub(crate) fn admit(&mut self, key: &VfsPath, seq: u64, cost: u32, size: usize) -> Priority {
        let priority = Priority(self.inflation + credit(cost, size));
        self.queue.insert((priority, seq), key.clone());
        priority
    }

    /// Refreshes an entry after a hit.
    pub(crate) fn touch(
        &mut self,
        key: &VfsPath,
        seq: u64,
        old: Priority,
        cost: u32,
        size: usize,
    ) -> Priority {
        self.queue.remove(&(old, seq));
        self.admit(key, seq, cost, size)
    }

    pub(crate) fn forget(&mut self, seq: u64, priority: Priority) {
        self.queue.remove(&(priority, seq));
    }

    /// Raises the inflation value after `priority` was evicted.
    pub(crate) fn charge(&mut self, priority: Priority) {
        self.inflation = self.inflation.max(priority.0);
    }

    /// Keys from least to most valuable.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &VfsPath> {
        self.queue.values()
    }

    /// Queue slots strictly after `cursor`, or all of them without one.
    pub(crate) fn slots_after(
        &self,
        cursor: Option<Slot>,
    ) -> impl Iterator<Item = (Slot, &VfsPath)> {
        let start = cursor.map_or(Bound::Unbounded, Bound::Excluded);
        self.queue
            .range((start, Bound::Unbounded))
            .map(|(&slot, key)| (slot, key))
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}

fn credit(cost: u32, size: usize) -> f64 {
    f64::from(cost.max(1)) / size.max(1) as f64
}
