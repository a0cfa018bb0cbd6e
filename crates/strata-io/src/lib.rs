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

//! # Strata IO
//!
//! Concrete I/O services behind the contracts of `strata-core`:
//! - [`cache`]: the zero-copy [`FileCache`] with cost-aware eviction;
//! - [`loose`]: a [`FileLoader`](strata_core::FileLoader) over plain directories;
//! - [`pack`]: the pack archive reader and writer;
//! - [`vfs`]: a flat read-through table tying sources to the cache;
//! - [`watcher`]: cache invalidation from filesystem notifications.

#![warn(missing_docs)]

pub mod cache;
pub mod loose;
pub mod pack;
pub mod vfs;
pub mod watcher;

pub use cache::{CacheBuffer, CacheConfig, CacheStats, FileCache, FileData};
pub use loose::LooseDirectory;
pub use pack::{PackReader, PackWriter};
pub use vfs::Vfs;
pub use watcher::ChangeWatcher;
