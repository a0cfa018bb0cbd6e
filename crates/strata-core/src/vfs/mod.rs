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

//! Contracts of the Virtual File System (VFS) layer.
//!
//! This module defines the "common language" between the VFS, the file cache and
//! the many heterogeneous sources of file bytes (loose directories, packed
//! archives). It contains no I/O of its own.
//!
//! The key components are:
//! - [`VfsPath`]: the normalized virtual pathname used as lookup key everywhere.
//! - [`FileInfo`]: size and modification time of a file, as reported by a source.
//! - [`FileLoader`]: a polymorphic source of file bytes, ranked by precedence.
//! - [`ArchiveReader`] / [`ArchiveWriter`]: flat enumeration and whole-file
//!   creation of archive containers.
//! - [`VfsError`]: the error taxonomy surfaced by all of the above.
//!
//! Building a hierarchical namespace out of archive enumerations is left to the
//! VFS itself; archive readers only report flat `(pathname, info, loader)` triples.

mod archive;
mod error;
mod loader;
mod path;

pub use archive::*;
pub use error::*;
pub use loader::*;
pub use path::*;
