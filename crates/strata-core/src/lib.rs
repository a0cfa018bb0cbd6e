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

//! # Strata Core
//!
//! Foundational crate containing the interface contracts shared by every file
//! source of the virtual file system: normalized pathnames, file metadata, the
//! [`FileLoader`](vfs::FileLoader) capability and the archive reader/writer
//! traits, plus the error taxonomy they all report through.

#![warn(missing_docs)]

pub mod vfs;

pub use vfs::{
    ArchiveEntryCallback, ArchiveReader, ArchiveWriter, FileInfo, FileLoader, VfsError, VfsPath,
};
