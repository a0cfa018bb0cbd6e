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

use super::VfsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Loose metadata about a file, as reported by the source that provides it.
///
/// The file cache never owns this; it is produced by directory enumeration and
/// archive readers and consumed by the VFS to size its reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// The normalized pathname of the file within its source.
    pub name: String,
    /// The uncompressed size in bytes.
    pub size: u64,
    /// The last modification time.
    pub mtime: SystemTime,
}

impl FileInfo {
    /// Creates a new `FileInfo`.
    pub fn new(name: impl Into<String>, size: u64, mtime: SystemTime) -> Self {
        Self {
            name: name.into(),
            size,
            mtime,
        }
    }

    /// Builds a `FileInfo` from filesystem metadata.
    ///
    /// Platforms without modification times report the Unix epoch.
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        Self::new(
            name,
            metadata.len(),
            metadata.modified().unwrap_or(UNIX_EPOCH),
        )
    }
}

/// A polymorphic source of file bytes.
///
/// Implemented by loose-directory loaders and by loaders bound to a single
/// archive entry. When several sources provide the same virtual path, the VFS
/// keeps the one with the lowest [`precedence`](FileLoader::precedence), so
/// loose files can override archived copies.
///
/// Loaders fill caller-supplied buffers, which is what lets the VFS read
/// straight into memory reserved from the file cache.
pub trait FileLoader: Send + Sync + fmt::Debug {
    /// Priority of this source; lower wins.
    fn precedence(&self) -> u32;

    /// A single-character provenance tag for diagnostics (`'F'` for loose
    /// files, `'A'` for archive entries).
    fn location_code(&self) -> char;

    /// The real filesystem path of the source (a directory or an archive file).
    fn path(&self) -> &Path;

    /// Reads the file `name` into `buf`.
    ///
    /// `buf.len()` is the number of bytes to produce; it must match the size
    /// reported by the source's [`FileInfo`]. Loaders bound to a single archive
    /// entry ignore `name`.
    ///
    /// # Errors
    /// Returns [`VfsError::Load`] if the bytes cannot be produced. The contents
    /// of `buf` are unspecified in that case.
    fn load(&self, name: &Path, buf: &mut [u8]) -> Result<(), VfsError>;

    /// Reads fresh metadata for `name` from sources whose files can change
    /// after enumeration.
    ///
    /// Returns `Ok(None)` when the enumerated [`FileInfo`] stays authoritative,
    /// which is the case for archive entries.
    ///
    /// # Errors
    /// Returns [`VfsError::Load`] if the file can no longer be inspected.
    fn refresh(&self, name: &Path) -> Result<Option<FileInfo>, VfsError> {
        let _ = name;
        Ok(None)
    }
}
