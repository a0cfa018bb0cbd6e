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

use super::{FileInfo, FileLoader, VfsError, VfsPath};
use std::path::Path;
use std::sync::Arc;

/// Callback invoked once per archive entry by [`ArchiveReader::read_entries`].
///
/// Receives the entry's virtual pathname, its metadata and a loader bound to
/// that entry. Returning an error stops the enumeration.
pub type ArchiveEntryCallback<'a> =
    dyn FnMut(&VfsPath, &FileInfo, Arc<dyn FileLoader>) -> Result<(), VfsError> + 'a;

/// Enumerates the entries of one archive container.
///
/// Readers do not build a directory tree of the entries; that task is left to
/// the VFS. They are only concerned with reporting every entry.
pub trait ArchiveReader {
    /// Invokes `callback` for each entry of the archive.
    ///
    /// # Errors
    /// Returns [`VfsError::UnknownArchiveMethod`] when an entry uses a
    /// compression method this build cannot decode, or the first error returned
    /// by `callback`.
    fn read_entries(&self, callback: &mut ArchiveEntryCallback<'_>) -> Result<(), VfsError>;
}

/// Builds an archive by appending whole files.
///
/// Partial updates (replacing a single file inside an existing archive) are
/// not supported; archives are written once, in order. Creating an archive
/// overwrites any existing file with the same name. The archive is only valid
/// after [`finish`](ArchiveWriter::finish) has run.
pub trait ArchiveWriter {
    /// Appends the current on-disk contents of `path`.
    ///
    /// The entry is named after `path` relative to the writer's base directory.
    fn add_file(&mut self, path: &Path) -> Result<(), VfsError>;

    /// Appends the current on-disk contents of `path` under an explicit name.
    fn add_file_as(&mut self, path: &Path, pathname: &VfsPath) -> Result<(), VfsError>;

    /// Writes out the archive index. Further additions fail.
    fn finish(&mut self) -> Result<(), VfsError>;
}
