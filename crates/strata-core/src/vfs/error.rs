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

//! Defines the error taxonomy shared by the file cache, file loaders and archives.

use super::VfsPath;
use std::{fmt, io};

/// An error raised by the VFS layer.
///
/// Cache errors, loader failures and archive-format errors all surface through
/// this single type so that the owning subsystem can decide how to react
/// (for example, bypassing the cache for an oversized file).
#[derive(Debug)]
pub enum VfsError {
    /// A reservation was larger than the cache's configured ceiling.
    ///
    /// The caller must read the file through an uncached path instead.
    CacheOversize {
        /// The number of bytes requested.
        requested: usize,
        /// The configured size of the cache.
        capacity: usize,
    },
    /// A size does not fit the buffer it describes.
    InvalidSize {
        /// The size that was given.
        size: usize,
        /// The capacity it had to fit into.
        capacity: usize,
    },
    /// A buffer reserved from one cache was handed to another.
    ForeignBuffer,
    /// The cache configuration is unusable.
    InvalidConfig(String),
    /// No source provides the requested virtual path.
    NotFound(VfsPath),
    /// A loader failed to produce a file's bytes (I/O failure, corrupt entry,
    /// checksum mismatch). No partial data is ever cached in this case.
    Load {
        /// The path of the file or archive entry that failed to load.
        path: String,
        /// A description of the underlying failure.
        reason: String,
    },
    /// A file is not an archive of any known format.
    UnknownArchiveFormat(String),
    /// An archive entry uses a compression method this build cannot decode.
    UnknownArchiveMethod(u8),
    /// An I/O error that is not tied to loading a particular file.
    Io(io::Error),
}

impl VfsError {
    /// Builds a [`VfsError::Load`] from any displayable path and reason.
    pub fn load(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        VfsError::Load {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::CacheOversize {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "Reservation of {requested} bytes exceeds the cache size of {capacity} bytes"
                )
            }
            VfsError::InvalidSize { size, capacity } => {
                write!(f, "Size {size} does not fit a capacity of {capacity} bytes")
            }
            VfsError::ForeignBuffer => {
                write!(f, "Buffer was reserved from a different file cache")
            }
            VfsError::InvalidConfig(msg) => write!(f, "Invalid cache configuration: {msg}"),
            VfsError::NotFound(path) => write!(f, "No source provides '{path}'"),
            VfsError::Load { path, reason } => {
                write!(f, "Failed to load '{path}': {reason}")
            }
            VfsError::UnknownArchiveFormat(msg) => {
                write!(f, "Unknown archive format: {msg}")
            }
            VfsError::UnknownArchiveMethod(method) => {
                write!(f, "Unknown archive compression method: {method}")
            }
            VfsError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for VfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VfsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for VfsError {
    fn from(err: io::Error) -> Self {
        VfsError::Io(err)
    }
}
