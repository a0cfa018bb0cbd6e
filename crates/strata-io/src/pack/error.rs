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

use std::io;
use strata_core::{VfsError, VfsPath};
use thiserror::Error;

/// Errors raised while reading or writing pack archives.
#[derive(Debug, Error)]
pub enum PackError {
    /// The file is not a pack archive, or its framing is damaged.
    #[error("malformed pack archive: {0}")]
    Format(String),
    /// The manifest could not be decoded.
    #[error("corrupt pack manifest: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The manifest could not be encoded.
    #[error("cannot encode pack manifest: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    /// An entry uses a compression method this build does not know.
    #[error("unknown compression method {0}")]
    UnknownMethod(u8),
    /// An entry's bytes do not match the manifest.
    #[error("entry '{path}' is corrupt: {reason}")]
    Corrupt {
        /// The entry's pathname.
        path: VfsPath,
        /// What did not match.
        reason: String,
    },
    /// A file added to the writer lies outside its base directory.
    #[error("'{0}' is not inside the archive's base directory")]
    OutsideBase(String),
    /// The writer was already finished.
    #[error("the archive has already been finished")]
    Finished,
    /// An earlier write to the archive failed, so it cannot be completed.
    #[error("an earlier write failed; the archive is incomplete")]
    Incomplete,
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<PackError> for VfsError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::Format(_) | PackError::Decode(_) => {
                VfsError::UnknownArchiveFormat(err.to_string())
            }
            PackError::UnknownMethod(code) => VfsError::UnknownArchiveMethod(code),
            PackError::Corrupt { path, reason } => VfsError::load(path, reason),
            PackError::Io(io) => VfsError::Io(io),
            PackError::Encode(_) | PackError::OutsideBase(_)
            | PackError::Finished
            | PackError::Incomplete => {
                VfsError::Io(io::Error::other(err.to_string()))
            }
        }
    }
}
