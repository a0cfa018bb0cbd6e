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

//! On-disk layout of a pack archive.
//!
//! ```text
//! +--------+-------------+----------------+--------------------+-----------------+---------------+--------+
//! | "SPAK" | version u16 | entry blobs... | manifest (bincode) | manifest offset | manifest len  | "SPAK" |
//! +--------+-------------+----------------+--------------------+-----------------+---------------+--------+
//!   4 B      2 B LE                                              8 B LE            8 B LE          4 B
//! ```
//!
//! The manifest sits at the end so that the writer can stream blobs without
//! knowing the final entry list up front.

use super::error::PackError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use strata_core::{FileInfo, VfsPath};

/// Magic bytes at both ends of the archive.
pub const MAGIC: [u8; 4] = *b"SPAK";
/// Current format version.
pub const VERSION: u16 = 1;
/// Length of the leading magic and version.
pub const HEADER_LEN: u64 = 6;
/// Length of the trailing manifest location and magic.
pub const TRAILER_LEN: u64 = 20;

/// How an entry's bytes are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Raw bytes.
    Stored,
    /// An LZ4 block, without a size prefix.
    Lz4,
}

impl CompressionMethod {
    /// The byte recorded in the manifest.
    pub fn code(self) -> u8 {
        match self {
            Self::Stored => 0,
            Self::Lz4 => 1,
        }
    }

    /// Decodes a manifest byte.
    pub fn from_code(code: u8) -> Result<Self, PackError> {
        match code {
            0 => Ok(Self::Stored),
            1 => Ok(Self::Lz4),
            other => Err(PackError::UnknownMethod(other)),
        }
    }

    /// Whether `stored_size` bytes in this method can decode to `size` bytes.
    ///
    /// An LZ4 block expands at most 255-fold, plus a few bytes of slack.
    pub fn can_expand_to(self, stored_size: u64, size: u64) -> bool {
        match self {
            Self::Stored => size == stored_size,
            Self::Lz4 => size <= stored_size.saturating_mul(255).saturating_add(16),
        }
    }
}

/// One file as described by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Normalized pathname inside the archive.
    pub path: VfsPath,
    /// Offset of the stored blob from the start of the archive.
    pub offset: u64,
    /// Length of the stored blob.
    pub stored_size: u64,
    /// Length of the file once decompressed.
    pub size: u64,
    /// Modification time of the source file, in seconds since the Unix epoch.
    pub mtime_secs: u64,
    /// [`CompressionMethod`] code.
    pub method: u8,
    /// BLAKE3 digest of the uncompressed bytes.
    pub hash: [u8; 32],
}

impl ManifestEntry {
    /// The entry's metadata in VFS terms.
    pub fn file_info(&self) -> FileInfo {
        FileInfo::new(
            self.path.as_str(),
            self.size,
            UNIX_EPOCH + Duration::from_secs(self.mtime_secs),
        )
    }
}

/// Seconds since the Unix epoch, saturating at zero for earlier times.
pub fn to_unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Encodes the manifest with the same bincode configuration the reader uses.
pub fn encode_manifest(entries: &[ManifestEntry]) -> Result<Vec<u8>, PackError> {
    let config = bincode::config::standard();
    Ok(bincode::serde::encode_to_vec(entries, config)?)
}

/// Decodes a manifest, rejecting trailing garbage.
pub fn decode_manifest(bytes: &[u8]) -> Result<Vec<ManifestEntry>, PackError> {
    let config = bincode::config::standard();
    let (entries, read): (Vec<ManifestEntry>, usize) =
        bincode::serde::decode_from_slice(bytes, config)?;
    if read != bytes.len() {
        return Err(PackError::Format(format!(
            "{} unexpected bytes after the manifest",
            bytes.len() - read
        )));
    }
    Ok(entries)
}

/// Builds the archive trailer.
pub fn trailer(manifest_offset: u64, manifest_len: u64) -> [u8; TRAILER_LEN as usize] {
    let mut out = [0u8; TRAILER_LEN as usize];
    out[..8].copy_from_slice(&manifest_offset.to_le_bytes());
    out[8..16].copy_from_slice(&manifest_len.to_le_bytes());
    out[16..].copy_from_slice(&MAGIC);
    out
}

/// Parses an archive trailer into `(manifest_offset, manifest_len)`.
pub fn parse_trailer(bytes: &[u8; TRAILER_LEN as usize]) -> Result<(u64, u64), PackError> {
    if bytes[16..] != MAGIC {
        return Err(PackError::Format("missing trailing magic".into()));
    }
    let mut offset = [0u8; 8];
    let mut len = [0u8; 8];
    offset.copy_from_slice(&bytes[..8]);
    len.copy_from_slice(&bytes[8..16]);
    Ok((u64::from_le_bytes(offset), u64::from_le_bytes(len)))
}

/// Checks the leading magic and version.
pub fn parse_header(bytes: &[u8; HEADER_LEN as usize]) -> Result<(), PackError> {
    if bytes[..4] != MAGIC {
        return Err(PackError::Format("not a pack archive".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(PackError::Format(format!(
            "unsupported version {version} (expected {VERSION})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_roundtrip() {
        let bytes = trailer(1234, 56);
        assert_eq!(parse_trailer(&bytes).unwrap(), (1234, 56));
    }

    #[test]
    fn test_bad_header_is_rejected() {
        assert!(parse_header(b"ZIP\0\x01\0").is_err());
        let mut header = [0u8; HEADER_LEN as usize];
        header[..4].copy_from_slice(&MAGIC);
        header[4..].copy_from_slice(&(VERSION + 1).to_le_bytes());
        assert!(matches!(parse_header(&header), Err(PackError::Format(_))));
    }

    #[test]
    fn test_unknown_method_code() {
        assert_eq!(CompressionMethod::from_code(1).unwrap(), CompressionMethod::Lz4);
        assert!(matches!(
            CompressionMethod::from_code(9),
            Err(PackError::UnknownMethod(9))
        ));
    }

    #[test]
    fn test_declared_sizes_are_bounded() {
        assert!(CompressionMethod::Stored.can_expand_to(10, 10));
        assert!(!CompressionMethod::Stored.can_expand_to(10, 11));
        assert!(CompressionMethod::Lz4.can_expand_to(4, 1000));
        assert!(!CompressionMethod::Lz4.can_expand_to(4, u64::MAX));
        assert!(CompressionMethod::Lz4.can_expand_to(0, 0));
    }

    #[test]
    fn test_manifest_trailing_bytes_are_rejected() {
        let mut bytes = encode_manifest(&[]).unwrap();
        bytes.push(0xff);
        assert!(decode_manifest(&bytes).is_err());
    }
}
