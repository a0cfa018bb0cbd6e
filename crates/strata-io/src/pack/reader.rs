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

use super::error::PackError;
use super::format::{self, CompressionMethod, ManifestEntry, HEADER_LEN, TRAILER_LEN};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use strata_core::{ArchiveEntryCallback, ArchiveReader, FileLoader, VfsError, VfsPath};

/// An open archive file shared by the reader and every entry loader.
#[derive(Debug)]
struct ArchiveFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl ArchiveFile {
    /// Reads exactly `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// Reads a pack archive written by [`PackWriter`](super::PackWriter).
///
/// Opening validates the framing and decodes the manifest; entry data is only
/// touched when a loader handed out by [`read_entries`](ArchiveReader::read_entries)
/// is asked for it.
#[derive(Debug)]
pub struct PackReader {
    archive: Arc<ArchiveFile>,
    entries: Vec<ManifestEntry>,
    precedence: u32,
}

impl PackReader {
    /// Opens the archive at `path`. Its loaders report `precedence`.
    ///
    /// # Errors
    /// Returns [`VfsError::UnknownArchiveFormat`] if the file is not a
    /// well-formed pack archive.
    pub fn open(path: impl AsRef<Path>, precedence: u32) -> Result<Self, VfsError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let entries = read_manifest(&mut file)?;
        log::debug!(
            "PackReader: opened '{}' ({} entries)",
            path.display(),
            entries.len()
        );
        Ok(Self {
            archive: Arc::new(ArchiveFile {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            }),
            entries,
            precedence,
        })
    }

    /// The archive's manifest, in the order entries were written.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// The filesystem path of the archive.
    pub fn path(&self) -> &Path {
        &self.archive.path
    }
}

impl ArchiveReader for PackReader {
    fn read_entries(&self, callback: &mut ArchiveEntryCallback<'_>) -> Result<(), VfsError> {
        for entry in &self.entries {
            let method = CompressionMethod::from_code(entry.method)?;
            let loader = Arc::new(PackEntryLoader {
                archive: Arc::clone(&self.archive),
                entry: entry.clone(),
                method,
                precedence: self.precedence,
            });
            callback(&VfsPath::new(entry.path.as_str()), &entry.file_info(), loader)?;
        }
        Ok(())
    }
}

fn read_manifest(file: &mut File) -> Result<Vec<ManifestEntry>, PackError> {
    let file_len = file.metadata()?.len();
    if file_len < HEADER_LEN + TRAILER_LEN {
        return Err(PackError::Format(format!("file is only {file_len} bytes")));
    }

    let mut header = [0u8; HEADER_LEN as usize];
    file.read_exact(&mut header)?;
    format::parse_header(&header)?;

    let mut trailer = [0u8; TRAILER_LEN as usize];
    file.seek(SeekFrom::Start(file_len - TRAILER_LEN))?;
    file.read_exact(&mut trailer)?;
    let (manifest_offset, manifest_len) = format::parse_trailer(&trailer)?;

    let manifest_end = manifest_offset.checked_add(manifest_len);
    if manifest_offset < HEADER_LEN || manifest_end != Some(file_len - TRAILER_LEN) {
        return Err(PackError::Format(format!(
            "manifest at {manifest_offset}+{manifest_len} does not end at the trailer"
        )));
    }

    let mut bytes = vec![0u8; manifest_len as usize];
    file.seek(SeekFrom::Start(manifest_offset))?;
    file.read_exact(&mut bytes)?;
    let entries = format::decode_manifest(&bytes)?;

    for entry in &entries {
        let end = entry.offset.checked_add(entry.stored_size);
        if entry.offset < HEADER_LEN || !matches!(end, Some(end) if end <= manifest_offset) {
            return Err(PackError::Format(format!(
                "entry '{}' points outside the data section",
                entry.path
            )));
        }
        // Unknown methods are reported when the entry is enumerated.
        if let Ok(method) = CompressionMethod::from_code(entry.method) {
            if !method.can_expand_to(entry.stored_size, entry.size) {
                return Err(PackError::Format(format!(
                    "entry '{}' claims {} bytes from {} stored bytes",
                    entry.path, entry.size, entry.stored_size
                )));
            }
        }
    }
    Ok(entries)
}

/// Loads one archive entry.
#[derive(Debug)]
pub struct PackEntryLoader {
    archive: Arc<ArchiveFile>,
    entry: ManifestEntry,
    method: CompressionMethod,
    precedence: u32,
}

impl PackEntryLoader {
    fn read_into(&self, buf: &mut [u8]) -> Result<(), PackError> {
        let entry = &self.entry;
        if buf.len() as u64 != entry.size {
            return Err(self.corrupt(format!(
                "buffer holds {} bytes but the entry has {}",
                buf.len(),
                entry.size
            )));
        }

        match self.method {
            CompressionMethod::Stored => {
                if entry.stored_size != entry.size {
                    return Err(self.corrupt("stored entry with mismatched sizes".into()));
                }
                self.archive.read_at(entry.offset, buf)?;
            }
            CompressionMethod::Lz4 => {
                let mut packed = vec![0u8; entry.stored_size as usize];
                self.archive.read_at(entry.offset, &mut packed)?;
                let written = lz4_flex::block::decompress_into(&packed, buf)
                    .map_err(|err| self.corrupt(err.to_string()))?;
                if written != buf.len() {
                    return Err(self.corrupt(format!(
                        "decompressed to {written} bytes, expected {}",
                        buf.len()
                    )));
                }
            }
        }

        if blake3::hash(buf).as_bytes() != &entry.hash {
            return Err(self.corrupt("checksum mismatch".into()));
        }
        Ok(())
    }

    fn corrupt(&self, reason: String) -> PackError {
        PackError::Corrupt {
            path: self.entry.path.clone(),
            reason,
        }
    }
}

impl FileLoader for PackEntryLoader {
    fn precedence(&self) -> u32 {
        self.precedence
    }

    fn location_code(&self) -> char {
        'A'
    }

    fn path(&self) -> &Path {
        &self.archive.path
    }

    fn load(&self, _name: &Path, buf: &mut [u8]) -> Result<(), VfsError> {
        self.read_into(buf).map_err(|err| match err {
            PackError::Io(io) => VfsError::load(&self.entry.path, io),
            other => other.into(),
        })
    }
}
