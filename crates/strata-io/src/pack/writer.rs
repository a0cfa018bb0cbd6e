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
use super::format::{self, CompressionMethod, ManifestEntry, MAGIC, VERSION};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use strata_core::{ArchiveWriter, VfsError, VfsPath};

/// Writes a pack archive.
///
/// Files are appended one after another; the manifest is written by
/// [`finish`](ArchiveWriter::finish). A writer dropped before finishing
/// finishes itself and logs any failure.
///
/// Once a write to the archive fails, every later call fails with
/// [`PackError::Incomplete`]; the partial file is never given a manifest.
#[derive(Debug)]
pub struct PackWriter {
    path: PathBuf,
    base: PathBuf,
    compress: bool,
    out: BufWriter<File>,
    offset: u64,
    entries: Vec<ManifestEntry>,
    finished: bool,
    failed: bool,
}

impl PackWriter {
    /// Creates (or truncates) the archive at `path`.
    ///
    /// Entries added with [`add_file`](ArchiveWriter::add_file) are named
    /// relative to `base`. With `compress`, each entry is LZ4-compressed
    /// unless that would not make it smaller.
    pub fn create(
        path: impl AsRef<Path>,
        base: impl AsRef<Path>,
        compress: bool,
    ) -> Result<Self, VfsError> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;
        Ok(Self {
            path,
            base: base.as_ref().to_path_buf(),
            compress,
            out,
            offset: format::HEADER_LEN,
            entries: Vec::new(),
            finished: false,
            failed: false,
        })
    }

    /// The archive being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The number of distinct entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn append(&mut self, source: &Path, name: &VfsPath) -> Result<(), PackError> {
        if self.failed {
            return Err(PackError::Incomplete);
        }
        if self.finished {
            return Err(PackError::Finished);
        }
        let metadata = fs::metadata(source)?;
        let bytes = fs::read(source)?;

        let packed = self
            .compress
            .then(|| lz4_flex::block::compress(&bytes))
            .filter(|packed| packed.len() < bytes.len());
        let (method, blob) = match &packed {
            Some(packed) => (CompressionMethod::Lz4, packed.as_slice()),
            None => (CompressionMethod::Stored, bytes.as_slice()),
        };
        if let Err(err) = self.out.write_all(blob) {
            self.failed = true;
            return Err(err.into());
        }

        let entry = ManifestEntry {
            path: name.clone(),
            offset: self.offset,
            stored_size: blob.len() as u64,
            size: bytes.len() as u64,
            mtime_secs: metadata.modified().map(format::to_unix_secs).unwrap_or(0),
            method: method.code(),
            hash: *blake3::hash(&bytes).as_bytes(),
        };
        self.offset += entry.stored_size;
        log::trace!(
            "PackWriter: '{}' <- '{}' ({} -> {} bytes, {:?})",
            name,
            source.display(),
            entry.size,
            entry.stored_size,
            method
        );

        match self.entries.iter_mut().find(|e| e.path == *name) {
            Some(existing) => {
                log::debug!("PackWriter: '{name}' added twice; keeping the later file");
                *existing = entry;
            }
            None => self.entries.push(entry),
        }
        Ok(())
    }

    fn write_manifest(&mut self) -> Result<(), PackError> {
        let written = self.try_write_manifest();
        if written.is_err() {
            self.failed = true;
        }
        written
    }

    fn try_write_manifest(&mut self) -> Result<(), PackError> {
        let manifest = format::encode_manifest(&self.entries)?;
        self.out.write_all(&manifest)?;
        self.out
            .write_all(&format::trailer(self.offset, manifest.len() as u64))?;
        self.out.flush()?;
        log::debug!(
            "PackWriter: finished '{}' ({} entries, {} data bytes)",
            self.path.display(),
            self.entries.len(),
            self.offset - format::HEADER_LEN
        );
        Ok(())
    }
}

impl ArchiveWriter for PackWriter {
    fn add_file(&mut self, path: &Path) -> Result<(), VfsError> {
        let name = path
            .strip_prefix(&self.base)
            .ok()
            .and_then(VfsPath::from_relative_path)
            .filter(|name| !name.is_root())
            .ok_or_else(|| PackError::OutsideBase(path.display().to_string()))?;
        self.add_file_as(path, &name)
    }

    fn add_file_as(&mut self, path: &Path, pathname: &VfsPath) -> Result<(), VfsError> {
        self.append(path, pathname).map_err(|err| match err {
            PackError::Io(io) if !self.failed => VfsError::load(path.display(), io),
            other => other.into(),
        })
    }

    fn finish(&mut self) -> Result<(), VfsError> {
        if self.failed {
            return Err(PackError::Incomplete.into());
        }
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        Ok(self.write_manifest()?)
    }
}

impl Drop for PackWriter {
    fn drop(&mut self) {
        if self.failed {
            log::error!(
                "PackWriter: '{}' was left incomplete after a failed write",
                self.path.display()
            );
        } else if !self.finished {
            if let Err(err) = self.finish() {
                log::error!(
                    "PackWriter: failed to finish '{}': {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}
