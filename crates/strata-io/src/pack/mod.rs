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

//! The pack archive: a single file holding many game files.
//!
//! Entries are optionally LZ4-compressed and carry a BLAKE3 digest that is
//! checked every time they are loaded. The manifest trails the data, see
//! [`format`] for the exact layout.

mod error;
pub mod format;
mod reader;
mod writer;

pub use error::PackError;
pub use format::{CompressionMethod, ManifestEntry};
pub use reader::{PackEntryLoader, PackReader};
pub use writer::PackWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use strata_core::{ArchiveReader, ArchiveWriter, FileLoader, VfsError, VfsPath};
    use tempfile::tempdir;

    fn collect(reader: &PackReader) -> Vec<(VfsPath, Arc<dyn FileLoader>, u64)> {
        let mut out = Vec::new();
        reader
            .read_entries(&mut |path, info, loader| {
                out.push((path.clone(), loader, info.size));
                Ok(())
            })
            .unwrap();
        out
    }

    fn load(loader: &dyn FileLoader, size: u64) -> Result<Vec<u8>, VfsError> {
        let mut buf = vec![0u8; size as usize];
        loader.load(Path::new(""), &mut buf)?;
        Ok(buf)
    }

    #[test]
    fn test_incompressible_entries_are_stored() {
        let dir = tempdir().unwrap();
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        let noise: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 56) as u8
            })
            .collect();
        let text = "abc".repeat(1000);
        fs::write(dir.path().join("noise.bin"), &noise).unwrap();
        fs::write(dir.path().join("text.txt"), &text).unwrap();

        let archive = dir.path().join("out.spak");
        let mut writer = PackWriter::create(&archive, dir.path(), true).unwrap();
        writer.add_file(&dir.path().join("noise.bin")).unwrap();
        writer.add_file(&dir.path().join("text.txt")).unwrap();
        writer.finish().unwrap();

        let reader = PackReader::open(&archive, 1).unwrap();
        let methods: Vec<u8> = reader.entries().iter().map(|e| e.method).collect();
        assert_eq!(
            methods,
            [CompressionMethod::Stored.code(), CompressionMethod::Lz4.code()]
        );
        let entries = collect(&reader);
        assert_eq!(load(&*entries[0].1, entries[0].2).unwrap(), noise);
        assert_eq!(load(&*entries[1].1, entries[1].2).unwrap(), text.as_bytes());
    }

    #[test]
    fn test_drop_finishes_archive() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        let archive = dir.path().join("out.spak");
        {
            let mut writer = PackWriter::create(&archive, dir.path(), false).unwrap();
            writer.add_file(&dir.path().join("a.txt")).unwrap();
        }
        let reader = PackReader::open(&archive, 0).unwrap();
        assert_eq!(reader.entries().len(), 1);
        assert_eq!(reader.entries()[0].path, VfsPath::new("a.txt"));
    }

    #[test]
    fn test_duplicate_names_keep_later_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"first").unwrap();
        fs::write(dir.path().join("b.txt"), b"second!").unwrap();
        let archive = dir.path().join("out.spak");
        let name = VfsPath::new("same.txt");

        let mut writer = PackWriter::create(&archive, dir.path(), false).unwrap();
        writer.add_file_as(&dir.path().join("a.txt"), &name).unwrap();
        writer.add_file_as(&dir.path().join("b.txt"), &name).unwrap();
        assert_eq!(writer.len(), 1);
        writer.finish().unwrap();

        let reader = PackReader::open(&archive, 0).unwrap();
        let entries = collect(&reader);
        assert_eq!(entries.len(), 1);
        assert_eq!(load(&*entries[0].1, entries[0].2).unwrap(), b"second!");
    }

    #[test]
    fn test_add_after_finish_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        let mut writer = PackWriter::create(dir.path().join("out.spak"), dir.path(), false).unwrap();
        writer.finish().unwrap();
        assert!(writer.add_file(&dir.path().join("a.txt")).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_blocks_further_use() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.bin"), vec![5u8; 64 * 1024]).unwrap();
        fs::write(dir.path().join("small.txt"), b"x").unwrap();
        let mut writer = PackWriter::create("/dev/full", dir.path(), false).unwrap();

        let err = writer.add_file(&dir.path().join("big.bin")).unwrap_err();
        assert!(matches!(err, VfsError::Io(_)), "{err}");
        let err = writer.add_file(&dir.path().join("small.txt")).unwrap_err();
        assert!(err.to_string().contains("incomplete"), "{err}");
        assert!(writer.finish().is_err());
        assert!(writer.is_empty());
    }

    #[test]
    fn test_file_outside_base_is_rejected() {
        let base = tempdir().unwrap();
        let other = tempdir().unwrap();
        fs::write(other.path().join("x.txt"), b"x").unwrap();
        let mut writer = PackWriter::create(base.path().join("out.spak"), base.path(), false).unwrap();
        assert!(writer.add_file(&other.path().join("x.txt")).is_err());
        assert!(writer.is_empty());
    }

    #[test]
    fn test_unknown_method_is_reported_on_enumeration() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("odd.spak");
        let entry = ManifestEntry {
            path: VfsPath::new("weird.bin"),
            offset: format::HEADER_LEN,
            stored_size: 0,
            size: 0,
            mtime_secs: 0,
            method: 7,
            hash: *blake3::hash(b"").as_bytes(),
        };
        let manifest = format::encode_manifest(&[entry]).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&format::MAGIC);
        bytes.extend_from_slice(&format::VERSION.to_le_bytes());
        bytes.extend_from_slice(&manifest);
        bytes.extend_from_slice(&format::trailer(format::HEADER_LEN, manifest.len() as u64));
        fs::write(&archive, bytes).unwrap();

        let reader = PackReader::open(&archive, 0).unwrap();
        let err = reader.read_entries(&mut |_, _, _| Ok(())).unwrap_err();
        assert!(matches!(err, VfsError::UnknownArchiveMethod(7)));
    }
}
