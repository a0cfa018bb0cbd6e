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

//! Files read straight from a directory on disk.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use strata_core::{FileInfo, FileLoader, VfsError, VfsPath};
use walkdir::WalkDir;

/// A file found while enumerating a [`LooseDirectory`].
#[derive(Debug, Clone)]
pub struct LooseFile {
    /// Normalized pathname relative to the directory.
    pub pathname: VfsPath,
    /// The on-disk path relative to the directory, with its original spelling.
    pub relative: PathBuf,
    /// Size and modification time.
    pub info: FileInfo,
}

/// A [`FileLoader`] over a directory of loose files.
#[derive(Debug, Clone)]
pub struct LooseDirectory {
    root: PathBuf,
    precedence: u32,
}

impl LooseDirectory {
    /// Serves files below `root` with the given precedence.
    pub fn new(root: impl Into<PathBuf>, precedence: u32) -> Self {
        Self {
            root: root.into(),
            precedence,
        }
    }

    /// Lists every regular file below the directory.
    ///
    /// Unreadable entries and names that cannot be expressed as a virtual
    /// pathname are logged and skipped.
    pub fn enumerate(&self) -> Vec<LooseFile> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("LooseDirectory: skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(pathname) = VfsPath::from_relative_path(relative) else {
                log::warn!(
                    "LooseDirectory: '{}' has no virtual pathname; skipping",
                    entry.path().display()
                );
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    log::warn!("LooseDirectory: skipping '{pathname}': {err}");
                    continue;
                }
            };
            files.push(LooseFile {
                info: FileInfo::from_metadata(pathname.as_str(), &metadata),
                pathname,
                relative: relative.to_path_buf(),
            });
        }
        files
    }
}

impl FileLoader for LooseDirectory {
    fn precedence(&self) -> u32 {
        self.precedence
    }

    fn location_code(&self) -> char {
        'F'
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn load(&self, name: &Path, buf: &mut [u8]) -> Result<(), VfsError> {
        let full = self.root.join(name);
        let mut file = File::open(&full).map_err(|err| VfsError::load(full.display(), err))?;
        file.read_exact(buf)
            .map_err(|err| VfsError::load(full.display(), err))?;
        // The file may have grown since it was sized.
        let mut extra = [0u8; 1];
        match file.read(&mut extra) {
            Ok(0) => Ok(()),
            Ok(_) => Err(VfsError::load(
                full.display(),
                format!("file is larger than the expected {} bytes", buf.len()),
            )),
            Err(err) => Err(VfsError::load(full.display(), err)),
        }
    }

    fn refresh(&self, name: &Path) -> Result<Option<FileInfo>, VfsError> {
        let full = self.root.join(name);
        let metadata = fs::metadata(&full).map_err(|err| VfsError::load(full.display(), err))?;
        if !metadata.is_file() {
            return Err(VfsError::load(full.display(), "not a regular file"));
        }
        let pathname = VfsPath::from_relative_path(name)
            .map_or_else(|| name.to_string_lossy().into_owned(), |p| p.as_str().to_owned());
        Ok(Some(FileInfo::from_metadata(pathname, &metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_enumerate_and_load() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Art/Tex")).unwrap();
        fs::write(dir.path().join("Art/Tex/Grass.dds"), b"grass").unwrap();
        fs::write(dir.path().join("readme.txt"), b"hi").unwrap();

        let loose = LooseDirectory::new(dir.path(), 0);
        let mut files = loose.enumerate();
        files.sort_by(|a, b| a.pathname.cmp(&b.pathname));
        let names: Vec<&str> = files.iter().map(|f| f.pathname.as_str()).collect();
        assert_eq!(names, ["art/tex/grass.dds", "readme.txt"]);
        assert_eq!(files[0].info.size, 5);

        let mut buf = vec![0u8; 5];
        loose.load(&files[0].relative, &mut buf).unwrap();
        assert_eq!(buf, b"grass");
    }

    #[test]
    fn test_short_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        let loose = LooseDirectory::new(dir.path(), 0);
        let mut buf = vec![0u8; 10];
        let err = loose.load(Path::new("a.txt"), &mut buf).unwrap_err();
        assert!(matches!(err, VfsError::Load { .. }));
        assert_eq!(loose.location_code(), 'F');
    }

    #[test]
    fn test_grown_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"abcdef").unwrap();
        let loose = LooseDirectory::new(dir.path(), 0);
        let mut buf = vec![0u8; 3];
        let err = loose.load(Path::new("a.txt"), &mut buf).unwrap_err();
        assert!(matches!(err, VfsError::Load { .. }));
    }

    #[test]
    fn test_refresh_reports_current_size() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.txt"), b"abc").unwrap();
        let loose = LooseDirectory::new(dir.path(), 0);
        fs::write(dir.path().join("A.txt"), b"abcdefgh").unwrap();

        let info = loose.refresh(Path::new("A.txt")).unwrap().unwrap();
        assert_eq!(info.size, 8);
        assert_eq!(info.name, "a.txt");

        fs::remove_file(dir.path().join("A.txt")).unwrap();
        assert!(loose.refresh(Path::new("A.txt")).is_err());
    }
}
