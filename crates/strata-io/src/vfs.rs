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

//! A flat table of virtual pathnames backed by loose files and archives.
//!
//! The table maps every [`VfsPath`] to the single source that provides it.
//! Reads go through the shared [`FileCache`]: a hit costs one lookup, a miss
//! reads the file directly into a buffer reserved from the cache.

use crate::cache::{FileCache, FileData};
use crate::loose::LooseDirectory;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_core::{ArchiveReader, FileInfo, FileLoader, VfsError, VfsPath};

#[derive(Debug, Clone)]
struct Source {
    loader: Arc<dyn FileLoader>,
    /// Name handed to the loader; for loose files the on-disk spelling.
    name: PathBuf,
    info: FileInfo,
}

/// Where a virtual file is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// `'F'` for loose files, `'A'` for archive entries.
    pub code: char,
    /// The directory or archive providing the file.
    pub real_path: PathBuf,
}

/// Resolves virtual pathnames to sources and reads them through a [`FileCache`].
#[derive(Debug)]
pub struct Vfs {
    cache: Arc<FileCache>,
    table: RwLock<AHashMap<VfsPath, Source>>,
}

impl Vfs {
    /// Creates an empty VFS reading through `cache`.
    pub fn new(cache: Arc<FileCache>) -> Self {
        Self {
            cache,
            table: RwLock::new(AHashMap::new()),
        }
    }

    /// The cache shared by every read.
    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    /// Makes every file below `dir` visible under `mount_point`.
    ///
    /// Returns the number of files that took effect. On a name collision the
    /// source with the lower precedence wins; with equal precedence the file
    /// registered first is kept.
    pub fn mount_directory(
        &self,
        dir: impl AsRef<Path>,
        mount_point: &VfsPath,
        precedence: u32,
    ) -> Result<usize, VfsError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(VfsError::load(dir.display(), "not a directory"));
        }
        let loose = LooseDirectory::new(dir, precedence);
        let files = loose.enumerate();
        let loader: Arc<dyn FileLoader> = Arc::new(loose);

        let mut table = self.write_table();
        let mut mounted = 0;
        for file in files {
            let source = Source {
                loader: Arc::clone(&loader),
                name: file.relative,
                info: file.info,
            };
            if self.register(&mut table, mount_point.join(&file.pathname), source) {
                mounted += 1;
            }
        }
        log::debug!(
            "Vfs: mounted {} files from '{}' at '{}'",
            mounted,
            dir.display(),
            mount_point
        );
        Ok(mounted)
    }

    /// Makes every entry of an archive visible under `mount_point`.
    ///
    /// Precedence comes from the archive's loaders; collisions are resolved as
    /// in [`mount_directory`](Self::mount_directory). Nothing is mounted if the
    /// enumeration fails.
    pub fn mount_archive(
        &self,
        archive: &dyn ArchiveReader,
        mount_point: &VfsPath,
    ) -> Result<usize, VfsError> {
        let mut found = Vec::new();
        archive.read_entries(&mut |path, info, loader| {
            found.push((
                mount_point.join(path),
                Source {
                    loader,
                    name: PathBuf::from(path.as_str()),
                    info: info.clone(),
                },
            ));
            Ok(())
        })?;

        let mut table = self.write_table();
        let mut mounted = 0;
        for (key, source) in found {
            if self.register(&mut table, key, source) {
                mounted += 1;
            }
        }
        log::debug!("Vfs: mounted {mounted} archive entries at '{mount_point}'");
        Ok(mounted)
    }

    /// Returns `true` if some source provides `path`.
    pub fn contains(&self, path: &VfsPath) -> bool {
        self.read_table().contains_key(path)
    }

    /// The number of visible files.
    pub fn len(&self) -> usize {
        self.read_table().len()
    }

    /// Returns `true` if nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size and modification time of `path` as last observed.
    ///
    /// Loose files are re-examined on every cache miss and on
    /// [`invalidate`](Self::invalidate).
    pub fn file_info(&self, path: &VfsPath) -> Result<FileInfo, VfsError> {
        self.source(path).map(|source| source.info)
    }

    /// Which source provides `path`.
    pub fn location(&self, path: &VfsPath) -> Result<Location, VfsError> {
        self.source(path).map(|source| Location {
            code: source.loader.location_code(),
            real_path: source.loader.path().to_path_buf(),
        })
    }

    /// Returns the contents of `path`, reading and caching them on a miss.
    ///
    /// Files larger than the cache are read into a private buffer and not
    /// cached. A failed read leaves the cache untouched. A loose file is sized
    /// from its current metadata, not from what was seen when it was mounted.
    pub fn load_file(&self, path: &VfsPath) -> Result<FileData, VfsError> {
        if let Some(data) = self.cache.retrieve(path) {
            return Ok(data);
        }

        let source = self.source(path)?;
        let source = self.refresh(path, source)?;
        let size = usize::try_from(source.info.size)
            .map_err(|_| VfsError::load(path, "file does not fit in memory"))?;

        match self.cache.reserve(size) {
            Ok(mut buffer) => {
                source.loader.load(&source.name, &mut buffer[..size])?;
                self.cache.add(path, buffer, size)
            }
            Err(VfsError::CacheOversize { .. }) => {
                log::debug!("Vfs: '{path}' ({size} bytes) is larger than the cache; reading uncached");
                let mut bytes = Vec::new();
                bytes
                    .try_reserve_exact(size)
                    .map_err(|err| VfsError::load(path, err))?;
                bytes.resize(size, 0);
                source.loader.load(&source.name, &mut bytes)?;
                Ok(FileData::from_vec(bytes))
            }
            Err(err) => Err(err),
        }
    }

    /// Drops any cached copy of `path`, typically after it changed on disk,
    /// and picks up its new size and modification time.
    ///
    /// Returns whether a cached copy was dropped.
    pub fn invalidate(&self, path: &VfsPath) -> bool {
        let removed = self.cache.remove(path);
        if let Ok(source) = self.source(path) {
            if let Err(err) = self.refresh(path, source) {
                log::debug!("Vfs: cannot re-examine '{path}': {err}");
            }
        }
        removed
    }

    /// Re-reads the metadata of a mutable source and records any change.
    fn refresh(&self, path: &VfsPath, mut source: Source) -> Result<Source, VfsError> {
        let Some(fresh) = source.loader.refresh(&source.name)? else {
            return Ok(source);
        };
        if fresh.size == source.info.size && fresh.mtime == source.info.mtime {
            return Ok(source);
        }
        log::debug!(
            "Vfs: '{}' changed on disk ({} -> {} bytes)",
            path,
            source.info.size,
            fresh.size
        );
        source.info.size = fresh.size;
        source.info.mtime = fresh.mtime;
        if let Some(current) = self.write_table().get_mut(path) {
            if Arc::ptr_eq(&current.loader, &source.loader) {
                current.info = source.info.clone();
            }
        }
        Ok(source)
    }

    fn source(&self, path: &VfsPath) -> Result<Source, VfsError> {
        self.read_table()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.clone()))
    }

    fn register(
        &self,
        table: &mut AHashMap<VfsPath, Source>,
        key: VfsPath,
        source: Source,
    ) -> bool {
        if let Some(existing) = table.get(&key) {
            if source.loader.precedence() >= existing.loader.precedence() {
                log::trace!("Vfs: '{key}' is already provided by a preferred source");
                return false;
            }
            // The old contents may still be cached.
            self.cache.remove(&key);
        }
        table.insert(key, source);
        true
    }

    fn read_table(&self) -> RwLockReadGuard<'_, AHashMap<VfsPath, Source>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, AHashMap<VfsPath, Source>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}
