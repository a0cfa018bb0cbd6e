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

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use strata_core::{ArchiveWriter, VfsError, VfsPath};
use strata_io::{FileCache, PackReader, PackWriter, Vfs};
use tempfile::{tempdir, TempDir};

const MIB: usize = 1024 * 1024;

/// A mod directory plus an archive holding an older copy of some of its files.
fn fixture() -> Result<(TempDir, Vfs)> {
    let dir = tempdir()?;
    let loose = dir.path().join("loose");
    let packed = dir.path().join("packed");
    fs::create_dir_all(loose.join("Maps"))?;
    fs::create_dir_all(packed.join("maps"))?;
    fs::write(loose.join("Maps/Arena.xml"), b"loose arena")?;
    fs::write(packed.join("maps/arena.xml"), b"archived arena")?;
    fs::write(packed.join("maps/desert.xml"), b"archived desert")?;

    let archive = dir.path().join("public.spak");
    let mut writer = PackWriter::create(&archive, &packed, true)?;
    writer.add_file(&packed.join("maps/arena.xml"))?;
    writer.add_file(&packed.join("maps/desert.xml"))?;
    writer.finish()?;

    let vfs = Vfs::new(Arc::new(FileCache::new(MIB)));
    let mount = VfsPath::new("mods/public");
    vfs.mount_archive(&PackReader::open(&archive, 10)?, &mount)?;
    vfs.mount_directory(&loose, &mount, 0)?;
    Ok((dir, vfs))
}

#[test]
fn test_lower_precedence_wins() -> Result<()> {
    let (_dir, vfs) = fixture()?;
    let arena = VfsPath::new("mods/public/maps/arena.xml");
    let desert = VfsPath::new("mods/public/maps/desert.xml");

    assert_eq!(vfs.len(), 2);
    assert_eq!(&*vfs.load_file(&arena)?, b"loose arena");
    assert_eq!(vfs.location(&arena)?.code, 'F');
    assert_eq!(&*vfs.load_file(&desert)?, b"archived desert");
    assert_eq!(vfs.location(&desert)?.code, 'A');
    Ok(())
}

#[test]
fn test_equal_precedence_keeps_first_registration() -> Result<()> {
    let dir = tempdir()?;
    for (name, body) in [("one", "first"), ("two", "second")] {
        let root = dir.path().join(name);
        fs::create_dir_all(&root)?;
        fs::write(root.join("file.txt"), body)?;
    }
    let vfs = Vfs::new(Arc::new(FileCache::new(MIB)));
    assert_eq!(vfs.mount_directory(dir.path().join("one"), &VfsPath::root(), 5)?, 1);
    assert_eq!(vfs.mount_directory(dir.path().join("two"), &VfsPath::root(), 5)?, 0);
    assert_eq!(&*vfs.load_file(&VfsPath::new("file.txt"))?, b"first");
    Ok(())
}

#[test]
fn test_second_load_is_a_cache_hit() -> Result<()> {
    let (_dir, vfs) = fixture()?;
    let path = VfsPath::new("mods/public/maps/desert.xml");
    let first = vfs.load_file(&path)?;
    let second = vfs.load_file(&path)?;
    assert!(first.ptr_eq(&second));

    let stats = vfs.cache().stats();
    assert_eq!((stats.hits, stats.misses, stats.insertions), (1, 1, 1));
    Ok(())
}

#[test]
fn test_invalidate_rereads_changed_file() -> Result<()> {
    let (dir, vfs) = fixture()?;
    let path = VfsPath::new("mods/public/maps/arena.xml");
    assert_eq!(&*vfs.load_file(&path)?, b"loose arena");

    fs::write(dir.path().join("loose/Maps/Arena.xml"), b"LOOSE ARENA")?;
    assert_eq!(&*vfs.load_file(&path)?, b"loose arena");
    assert!(vfs.invalidate(&path));
    assert_eq!(&*vfs.load_file(&path)?, b"LOOSE ARENA");
    Ok(())
}

#[test]
fn test_invalidate_picks_up_grown_file() -> Result<()> {
    let (dir, vfs) = fixture()?;
    let path = VfsPath::new("mods/public/maps/arena.xml");
    assert_eq!(&*vfs.load_file(&path)?, b"loose arena");

    fs::write(dir.path().join("loose/Maps/Arena.xml"), b"loose arena, now with more units")?;
    assert!(vfs.invalidate(&path));
    assert_eq!(vfs.file_info(&path)?.size, 32);
    assert_eq!(&*vfs.load_file(&path)?, b"loose arena, now with more units");
    Ok(())
}

#[test]
fn test_invalidate_picks_up_shrunk_file() -> Result<()> {
    let (dir, vfs) = fixture()?;
    let path = VfsPath::new("mods/public/maps/arena.xml");
    assert_eq!(&*vfs.load_file(&path)?, b"loose arena");

    fs::write(dir.path().join("loose/Maps/Arena.xml"), b"tiny")?;
    assert!(vfs.invalidate(&path));
    assert_eq!(vfs.file_info(&path)?.size, 4);
    assert_eq!(&*vfs.load_file(&path)?, b"tiny");
    Ok(())
}

#[test]
fn test_miss_sizes_loose_file_from_disk() -> Result<()> {
    let (dir, vfs) = fixture()?;
    let path = VfsPath::new("mods/public/maps/arena.xml");
    fs::write(dir.path().join("loose/Maps/Arena.xml"), b"edited before first load")?;
    assert_eq!(&*vfs.load_file(&path)?, b"edited before first load");
    assert_eq!(vfs.file_info(&path)?.size, 24);
    Ok(())
}

#[test]
fn test_missing_file_and_failed_load() -> Result<()> {
    let (dir, vfs) = fixture()?;
    let missing = VfsPath::new("mods/public/maps/nowhere.xml");
    assert!(matches!(vfs.load_file(&missing), Err(VfsError::NotFound(_))));

    let arena = VfsPath::new("mods/public/maps/arena.xml");
    fs::remove_file(dir.path().join("loose/Maps/Arena.xml"))?;
    assert!(matches!(vfs.load_file(&arena), Err(VfsError::Load { .. })));
    assert!(!vfs.cache().contains(&arena));
    assert_eq!(vfs.cache().stats().region_bytes_in_use, 0);
    Ok(())
}

#[test]
fn test_oversized_file_bypasses_cache() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("huge.bin"), vec![3u8; 3 * 4096])?;
    let vfs = Vfs::new(Arc::new(FileCache::new(8192)));
    vfs.mount_directory(dir.path(), &VfsPath::root(), 0)?;

    let path = VfsPath::new("huge.bin");
    let data = vfs.load_file(&path)?;
    assert_eq!(data.len(), 3 * 4096);
    assert!(!data.is_cached());
    assert!(!vfs.cache().contains(&path));
    assert_eq!(vfs.file_info(&path)?.size, 3 * 4096);
    Ok(())
}

#[test]
fn test_mounting_a_missing_directory_fails() {
    let vfs = Vfs::new(Arc::new(FileCache::new(MIB)));
    let err = vfs
        .mount_directory(Path::new("/definitely/not/here"), &VfsPath::root(), 0)
        .unwrap_err();
    assert!(matches!(err, VfsError::Load { .. }));
}
