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
use std::sync::Arc;
use std::thread;
use strata_core::{VfsError, VfsPath};
use strata_io::{CacheConfig, FileCache, FileData};

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

fn put(cache: &FileCache, key: &str, len: usize, byte: u8) -> Result<FileData> {
    let mut buffer = cache.reserve(len)?;
    buffer[..len].fill(byte);
    Ok(cache.add(&VfsPath::new(key), buffer, len)?)
}

#[test]
fn test_reserve_fill_add_retrieve() -> Result<()> {
    let cache = FileCache::new(MIB);
    let key = VfsPath::new("maps/skirmish/arena.pmp");

    let mut buffer = cache.reserve(4000)?;
    assert!(buffer.capacity() >= 4000);
    buffer[..4000].copy_from_slice(&[0x5a; 4000]);
    let added = cache.add(&key, buffer, 4000)?;

    let found = cache.retrieve(&key).expect("entry was just added");
    assert!(found.ptr_eq(&added));
    assert_eq!(found.len(), 4000);
    assert!(found.iter().all(|&b| b == 0x5a));
    Ok(())
}

#[test]
fn test_the_cache_is_shared_between_threads() -> Result<()> {
    let cache = Arc::new(FileCache::new(4 * MIB));
    let writers: Vec<_> = (0..4u8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || -> Result<()> {
                for i in 0..32 {
                    drop(put(&cache, &format!("thread{t}/file{i}"), 8 * KIB, t)?);
                }
                Ok(())
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer panicked")?;
    }

    assert_eq!(cache.len(), 128);
    let data = cache.retrieve(&VfsPath::new("thread3/file31")).expect("cached");
    assert!(data.iter().all(|&b| b == 3));
    Ok(())
}

#[test]
fn test_data_outlives_the_cache() -> Result<()> {
    let cache = FileCache::new(MIB);
    let data = put(&cache, "a", 100, 7)?;
    drop(cache);
    assert_eq!(data.len(), 100);
    assert!(data.iter().all(|&b| b == 7));
    Ok(())
}

#[test]
fn test_costly_entries_survive_cheap_ones() -> Result<()> {
    let cache = FileCache::new(MIB);
    let mut buffer = cache.reserve(300 * KIB)?;
    buffer.fill(1);
    drop(cache.add_with_cost(&VfsPath::new("costly"), buffer, 300 * KIB, 50)?);
    drop(put(&cache, "cheap", 300 * KIB, 2)?);
    drop(put(&cache, "cheap2", 300 * KIB, 3)?);

    drop(put(&cache, "newcomer", 300 * KIB, 4)?);

    assert!(cache.contains(&VfsPath::new("costly")));
    assert!(!cache.contains(&VfsPath::new("cheap")));
    Ok(())
}

#[test]
fn test_oversize_leaves_cache_unchanged() -> Result<()> {
    let cache = FileCache::new(MIB);
    drop(put(&cache, "kept", 10 * KIB, 1)?);
    let before = cache.stats();

    match cache.reserve(2 * MIB) {
        Err(VfsError::CacheOversize { requested, capacity }) => {
            assert_eq!(requested, 2 * MIB);
            assert_eq!(capacity, MIB);
        }
        other => panic!("expected CacheOversize, got {other:?}"),
    }
    assert_eq!(cache.stats(), before);
    assert!(cache.contains(&VfsPath::new("kept")));
    Ok(())
}

#[test]
fn test_custom_alignment() {
    let config = CacheConfig::with_size(MIB);
    assert_eq!(config.alignment, 4096);
    let cache = FileCache::with_config(CacheConfig {
        alignment: 512,
        verify_contents: true,
        ..config
    })
    .expect("valid configuration");
    let buffer = cache.reserve(1).expect("fits");
    assert_eq!(buffer.capacity(), 512);
}
