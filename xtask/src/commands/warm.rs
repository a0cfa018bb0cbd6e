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

use crate::helpers::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use strata_core::VfsPath;
use strata_io::{CacheConfig, FileCache, PackReader, Vfs};

/// Loads the cache configuration at `path`, or the defaults when none is given.
fn load_cache_config(path: Option<&Path>) -> Result<CacheConfig> {
    let Some(path) = path else {
        return Ok(CacheConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache config at '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
}

/// Reads every file of an archive through a file cache `passes` times and
/// reports how the cache behaved.
pub fn warm(archive: &Path, config: Option<&Path>, passes: u32) -> Result<()> {
    print_task_start("Warming Cache", FIRE, BLUE);

    let config = load_cache_config(config)?;
    print_info(&format!(
        "Cache of {} with {}-byte alignment",
        human_bytes(config.size as u64),
        config.alignment
    ));
    let cache = Arc::new(FileCache::with_config(config).context("Invalid cache configuration")?);
    let vfs = Vfs::new(Arc::clone(&cache));

    let reader = PackReader::open(archive, 0)
        .with_context(|| format!("Failed to open archive '{}'", archive.display()))?;
    vfs.mount_archive(&reader, &VfsPath::root())?;
    let paths: Vec<VfsPath> = reader
        .entries()
        .iter()
        .map(|entry| VfsPath::new(entry.path.as_str()))
        .collect();

    let start = Instant::now();
    let mut bytes = 0u64;
    for _ in 0..passes {
        for path in &paths {
            let data = vfs
                .load_file(path)
                .with_context(|| format!("Failed to load '{path}'"))?;
            bytes += data.len() as u64;
        }
    }
    let elapsed = start.elapsed();

    let stats = cache.stats();
    println!("  entries:      {}", stats.entries);
    println!("  indexed:      {}", human_bytes(stats.indexed_bytes as u64));
    println!("  hits/misses:  {}/{}", stats.hits, stats.misses);
    println!("  hit ratio:    {:.1}%", stats.hit_ratio() * 100.0);
    println!("  evictions:    {}", stats.evictions);
    println!("  spills:       {}", stats.spills);
    print_success(&format!(
        "Read {} in {:.2}s",
        human_bytes(bytes),
        elapsed.as_secs_f64()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_cache_config() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.toml");
        fs::write(&path, "size = 1048576\n")?;
        let config = load_cache_config(Some(&path))?;
        assert_eq!(config.size, 1 << 20);
        assert_eq!(config.alignment, CacheConfig::default().alignment);
        Ok(())
    }
}
