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

use crate::commands::pack_config::PackManifest;
use crate::helpers::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use strata_core::{ArchiveWriter, VfsPath};
use strata_io::PackWriter;
use walkdir::WalkDir;

pub fn pack(manifest_path: &Path) -> Result<()> {
    print_task_start("Packing Archive", PACKAGE, MAGENTA);

    let manifest = load_manifest(manifest_path)?;

    let valid_source_dirs: Vec<PathBuf> = manifest
        .sources
        .into_iter()
        .filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                log::warn!("Source directory '{}' does not exist", dir.display());
            }
            exists
        })
        .collect();

    if valid_source_dirs.is_empty() {
        print_error("No valid source directories found. Nothing to pack.");
        return Ok(());
    }

    let files = find_source_files(&valid_source_dirs);
    if files.is_empty() {
        print_success("No files found to pack.");
        return Ok(());
    }

    println!(
        "{}🔎 Found:{} {} files to pack.",
        BOLD,
        RESET,
        files.len()
    );

    build_archive(&files, &manifest.output, manifest.compress)?;

    print_success("Archive written successfully.");
    Ok(())
}

/// Writes every `(source file, pathname)` pair into a new archive at `output`.
pub fn build_archive(files: &[(PathBuf, VfsPath)], output: &Path, compress: bool) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }

    let base = output.parent().unwrap_or(Path::new("."));
    let mut writer = PackWriter::create(output, base, compress)
        .with_context(|| format!("Failed to create archive at '{}'", output.display()))?;

    for (path, pathname) in files {
        writer
            .add_file_as(path, pathname)
            .with_context(|| format!("Failed to add '{}'", path.display()))?;
    }
    writer.finish().context("Failed to write the archive manifest")?;

    let archive_size = fs::metadata(output)?.len();
    println!(
        "{}{} {} Wrote {} entries to '{}' ({})",
        BOLD,
        GREEN,
        CHECK,
        writer.len(),
        output.display(),
        human_bytes(archive_size)
    );
    Ok(())
}

/// Loads the manifest at `path`.
/// If the file does not exist, it returns the default configuration.
fn load_manifest(path: &Path) -> Result<PackManifest> {
    let manifest: PackManifest = if path.exists() {
        print_info(&format!("Found '{}'. Loading configuration.", path.display()));
        let manifest_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file at '{}'", path.display()))?;
        toml::from_str(&manifest_str)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))?
    } else {
        print_info(&format!(
            "No '{}' found. Using default configuration.",
            path.display()
        ));
        PackManifest::default()
    };

    Ok(manifest)
}

/// Recursively finds all files in the given source directories, paired with
/// the pathname they are stored under.
fn find_source_files(source_dirs: &[PathBuf]) -> Vec<(PathBuf, VfsPath)> {
    let mut files = Vec::new();
    for dir in source_dirs {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let pathname = entry
                .path()
                .strip_prefix(dir)
                .ok()
                .and_then(VfsPath::from_relative_path);
            match pathname {
                Some(pathname) => files.push((entry.into_path(), pathname)),
                None => log::warn!("'{}' has no valid pathname", entry.path().display()),
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_io::PackReader;
    use tempfile::tempdir;

    #[test]
    fn test_later_source_overrides_earlier() -> Result<()> {
        let dir = tempdir()?;
        let base = dir.path().join("base");
        let patch = dir.path().join("patch");
        fs::create_dir_all(base.join("Maps"))?;
        fs::create_dir_all(patch.join("maps"))?;
        fs::write(base.join("Maps/Arena.xml"), b"old")?;
        fs::write(base.join("readme.txt"), b"read me")?;
        fs::write(patch.join("maps/arena.xml"), b"new!")?;

        let files = find_source_files(&[base, patch]);
        assert_eq!(files.len(), 3);

        let output = dir.path().join("out/game.spak");
        build_archive(&files, &output, false)?;

        let reader = PackReader::open(&output, 0)?;
        let arena = reader
            .entries()
            .iter()
            .find(|e| e.path == VfsPath::new("maps/arena.xml"))
            .expect("arena packed");
        assert_eq!(arena.size, 4);
        assert_eq!(reader.entries().len(), 2);
        Ok(())
    }
}
