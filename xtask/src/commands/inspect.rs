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
use std::path::Path;
use strata_core::ArchiveReader;
use strata_io::pack::CompressionMethod;
use strata_io::PackReader;

fn open(archive: &Path) -> Result<PackReader> {
    PackReader::open(archive, 0)
        .with_context(|| format!("Failed to open archive '{}'", archive.display()))
}

pub fn list(archive: &Path) -> Result<()> {
    print_task_start("Listing Archive", MAGNIFIER, CYAN);
    let reader = open(archive)?;

    let mut total_size = 0;
    let mut total_stored = 0;
    for entry in reader.entries() {
        let method = match CompressionMethod::from_code(entry.method) {
            Ok(CompressionMethod::Stored) => "stored",
            Ok(CompressionMethod::Lz4) => "lz4",
            Err(_) => "unknown",
        };
        println!(
            "  {:<7} {:>12} {:>12}  {}",
            method,
            human_bytes(entry.size),
            human_bytes(entry.stored_size),
            entry.path
        );
        total_size += entry.size;
        total_stored += entry.stored_size;
    }

    println!(
        "{}{} entries,{} {} of data stored in {}",
        BOLD,
        reader.entries().len(),
        RESET,
        human_bytes(total_size),
        human_bytes(total_stored)
    );
    Ok(())
}

pub fn verify(archive: &Path) -> Result<()> {
    print_task_start("Verifying Archive", MAGNIFIER, YELLOW);
    let reader = open(archive)?;

    let mut checked = 0;
    let mut failures = 0;
    reader.read_entries(&mut |path, info, loader| {
        let mut buf = vec![0u8; info.size as usize];
        match loader.load(Path::new(path.as_str()), &mut buf) {
            Ok(()) => checked += 1,
            Err(err) => {
                print_error(&format!("{path}: {err}"));
                failures += 1;
            }
        }
        Ok(())
    })?;

    if failures > 0 {
        anyhow::bail!("{failures} of {} entries are damaged", checked + failures);
    }
    print_success(&format!("All {checked} entries match their checksums."));
    Ok(())
}
