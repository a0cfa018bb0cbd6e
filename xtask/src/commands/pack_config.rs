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

use serde::Deserialize;
use std::path::PathBuf;

/// Represents the structure of the `Archive.toml` manifest file.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct PackManifest {
    /// Directories whose files go into the archive. Files are named relative
    /// to their directory; on a name clash the later directory wins.
    pub sources: Vec<PathBuf>,
    /// Where to write the archive.
    pub output: PathBuf,
    /// LZ4-compress entries that shrink.
    pub compress: bool,
}

impl Default for PackManifest {
    /// Provides a default configuration if `Archive.toml` is not found.
    ///
    /// Packs `resources/public` into `.dist/public.spak` with compression.
    fn default() -> Self {
        Self {
            sources: vec![PathBuf::from("resources/public")],
            output: PathBuf::from(".dist/public.spak"),
            compress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let manifest: PackManifest = toml::from_str("compress = false").unwrap();
        assert!(!manifest.compress);
        assert_eq!(manifest.output, PathBuf::from(".dist/public.spak"));
        assert_eq!(manifest.sources, [PathBuf::from("resources/public")]);
    }

    #[test]
    fn test_full_manifest() {
        let manifest: PackManifest = toml::from_str(
            r#"
            sources = ["mods/base", "mods/patch"]
            output = "out/game.spak"
            compress = true
            "#,
        )
        .unwrap();
        assert_eq!(manifest.sources.len(), 2);
        assert_eq!(manifest.output, PathBuf::from("out/game.spak"));
    }
}
