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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// A normalized virtual pathname.
///
/// This is the lookup key of the VFS and of the file cache. Two spellings of the
/// same file always produce the same `VfsPath`:
/// - `\` separators are converted to `/`;
/// - empty and `.` segments are dropped, `..` removes the previous segment
///   (it never climbs above the root);
/// - leading and trailing separators are removed;
/// - ASCII letters are folded to lowercase.
///
/// The empty path denotes the VFS root and is what mount points default to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VfsPath(String);

impl VfsPath {
    /// Creates a normalized path from any string spelling.
    pub fn new(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self(segments.join("/").to_ascii_lowercase())
    }

    /// The VFS root (empty path).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Converts a relative filesystem path into a virtual pathname.
    ///
    /// Returns `None` for absolute paths, drive prefixes and non UTF-8 names,
    /// none of which can be expressed inside the VFS namespace.
    pub fn from_relative_path(path: &Path) -> Option<Self> {
        let mut segments: Vec<&str> = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_str()?),
                Component::CurDir => {}
                Component::ParentDir => {
                    segments.pop();
                }
                Component::Prefix(_) | Component::RootDir => return None,
            }
        }
        Some(Self::new(&segments.join("/")))
    }

    /// Returns `self` with `child` appended as additional segments.
    pub fn join(&self, child: &VfsPath) -> Self {
        match (self.0.is_empty(), child.0.is_empty()) {
            (true, _) => child.clone(),
            (false, true) => self.clone(),
            (false, false) => Self(format!("{}/{}", self.0, child.0)),
        }
    }

    /// Returns the normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the VFS root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.0.is_empty() {
            return None;
        }
        self.0.rsplit('/').next()
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VfsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VfsPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for VfsPath {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_separators_and_case_are_normalized() {
        let a = VfsPath::new("Art\\Textures//Grass.PNG");
        let b = VfsPath::new("/art/./textures/grass.png/");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "art/textures/grass.png");
    }

    #[test]
    fn test_parent_segments_never_escape_root() {
        assert_eq!(VfsPath::new("a/b/../c").as_str(), "a/c");
        assert_eq!(VfsPath::new("../../a").as_str(), "a");
        assert!(VfsPath::new("..").is_root());
    }

    #[test]
    fn test_join_with_root_is_identity() {
        let mount = VfsPath::new("mods/public");
        let file = VfsPath::new("maps/arena.xml");
        assert_eq!(mount.join(&file).as_str(), "mods/public/maps/arena.xml");
        assert_eq!(VfsPath::root().join(&file), file);
        assert_eq!(mount.join(&VfsPath::root()), mount);
    }

    #[test]
    fn test_from_relative_path() {
        let rel = PathBuf::from("audio").join("Music.ogg");
        assert_eq!(
            VfsPath::from_relative_path(&rel),
            Some(VfsPath::new("audio/music.ogg"))
        );
        assert!(VfsPath::from_relative_path(Path::new("/etc/passwd")).is_none());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(VfsPath::new("a/b/c.txt").file_name(), Some("c.txt"));
        assert_eq!(VfsPath::root().file_name(), None);
    }
}
