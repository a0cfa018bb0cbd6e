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

//! Cache invalidation driven by filesystem notifications.
//!
//! A [`ChangeWatcher`] watches a mounted loose directory. Events arrive on a
//! background thread owned by `notify` and are queued on a channel; they only
//! touch the [`Vfs`] when [`ChangeWatcher::poll`] drains them, typically once
//! per frame.

use crate::vfs::Vfs;
use crossbeam_channel::{Receiver, TryRecvError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use strata_core::{VfsError, VfsPath};

/// Maps real paths below a watched directory to the keys they are cached under.
#[derive(Debug, Clone)]
pub struct WatchRoot {
    root: PathBuf,
    mount_point: VfsPath,
}

impl WatchRoot {
    /// Files below `root` are mounted at `mount_point`.
    pub fn new(root: impl Into<PathBuf>, mount_point: VfsPath) -> Self {
        Self {
            root: root.into(),
            mount_point,
        }
    }

    /// The key of a real path, or `None` if it lies outside the root.
    pub fn key_for(&self, path: &Path) -> Option<VfsPath> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let name = VfsPath::from_relative_path(relative)?;
        (!name.is_root()).then(|| self.mount_point.join(&name))
    }

    /// The keys whose cached contents an event makes stale.
    ///
    /// Creations, modifications (including renames) and removals all count;
    /// access events do not.
    pub fn keys_for(&self, event: &Event) -> Vec<VfsPath> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
                .paths
                .iter()
                .filter_map(|path| self.key_for(path))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Queued notifications for one watched directory.
#[derive(Debug)]
struct Inbox {
    events: Receiver<notify::Result<Event>>,
    root: WatchRoot,
}

impl Inbox {
    fn drain(&self, vfs: &Vfs) -> usize {
        let mut removed = 0;
        loop {
            match self.events.try_recv() {
                Ok(Ok(event)) => {
                    for key in self.root.keys_for(&event) {
                        if vfs.invalidate(&key) {
                            log::debug!("ChangeWatcher: '{key}' changed on disk; dropped from cache");
                            removed += 1;
                        }
                    }
                }
                Ok(Err(err)) => log::warn!("ChangeWatcher: notification error: {err}"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("ChangeWatcher: notification channel closed");
                    break;
                }
            }
        }
        removed
    }
}

/// Watches a loose directory and invalidates changed files in a [`Vfs`].
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    inbox: Inbox,
}

impl ChangeWatcher {
    /// Starts watching `dir` recursively. Its files are assumed to be
    /// mounted at `mount_point`.
    pub fn new(dir: impl AsRef<Path>, mount_point: VfsPath) -> Result<Self, VfsError> {
        let root = dir.as_ref().canonicalize()?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only goes away with the watcher itself.
            let _ = tx.send(res);
        })
        .map_err(watch_error)?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(watch_error)?;
        log::debug!(
            "ChangeWatcher: watching '{}' for '{}'",
            root.display(),
            mount_point
        );
        Ok(Self {
            _watcher: watcher,
            inbox: Inbox {
                events: rx,
                root: WatchRoot::new(root, mount_point),
            },
        })
    }

    /// Applies every queued notification to `vfs` without blocking.
    ///
    /// Changed files are dropped from the cache and their recorded size and
    /// modification time are refreshed. Returns how many cache entries were
    /// removed.
    pub fn poll(&self, vfs: &Vfs) -> usize {
        self.inbox.drain(vfs)
    }
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("root", &self.inbox.root)
            .finish_non_exhaustive()
    }
}

fn watch_error(err: notify::Error) -> VfsError {
    VfsError::Io(io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};

    fn root() -> WatchRoot {
        WatchRoot::new("/game/mods/public", VfsPath::new("mods/public"))
    }

    #[test]
    fn test_paths_map_to_mounted_keys() {
        let root = root();
        assert_eq!(
            root.key_for(Path::new("/game/mods/public/Art/Tex.dds")),
            Some(VfsPath::new("mods/public/art/tex.dds"))
        );
        assert_eq!(root.key_for(Path::new("/elsewhere/file.txt")), None);
        assert_eq!(root.key_for(Path::new("/game/mods/public")), None);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let root = root();
        let access = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/game/mods/public/a.xml"));
        assert!(root.keys_for(&access).is_empty());

        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/game/mods/public/a.xml"));
        assert_eq!(root.keys_for(&modify), [VfsPath::new("mods/public/a.xml")]);
    }

    #[test]
    fn test_drain_removes_changed_entries() {
        let vfs = Vfs::new(std::sync::Arc::new(FileCache::new(1024 * 1024)));
        let cache = vfs.cache();
        for key in ["mods/public/a.xml", "mods/public/b.xml"] {
            let buffer = cache.reserve(3).unwrap();
            cache.add(&VfsPath::new(key), buffer, 3).unwrap();
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let inbox = Inbox {
            events: rx,
            root: root(),
        };
        tx.send(Ok(Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/game/mods/public/a.xml"))))
            .unwrap();
        tx.send(Ok(Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/game/mods/public/new.xml"))))
            .unwrap();

        assert_eq!(inbox.drain(&vfs), 1);
        assert!(!cache.contains(&VfsPath::new("mods/public/a.xml")));
        assert!(cache.contains(&VfsPath::new("mods/public/b.xml")));
        assert_eq!(inbox.drain(&vfs), 0);
    }

    #[test]
    fn test_drain_refreshes_resized_files() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().canonicalize().unwrap();
        std::fs::write(real.join("unit.xml"), b"<a/>").unwrap();
        let vfs = Vfs::new(std::sync::Arc::new(FileCache::new(1024 * 1024)));
        let mount = VfsPath::new("mods/public");
        vfs.mount_directory(&real, &mount, 0).unwrap();
        let key = VfsPath::new("mods/public/unit.xml");
        assert_eq!(&*vfs.load_file(&key).unwrap(), b"<a/>");

        std::fs::write(real.join("unit.xml"), b"<unit hp=\"10\"/>").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let inbox = Inbox {
            events: rx,
            root: WatchRoot::new(&real, mount),
        };
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(real.join("unit.xml"))))
            .unwrap();

        assert_eq!(inbox.drain(&vfs), 1);
        assert_eq!(vfs.file_info(&key).unwrap().size, 15);
        assert_eq!(&*vfs.load_file(&key).unwrap(), b"<unit hp=\"10\"/>");
    }
}
