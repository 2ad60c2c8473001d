// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only filesystem view over the secret store.
//!
//! ## Security
//!
//! Unlocked content must never be written back to persistent storage
//! through the path it was read from. Every mutating call fails with
//! `PermissionDenied` regardless of its arguments, and none of them reach
//! the store. Entries leave only through the store's own `remove`/`clear`
//! or expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{VfsError, VirtualPath};
use crate::clock::Clock;
use crate::storage::{ExpiringSecretStore, StoreEvent, StoredSecret};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
}

/// Metadata returned by `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub file_type: FileType,
    pub size: u64,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub readonly: bool,
}

/// One `read_directory` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Created,
    Deleted,
}

/// Change notification for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub kind: FileChangeKind,
    pub uri: String,
}

impl From<StoreEvent> for FileChange {
    fn from(event: StoreEvent) -> Self {
        match event {
            StoreEvent::Inserted {
                identifier,
                display_name,
            } => FileChange {
                kind: FileChangeKind::Created,
                uri: VirtualPath::file(identifier, display_name).to_uri(),
            },
            StoreEvent::Removed {
                identifier,
                display_name,
                ..
            } => FileChange {
                kind: FileChangeKind::Deleted,
                uri: VirtualPath::file(identifier, display_name).to_uri(),
            },
        }
    }
}

/// Stream of [`FileChange`]s derived from store events.
pub struct FileWatcher {
    events: broadcast::Receiver<StoreEvent>,
}

impl FileWatcher {
    /// Wait for the next change. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<FileChange> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event.into()),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "File watcher lagged, some change events were dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`FileWatcher::next`].
    pub fn try_next(&mut self) -> Option<FileChange> {
        loop {
            match self.events.try_recv() {
                Ok(event) => return Some(event.into()),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "File watcher lagged, some change events were dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Read-only virtual filesystem backed by an [`ExpiringSecretStore`].
#[derive(Clone)]
pub struct ReadOnlyVirtualFs {
    store: Arc<ExpiringSecretStore>,
}

impl ReadOnlyVirtualFs {
    pub fn new(store: Arc<ExpiringSecretStore>) -> Self {
        Self { store }
    }

    /// Resolve a file address to its live secret.
    fn lookup(
        &self,
        identifier: &str,
        display_name: &str,
        address: &str,
    ) -> Result<StoredSecret, VfsError> {
        match self.store.get(identifier) {
            Some(secret) if secret.display_name == display_name => Ok(secret),
            _ => {
                debug!(address = %address, "Virtual file not found");
                Err(VfsError::NotFound(address.to_string()))
            }
        }
    }

    pub fn stat(&self, address: &str) -> Result<FileStat, VfsError> {
        match VirtualPath::parse(address)? {
            VirtualPath::Root => {
                let now = self.store.clock().now();
                Ok(directory_stat(now, now))
            }
            VirtualPath::Record { identifier } => self
                .store
                .get(&identifier)
                .map(|secret| directory_stat(secret.created_at, secret.created_at))
                .ok_or_else(|| VfsError::NotFound(address.to_string())),
            VirtualPath::File {
                identifier,
                display_name,
            } => {
                let secret = self.lookup(&identifier, &display_name, address)?;
                Ok(FileStat {
                    file_type: FileType::File,
                    size: secret.size() as u64,
                    ctime: secret.created_at,
                    mtime: secret.created_at,
                    readonly: true,
                })
            }
        }
    }

    /// Copy of the plaintext, zeroed when dropped.
    pub fn read(&self, address: &str) -> Result<Zeroizing<Vec<u8>>, VfsError> {
        self.read_with(address, |bytes| Zeroizing::new(bytes.to_vec()))
    }

    /// Borrow the plaintext for the duration of `f`.
    pub fn read_with<R>(&self, address: &str, f: impl FnOnce(&[u8]) -> R) -> Result<R, VfsError> {
        match VirtualPath::parse(address)? {
            VirtualPath::File {
                identifier,
                display_name,
            } => {
                let secret = self.lookup(&identifier, &display_name, address)?;
                Ok(f(secret.plaintext()))
            }
            VirtualPath::Root | VirtualPath::Record { .. } => {
                Err(VfsError::IsADirectory(address.to_string()))
            }
        }
    }

    /// List the root (one directory per live record) or a record directory.
    pub fn read_directory(&self, address: &str) -> Result<Vec<DirEntry>, VfsError> {
        match VirtualPath::parse(address)? {
            VirtualPath::Root => {
                let mut entries: Vec<DirEntry> = self
                    .store
                    .stats()
                    .per_entry
                    .into_iter()
                    .map(|entry| DirEntry {
                        name: entry.identifier,
                        file_type: FileType::Directory,
                    })
                    .collect();
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(entries)
            }
            VirtualPath::Record { identifier } => self
                .store
                .get(&identifier)
                .map(|secret| {
                    vec![DirEntry {
                        name: secret.display_name,
                        file_type: FileType::File,
                    }]
                })
                .ok_or_else(|| VfsError::NotFound(address.to_string())),
            VirtualPath::File { .. } => Err(VfsError::NotADirectory(address.to_string())),
        }
    }

    pub fn write(&self, address: &str, _content: &[u8]) -> Result<(), VfsError> {
        Err(deny("write", address))
    }

    pub fn delete(&self, address: &str) -> Result<(), VfsError> {
        Err(deny("delete", address))
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        debug!(to = %to, "Rename target ignored");
        Err(deny("rename", from))
    }

    pub fn create_directory(&self, address: &str) -> Result<(), VfsError> {
        Err(deny("create_directory", address))
    }

    /// Subscribe to created/deleted notifications.
    pub fn watch(&self) -> FileWatcher {
        FileWatcher {
            events: self.store.subscribe(),
        }
    }
}

fn directory_stat(ctime: DateTime<Utc>, mtime: DateTime<Utc>) -> FileStat {
    FileStat {
        file_type: FileType::Directory,
        size: 0,
        ctime,
        mtime,
        readonly: true,
    }
}

fn deny(operation: &'static str, address: &str) -> VfsError {
    warn!(operation, address = %address, "Rejected mutation of read-only virtual filesystem");
    VfsError::PermissionDenied {
        operation,
        address: address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::storage::DEFAULT_MAX_ENTRIES;
    use chrono::Duration;

    fn setup() -> (ReadOnlyVirtualFs, Arc<ExpiringSecretStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(ExpiringSecretStore::new(DEFAULT_MAX_ENTRIES, clock.clone()));
        (ReadOnlyVirtualFs::new(store.clone()), store, clock)
    }

    #[test]
    fn read_returns_exact_bytes_until_expiry() {
        let (fs, store, clock) = setup();
        let payload = b"id,value\n1,42\n".to_vec();
        let expires = clock.now() + Duration::milliseconds(1000);
        store.put("7", payload.clone(), "data.csv", expires).unwrap();

        assert_eq!(fs.read("7/data.csv").unwrap().as_slice(), payload.as_slice());

        clock.advance(Duration::milliseconds(1100));
        assert_eq!(
            fs.read("7/data.csv").unwrap_err(),
            VfsError::NotFound("7/data.csv".into())
        );
        assert_eq!(store.stats().count, 0);
    }

    #[test]
    fn stat_reports_file_metadata() {
        let (fs, store, clock) = setup();
        store.put("7", vec![0u8; 42], "data.csv", clock.now() + Duration::seconds(60)).unwrap();

        let stat = fs.stat("memvault:/7/data.csv").unwrap();
        assert_eq!(stat.file_type, FileType::File);
        assert_eq!(stat.size, 42);
        assert_eq!(stat.ctime, clock.now());
        assert!(stat.readonly);

        assert_eq!(fs.stat("/7").unwrap().file_type, FileType::Directory);
        assert_eq!(fs.stat("/").unwrap().file_type, FileType::Directory);
    }

    #[test]
    fn wrong_display_name_is_not_found() {
        let (fs, store, clock) = setup();
        store.put("7", b"x".to_vec(), "data.csv", clock.now() + Duration::seconds(60)).unwrap();
        assert!(matches!(fs.stat("/7/other.csv"), Err(VfsError::NotFound(_))));
        assert!(matches!(fs.read("/7/other.csv"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn mutations_are_denied_and_leave_store_untouched() {
        let (fs, store, clock) = setup();
        store.put("7", b"keep".to_vec(), "data.csv", clock.now() + Duration::seconds(60)).unwrap();

        for result in [
            fs.write("/7/data.csv", b"overwrite"),
            fs.delete("/7/data.csv"),
            fs.rename("/7/data.csv", "/7/stolen.csv"),
            fs.create_directory("/8"),
            fs.write("/does/not/exist/at/all", b""),
            fs.delete("not even :: valid"),
        ] {
            assert!(matches!(result, Err(VfsError::PermissionDenied { .. })));
        }

        assert_eq!(store.len(), 1);
        assert_eq!(fs.read("/7/data.csv").unwrap().as_slice(), b"keep");
    }

    #[test]
    fn read_directory_lists_records_and_files() {
        let (fs, store, clock) = setup();
        let expires = clock.now() + Duration::seconds(60);
        store.put("9", b"x".to_vec(), "b.json", expires).unwrap();
        store.put("7", b"y".to_vec(), "a.csv", expires).unwrap();

        let root = fs.read_directory("/").unwrap();
        let names: Vec<_> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["7", "9"]);
        assert!(root.iter().all(|e| e.file_type == FileType::Directory));

        let record = fs.read_directory("/7").unwrap();
        assert_eq!(
            record,
            vec![DirEntry {
                name: "a.csv".into(),
                file_type: FileType::File
            }]
        );

        assert!(matches!(fs.read_directory("/7/a.csv"), Err(VfsError::NotADirectory(_))));
        assert!(matches!(fs.read_directory("/8"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn reading_a_directory_fails() {
        let (fs, _, _) = setup();
        assert!(matches!(fs.read("/"), Err(VfsError::IsADirectory(_))));
    }

    #[test]
    fn read_with_borrows_plaintext() {
        let (fs, store, clock) = setup();
        store.put("7", b"abc".to_vec(), "data.csv", clock.now() + Duration::seconds(60)).unwrap();
        let len = fs.read_with("/7/data.csv", |bytes| bytes.len()).unwrap();
        assert_eq!(len, 3);
    }

    #[tokio::test]
    async fn watch_emits_created_and_deleted() {
        let (fs, store, clock) = setup();
        let mut watcher = fs.watch();

        store.put("7", b"x".to_vec(), "data.csv", clock.now() + Duration::seconds(60)).unwrap();
        store.remove("7");

        assert_eq!(
            watcher.next().await.unwrap(),
            FileChange {
                kind: FileChangeKind::Created,
                uri: "memvault:/7/data.csv".into()
            }
        );
        assert_eq!(
            watcher.next().await.unwrap(),
            FileChange {
                kind: FileChangeKind::Deleted,
                uri: "memvault:/7/data.csv".into()
            }
        );
        assert!(watcher.try_next().is_none());
    }

    #[test]
    fn expiry_on_read_emits_deleted() {
        let (fs, store, clock) = setup();
        store.put("7", b"x".to_vec(), "data.csv", clock.now() + Duration::seconds(1)).unwrap();
        let mut watcher = fs.watch();

        clock.advance(Duration::seconds(2));
        assert!(fs.read("/7/data.csv").is_err());
        assert_eq!(
            watcher.try_next().unwrap().kind,
            FileChangeKind::Deleted
        );
    }
}
