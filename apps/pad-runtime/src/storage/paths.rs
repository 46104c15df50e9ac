// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Path constants and utilities for the sealed storage layout.

use std::path::{Path, PathBuf};

/// Base directory for all encrypted persistent storage.
/// This MUST be mounted as `type = "encrypted"` in the Gramine manifest.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the encrypted filesystem.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all encrypted data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Runtime State ==========

    /// Directory holding the sealed runtime snapshot.
    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join("runtime")
    }

    /// Sealed snapshot of contract states, block height and egress queue.
    pub fn snapshot(&self) -> PathBuf {
        self.runtime_dir().join("snapshot.json")
    }

    /// Receipts database (redb).
    pub fn receipts_db(&self) -> PathBuf {
        self.root.join("receipts.redb")
    }

    // ========== Keys ==========

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    /// Worker identity key (PKCS#8 PEM). Never exposed via API.
    pub fn worker_key(&self) -> PathBuf {
        self.keys_dir().join("worker.pem")
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }

    /// Directories created by [`EncryptedStorage::initialize`](super::EncryptedStorage::initialize).
    pub fn required_dirs(&self) -> [PathBuf; 4] {
        [
            self.root.clone(),
            self.runtime_dir(),
            self.keys_dir(),
            self.audit_dir(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.snapshot(),
            PathBuf::from("/tmp/test-data/runtime/snapshot.json")
        );
    }

    #[test]
    fn runtime_and_key_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.runtime_dir(), PathBuf::from("/data/runtime"));
        assert_eq!(paths.receipts_db(), PathBuf::from("/data/receipts.redb"));
        assert_eq!(paths.worker_key(), PathBuf::from("/data/keys/worker.pem"));
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-10-19"),
            PathBuf::from("/data/audit/2026-10-19/events.jsonl")
        );
    }
}
