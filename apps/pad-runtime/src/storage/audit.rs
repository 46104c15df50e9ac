// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Audit logging for security-sensitive operations.
//!
//! Block dispatch, rejected commands, denied queries and operator
//! authentication failures are logged to the encrypted audit store. Events
//! never contain document content.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EncryptedStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Runtime events
    BlockDispatched,
    CommandRejected,
    SideTaskFinished,
    SnapshotRestored,
    WorkerKeyCreated,

    // Access events
    QueryDenied,
    AuthFailure,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Account or operator that triggered the event (if known).
    pub actor: Option<String>,
    pub contract_id: Option<u32>,
    pub block_number: Option<u64>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor: None,
            contract_id: None,
            block_number: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_contract(mut self, contract_id: u32) -> Self {
        self.contract_id = Some(contract_id);
        self
    }

    pub fn with_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    /// Append an event to its day's JSONL file.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let mut line = serde_json::to_vec(event).map_err(|e| {
            StorageError::SerializationError(format!("Failed to serialize audit event: {e}"))
        })?;
        line.push(b'\n');

        self.storage.append_raw(&path, &line)
    }

    /// Events of one day (`YYYY-MM-DD`), oldest first.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| StorageError::SerializationError(format!("Invalid date: {e}")))?;

        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;
        let content_str = String::from_utf8(content).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        content_str
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::SerializationError(format!(
                        "Failed to deserialize audit event: {e}"
                    ))
                })
            })
            .collect()
    }

    /// Events of every day in `start_date..=end_date`. Days without a log
    /// are skipped.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
            .map_err(|e| StorageError::SerializationError(format!("Invalid start date: {e}")))?;
        let end = NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
            .map_err(|e| StorageError::SerializationError(format!("Invalid end date: {e}")))?;

        let mut all_events = Vec::new();
        let mut current = start;
        while current <= end {
            let date_str = current.format("%Y-%m-%d").to_string();
            match self.read_events(&date_str) {
                Ok(events) => all_events.extend(events),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::SerializationError("Date overflow".to_string()))?;
        }
        Ok(all_events)
    }

    /// Days that have an audit log, sorted.
    pub fn dates(&self) -> StorageResult<Vec<String>> {
        self.storage.list_dirs(self.storage.paths().audit_dir())
    }
}

/// Log an audit event, reporting (not propagating) storage failures.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event:expr) => {{
        let event = $event;
        if let Err(e) = $crate::storage::AuditRepository::new($storage).log(&event) {
            tracing::warn!(error = %e, event_type = ?event.event_type, "Failed to write audit event");
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, EncryptedStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::CommandRejected)
            .with_actor("d435")
            .with_contract(1)
            .with_block(7)
            .failed("bad_origin");

        assert_eq!(event.actor.as_deref(), Some("d435"));
        assert_eq!(event.contract_id, Some(1));
        assert_eq!(event.block_number, Some(7));
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("bad_origin"));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(&AuditEvent::new(AuditEventType::WorkerKeyCreated))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::BlockDispatched).with_block(1))
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = repo.read_events(&today).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::WorkerKeyCreated);
        assert_eq!(events[1].block_number, Some(1));
        assert_eq!(repo.dates().unwrap(), vec![today]);
    }

    #[test]
    fn concurrent_logging_keeps_every_event() {
        let (_temp, storage) = setup();
        let storage = std::sync::Arc::new(storage);

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    let repo = AuditRepository::new(&storage);
                    for block in 0..50 {
                        repo.log(
                            &AuditEvent::new(AuditEventType::QueryDenied)
                                .with_block(thread * 100 + block),
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&storage).read_events(&today).unwrap();
        assert_eq!(events.len(), 400);
    }

    #[test]
    fn range_skips_days_without_logs() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        let mut old = AuditEvent::new(AuditEventType::AuthFailure);
        old.timestamp = "2026-10-01T12:00:00Z".parse().unwrap();
        repo.log(&old).unwrap();
        let mut later = AuditEvent::new(AuditEventType::QueryDenied);
        later.timestamp = "2026-10-03T08:00:00Z".parse().unwrap();
        repo.log(&later).unwrap();

        let events = repo.read_events_range("2026-09-30", "2026-10-05").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::AuthFailure);
        assert_eq!(events[1].event_type, AuditEventType::QueryDenied);
    }

    #[test]
    fn invalid_date_is_rejected() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        assert!(matches!(
            repo.read_events("../keys"),
            Err(StorageError::SerializationError(_))
        ));
    }

    #[test]
    fn macro_logs_event() {
        let (_temp, storage) = setup();
        crate::audit_log!(
            &storage,
            AuditEvent::new(AuditEventType::SnapshotRestored).with_block(3)
        );
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&storage).read_events(&today).unwrap();
        assert_eq!(events[0].event_type, AuditEventType::SnapshotRestored);
    }
}
