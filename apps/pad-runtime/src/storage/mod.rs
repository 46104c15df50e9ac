// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! # Encrypted Storage Module
//!
//! This module provides persistent storage using **Gramine encrypted files**.
//! All data is stored under `/data` which is mounted as an encrypted filesystem
//! in the Gramine manifest.
//!
//! ## Security Model
//!
//! - Files are encrypted on the host filesystem
//! - Files are transparently decrypted inside the enclave
//! - Encryption keys are derived by Gramine (bound to enclave identity)
//! - Any modification outside the enclave causes read failure
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   runtime/
//!     snapshot.json        # Sealed contract states, block height, egress queue
//!   keys/
//!     worker.pem           # Worker identity key (NEVER exposed via API)
//!   receipts.redb          # Command receipts per block
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```

pub mod audit;
pub mod encrypted_fs;
pub mod paths;
pub mod receipts;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use encrypted_fs::{EncryptedStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use receipts::{ReceiptDatabase, ReceiptDbError};
