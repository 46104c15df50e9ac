// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Command receipts backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `receipts`: `block_be(8) | index_be(4)` → serialized [`CommandReceipt`]
//! - `receipts_meta`: key → value (`latest_block` as u64 big-endian)
//!
//! Big-endian keys keep receipts ordered by block, then by message index,
//! so one block is a contiguous range.

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};

use crate::runtime::CommandReceipt;

const RECEIPTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("receipts");
const RECEIPTS_META: TableDefinition<&str, &[u8]> = TableDefinition::new("receipts_meta");

const LATEST_BLOCK: &str = "latest_block";

#[derive(Debug, thiserror::Error)]
pub enum ReceiptDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type ReceiptDbResult<T> = Result<T, ReceiptDbError>;

fn make_key(block_number: u64, index: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&block_number.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

fn decode_u64(bytes: &[u8]) -> Option<u64> {
    bytes.get(..8)?.try_into().ok().map(u64::from_be_bytes)
}

/// Embedded receipt store.
pub struct ReceiptDatabase {
    db: Database,
}

impl ReceiptDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> ReceiptDbResult<Self> {
        let db = Database::create(path)?;

        // Pre-create tables so read transactions on a fresh database succeed
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECEIPTS)?;
            let _ = write_txn.open_table(RECEIPTS_META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store the receipts of a dispatched block and advance `latest_block`.
    ///
    /// Blocks without commands still advance the marker.
    pub fn record_block(&self, block_number: u64, receipts: &[CommandReceipt]) -> ReceiptDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECEIPTS)?;
            for receipt in receipts {
                let json = serde_json::to_vec(receipt)?;
                let key = make_key(block_number, receipt.index);
                table.insert(key.as_slice(), json.as_slice())?;
            }

            let mut meta = write_txn.open_table(RECEIPTS_META)?;
            meta.insert(LATEST_BLOCK, block_number.to_be_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Receipts of one block ordered by message index.
    pub fn receipts_for_block(&self, block_number: u64) -> ReceiptDbResult<Vec<CommandReceipt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECEIPTS)?;

        let start = make_key(block_number, 0);
        let end = make_key(block_number, u32::MAX);
        let mut receipts = Vec::new();
        for entry in table.range(start.as_slice()..=end.as_slice())? {
            let (_, value) = entry?;
            receipts.push(serde_json::from_slice(value.value())?);
        }
        Ok(receipts)
    }

    /// Highest block recorded, if any.
    pub fn latest_block(&self) -> ReceiptDbResult<Option<u64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECEIPTS_META)?;
        Ok(table
            .get(LATEST_BLOCK)?
            .and_then(|value| decode_u64(value.value())))
    }
}
