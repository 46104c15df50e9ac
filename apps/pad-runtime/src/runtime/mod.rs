// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! # Contract Runtime
//!
//! Applies chain blocks to the hosted contracts and answers queries.
//!
//! ## Block dispatch
//!
//! 1. Blocks must arrive in order (`number == current + 1`).
//! 2. Every chain message is routed to its destination contract in order.
//!    A rejected command is recorded in the block's receipts and never
//!    aborts the block.
//! 3. Side tasks due at this block are finalized.
//! 4. The receipts are recorded and the sealed snapshot is written.
//!
//! In-flight side tasks are not part of the snapshot. After a restart they
//! are simply gone; their finalizers never run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::audit_log;
use crate::contracts::{
    AccountId, BlockInfo, ContractId, ContractRegistry, MessageOrigin, NativeContext, QueryError,
    TransactionError,
};
use crate::crypto::WorkerIdentity;
use crate::storage::{
    AuditEvent, AuditEventType, EncryptedStorage, ReceiptDatabase, ReceiptDbError, StorageError,
};

pub mod egress;
pub mod side_task;

use egress::{EgressMessage, EgressQueue};
use side_task::SideTaskManager;

/// A finalized chain block as delivered by the relayer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    pub number: u64,
    /// Block timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(default)]
    pub messages: Vec<ChainMessage>,
}

/// A contract command recorded on chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChainMessage {
    #[schema(value_type = Object)]
    pub origin: MessageOrigin,
    #[schema(value_type = u32)]
    pub destination: ContractId,
    #[schema(value_type = Object)]
    pub payload: Value,
}

/// Outcome of one chain message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommandReceipt {
    /// Position of the message within its block.
    pub index: u32,
    #[schema(value_type = u32)]
    pub contract_id: ContractId,
    #[schema(value_type = Object)]
    pub origin: MessageOrigin,
    pub success: bool,
    pub error_code: Option<String>,
    pub error: Option<String>,
}

impl CommandReceipt {
    fn new(index: u32, message: &ChainMessage, result: &Result<(), TransactionError>) -> Self {
        Self {
            index,
            contract_id: message.destination,
            origin: message.origin.clone(),
            success: result.is_ok(),
            error_code: result.as_ref().err().map(|e| e.code().to_string()),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

/// Sealed runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub block_number: u64,
    pub contracts: BTreeMap<ContractId, Value>,
    pub egress: EgressQueue,
    pub sealed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractInfo {
    pub id: u32,
    pub name: String,
}

/// Public description of this worker.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuntimeInfo {
    pub block_number: u64,
    /// Compressed secp256k1 public key of the worker (hex).
    pub worker_public_key: String,
    pub worker_account: String,
    pub root_account: String,
    pub contracts: Vec<ContractInfo>,
    pub pending_side_tasks: usize,
    pub egress_sequence: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("block out of order: expected {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("receipt database error: {0}")]
    Receipts(#[from] ReceiptDbError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub struct Runtime {
    block_number: u64,
    registry: ContractRegistry,
    side_tasks: SideTaskManager,
    egress: EgressQueue,
    identity: WorkerIdentity,
    root: AccountId,
    storage: Option<Arc<EncryptedStorage>>,
    receipts: Option<Arc<ReceiptDatabase>>,
}

impl Runtime {
    /// A genesis runtime (block 0) without persistence.
    pub fn new(identity: WorkerIdentity, root: AccountId, registry: ContractRegistry) -> Self {
        Self {
            block_number: 0,
            registry,
            side_tasks: SideTaskManager::new(),
            egress: EgressQueue::default(),
            identity,
            root,
            storage: None,
            receipts: None,
        }
    }

    /// Seal snapshots and audit events into `storage`.
    pub fn with_storage(mut self, storage: Arc<EncryptedStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Record receipts into `receipts`.
    pub fn with_receipts(mut self, receipts: Arc<ReceiptDatabase>) -> Self {
        self.receipts = Some(receipts);
        self
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(storage) = &self.storage {
            audit_log!(storage.as_ref(), event);
        }
    }

    /// Apply one block. Returns the receipts of its messages.
    ///
    /// State advances even when persisting fails afterwards. The receipts
    /// are already recorded by then; the error is returned so the caller
    /// can alert, and the next block seals again.
    pub fn dispatch_block(&mut self, block: Block) -> Result<Vec<CommandReceipt>, RuntimeError> {
        let expected = self.block_number + 1;
        if block.number != expected {
            return Err(RuntimeError::OutOfOrder {
                expected,
                got: block.number,
            });
        }

        let info = BlockInfo {
            block_number: block.number,
            now_ms: block.timestamp_ms,
        };
        let mut receipts = Vec::with_capacity(block.messages.len());

        for (index, message) in block.messages.into_iter().enumerate() {
            let index = index as u32;
            let result = match self.registry.get_mut(message.destination) {
                Some(contract) => {
                    let mut context = NativeContext {
                        block: info,
                        contract_id: message.destination,
                        side_tasks: &mut self.side_tasks,
                        egress: &mut self.egress,
                    };
                    contract.dispatch_command(
                        &mut context,
                        message.origin.clone(),
                        message.payload.clone(),
                    )
                }
                None => Err(TransactionError::UnknownContract(message.destination)),
            };

            let receipt = CommandReceipt::new(index, &message, &result);
            if let Err(e) = &result {
                warn!(
                    block_number = block.number,
                    index,
                    contract_id = %message.destination,
                    origin = %message.origin,
                    error = %e,
                    "Command rejected"
                );
                self.audit(
                    AuditEvent::new(AuditEventType::CommandRejected)
                        .with_actor(message.origin.to_string())
                        .with_contract(message.destination.0)
                        .with_block(block.number)
                        .failed(e.code()),
                );
            }
            receipts.push(receipt);
        }

        self.block_number = block.number;

        for outcome in self.side_tasks.poll(block.number, &mut self.egress) {
            self.audit(
                AuditEvent::new(AuditEventType::SideTaskFinished)
                    .with_contract(outcome.contract_id.0)
                    .with_block(block.number)
                    .with_details(serde_json::json!({
                        "deadline": outcome.deadline,
                        "completed": outcome.completed,
                    })),
            );
        }

        let rejected = receipts.iter().filter(|r| !r.success).count();
        info!(
            block_number = block.number,
            commands = receipts.len(),
            rejected,
            pending_side_tasks = self.side_tasks.len(),
            "Block dispatched"
        );
        self.audit(
            AuditEvent::new(AuditEventType::BlockDispatched)
                .with_block(block.number)
                .with_details(serde_json::json!({
                    "commands": receipts.len(),
                    "rejected": rejected,
                })),
        );

        // Receipts first: a failed seal must not lose the receipts of an applied block.
        if let Some(db) = &self.receipts {
            db.record_block(block.number, &receipts)?;
        }
        self.persist()?;
        Ok(receipts)
    }

    /// Answer a query. `origin` is the verified sender, if any.
    pub fn query(
        &self,
        contract_id: ContractId,
        origin: Option<&AccountId>,
        payload: Value,
    ) -> Result<Value, QueryError> {
        let response = self.registry.query(contract_id, origin, payload)?;
        if let Some(error) = response.get("Err") {
            debug!(contract_id = %contract_id, error = %error, "Query denied");
            self.audit(
                AuditEvent::new(AuditEventType::QueryDenied)
                    .with_actor(
                        origin
                            .map(AccountId::to_hex)
                            .unwrap_or_else(|| "anonymous".to_string()),
                    )
                    .with_contract(contract_id.0)
                    .failed(error.to_string()),
            );
        }
        Ok(response)
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            block_number: self.block_number,
            contracts: self.registry.snapshot_all(),
            egress: self.egress.clone(),
            sealed_at: Utc::now(),
        }
    }

    /// Write the sealed snapshot. No-op without storage.
    pub fn persist(&self) -> Result<(), RuntimeError> {
        if let Some(storage) = &self.storage {
            storage.write_json(storage.paths().snapshot(), &self.snapshot())?;
        }
        Ok(())
    }

    /// Resume from the sealed snapshot, if one exists.
    ///
    /// Returns whether a snapshot was loaded.
    pub fn restore(&mut self) -> Result<bool, RuntimeError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(false);
        };
        let path = storage.paths().snapshot();
        if !storage.exists(&path) {
            return Ok(false);
        }

        let snapshot: RuntimeSnapshot = storage.read_json(&path)?;
        self.registry.restore_all(snapshot.contracts)?;
        self.block_number = snapshot.block_number;
        self.egress = snapshot.egress;

        info!(
            block_number = self.block_number,
            egress_sequence = self.egress.last_sequence(),
            sealed_at = %snapshot.sealed_at,
            "Runtime restored from snapshot"
        );
        self.audit(
            AuditEvent::new(AuditEventType::SnapshotRestored).with_block(self.block_number),
        );
        Ok(true)
    }

    pub fn info(&self) -> RuntimeInfo {
        RuntimeInfo {
            block_number: self.block_number,
            worker_public_key: self.identity.public_key_hex(),
            worker_account: self.identity.account_id().to_hex(),
            root_account: self.root.to_hex(),
            contracts: self
                .registry
                .list()
                .into_iter()
                .map(|(id, name)| ContractInfo {
                    id: id.0,
                    name: name.to_string(),
                })
                .collect(),
            pending_side_tasks: self.side_tasks.len(),
            egress_sequence: self.egress.last_sequence(),
        }
    }

    pub fn egress_since(&self, sequence: u64) -> Vec<EgressMessage> {
        self.egress.since(sequence)
    }

    pub fn egress_sequence(&self) -> u64 {
        self.egress.last_sequence()
    }

    /// Abort pending side tasks.
    pub fn shutdown(&mut self) {
        if !self.side_tasks.is_empty() {
            info!(count = self.side_tasks.len(), "Aborting pending side tasks");
        }
        self.side_tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::notepad::DEFAULT_MAX_POST_BYTES;
    use crate::contracts::price_bot::PriceBotEndpoints;
    use crate::contracts::{default_registry, ContractSettings, NOTEPAD, PRICE_BOT};
    use crate::crypto::envelope::seal;
    use crate::storage::{AuditRepository, StoragePaths};
    use k256::elliptic_curve::rand_core::OsRng;
    use k256::SecretKey;
    use serde_json::json;
    use tempfile::TempDir;

    const ROOT: AccountId = AccountId::new([0xd4; 32]);
    const ALICE: AccountId = AccountId::new([0xa1; 32]);

    fn settings() -> ContractSettings {
        ContractSettings {
            root: ROOT,
            max_post_bytes: DEFAULT_MAX_POST_BYTES,
            price_bot: PriceBotEndpoints {
                price_feed_url: "http://127.0.0.1:1/price".to_string(),
                telegram_api_url: "http://127.0.0.1:1".to_string(),
            },
        }
    }

    struct Fixture {
        _temp: TempDir,
        storage: Arc<EncryptedStorage>,
        receipts: Arc<ReceiptDatabase>,
        identity: WorkerIdentity,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let mut storage = EncryptedStorage::new(StoragePaths::new(temp.path()));
            storage.initialize().unwrap();
            let receipts = ReceiptDatabase::open(&storage.paths().receipts_db()).unwrap();
            Self {
                _temp: temp,
                storage: Arc::new(storage),
                receipts: Arc::new(receipts),
                identity: WorkerIdentity::generate(),
            }
        }

        fn runtime(&self) -> Runtime {
            Runtime::new(
                self.identity.clone(),
                ROOT,
                default_registry(&settings(), reqwest::Client::new()),
            )
            .with_storage(self.storage.clone())
            .with_receipts(self.receipts.clone())
        }
    }

    fn create_post(id: &str, owner: AccountId) -> ChainMessage {
        let reader = SecretKey::random(&mut OsRng);
        ChainMessage {
            origin: MessageOrigin::AccountId(owner),
            destination: NOTEPAD,
            payload: json!({
                "CreatePost": {
                    "id": id,
                    "owner": owner,
                    "content": seal(b"hello", &[reader.public_key()]).unwrap(),
                }
            }),
        }
    }

    fn block(number: u64, messages: Vec<ChainMessage>) -> Block {
        Block {
            number,
            timestamp_ms: 1_700_000_000_000 + number * 6_000,
            messages,
        }
    }

    #[tokio::test]
    async fn blocks_must_arrive_in_order() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();

        let err = runtime.dispatch_block(block(2, vec![])).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::OutOfOrder {
                expected: 1,
                got: 2
            }
        ));
        runtime.dispatch_block(block(1, vec![])).unwrap();
        assert!(matches!(
            runtime.dispatch_block(block(1, vec![])),
            Err(RuntimeError::OutOfOrder {
                expected: 2,
                got: 1
            })
        ));
        assert_eq!(runtime.block_number(), 1);
    }

    #[tokio::test]
    async fn rejected_commands_do_not_abort_the_block() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();

        let receipts = runtime
            .dispatch_block(block(
                1,
                vec![
                    ChainMessage {
                        origin: MessageOrigin::Gatekeeper,
                        destination: NOTEPAD,
                        payload: json!({ "DeletePost": { "id": "x" } }),
                    },
                    ChainMessage {
                        origin: MessageOrigin::AccountId(ALICE),
                        destination: ContractId(99),
                        payload: json!({}),
                    },
                    create_post("doc", ALICE),
                ],
            ))
            .unwrap();

        let codes: Vec<_> = receipts.iter().map(|r| r.error_code.as_deref()).collect();
        assert_eq!(codes, vec![Some("bad_origin"), Some("unknown_contract"), None]);
        assert_eq!(fixture.receipts.receipts_for_block(1).unwrap(), receipts);
        assert_eq!(fixture.receipts.latest_block().unwrap(), Some(1));

        let response = runtime
            .query(NOTEPAD, Some(&ALICE), json!({ "QueryPost": { "id": "doc" } }))
            .unwrap();
        assert_eq!(response["Ok"]["Post"]["owner"], json!(ALICE.to_hex()));
        assert_eq!(response["Ok"]["Post"]["created_on"], json!(1_700_000_006u64));
    }

    #[tokio::test]
    async fn receipts_survive_a_failed_seal() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();
        let runtime_dir = fixture.storage.paths().runtime_dir();
        std::fs::remove_dir_all(&runtime_dir).unwrap();
        std::fs::write(&runtime_dir, b"not a directory").unwrap();

        let err = runtime
            .dispatch_block(block(
                1,
                vec![ChainMessage {
                    origin: MessageOrigin::Gatekeeper,
                    destination: NOTEPAD,
                    payload: json!({ "DeletePost": { "id": "x" } }),
                }],
            ))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Storage(_)));
        assert_eq!(runtime.block_number(), 1);

        let stored = fixture.receipts.receipts_for_block(1).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].error_code.as_deref(), Some("bad_origin"));
        assert_eq!(fixture.receipts.latest_block().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn denied_queries_are_audited() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();
        runtime
            .dispatch_block(block(1, vec![create_post("doc", ALICE)]))
            .unwrap();

        let response = runtime
            .query(NOTEPAD, None, json!({ "QueryPost": { "id": "doc" } }))
            .unwrap();
        assert_eq!(response, json!({ "Err": "OriginUnavailable" }));

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&fixture.storage)
            .read_events(&today)
            .unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == AuditEventType::QueryDenied));
        assert!(events
            .iter()
            .any(|e| e.event_type == AuditEventType::BlockDispatched));
    }

    #[tokio::test]
    async fn unknown_contract_query_fails() {
        let fixture = Fixture::new();
        let runtime = fixture.runtime();
        assert!(matches!(
            runtime.query(ContractId(42), None, json!("ListPosts")),
            Err(QueryError::UnknownContract(ContractId(42)))
        ));
    }

    #[tokio::test]
    async fn restore_resumes_from_sealed_snapshot() {
        let fixture = Fixture::new();
        {
            let mut runtime = fixture.runtime();
            runtime
                .dispatch_block(block(1, vec![create_post("doc", ALICE)]))
                .unwrap();
            runtime.dispatch_block(block(2, vec![])).unwrap();
        }

        let mut restored = fixture.runtime();
        assert!(restored.restore().unwrap());
        assert_eq!(restored.block_number(), 2);
        let response = restored
            .query(NOTEPAD, Some(&ALICE), json!("ListPosts"))
            .unwrap();
        assert_eq!(response["Ok"]["Posts"][0]["id"], "doc");
        restored.dispatch_block(block(3, vec![])).unwrap();
    }

    #[tokio::test]
    async fn restore_without_snapshot_starts_at_genesis() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();
        assert!(!runtime.restore().unwrap());
        assert_eq!(runtime.block_number(), 0);

        let mut memory_only = Runtime::new(
            WorkerIdentity::generate(),
            ROOT,
            default_registry(&settings(), reqwest::Client::new()),
        );
        assert!(!memory_only.restore().unwrap());
    }

    #[tokio::test]
    async fn side_task_reports_through_egress() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();
        runtime
            .dispatch_block(block(
                1,
                vec![ChainMessage {
                    origin: MessageOrigin::AccountId(ROOT),
                    destination: PRICE_BOT,
                    payload: json!("ReportPrice"),
                }],
            ))
            .unwrap();
        assert_eq!(runtime.info().pending_side_tasks, 1);

        runtime.dispatch_block(block(2, vec![])).unwrap();
        assert!(runtime.egress_since(0).is_empty());
        runtime.dispatch_block(block(3, vec![])).unwrap();

        let messages = runtime.egress_since(0);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, PRICE_BOT);
        assert_eq!(messages[0].block_number, 3);
        assert_eq!(messages[0].payload["kind"], "price_report");
        assert_eq!(runtime.info().pending_side_tasks, 0);

        // egress sequence survives a restart
        let mut restored = fixture.runtime();
        restored.restore().unwrap();
        assert_eq!(restored.info().egress_sequence, 1);
    }

    #[tokio::test]
    async fn info_describes_worker() {
        let fixture = Fixture::new();
        let mut runtime = fixture.runtime();
        let info = runtime.info();
        assert_eq!(info.block_number, 0);
        assert_eq!(info.root_account, ROOT.to_hex());
        assert_eq!(info.worker_public_key, fixture.identity.public_key_hex());
        let names: Vec<_> = info.contracts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["notepad", "price_bot"]);
        runtime.shutdown();
    }
}
