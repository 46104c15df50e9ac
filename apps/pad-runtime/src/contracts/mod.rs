// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! # Confidential Contracts
//!
//! Contracts handle two kinds of requests: **commands** and **queries**.
//!
//! - Commands are posted on chain first and then delivered to every worker
//!   in block order. They may change contract state and produce no response.
//!   Replaying the same blocks must always reach the same state, so command
//!   handlers only use block-derived time and never local randomness.
//! - Queries are sent straight to a worker over its HTTP API, are answered
//!   in real time and never change state.
//!
//! Payloads are JSON on both paths. [`ContractRegistry`] erases the
//! contract-specific types so the runtime can route by [`ContractId`].

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::runtime::egress::EgressQueue;
use crate::runtime::side_task::{SideTask, SideTaskManager};

pub mod notepad;
pub mod price_bot;
pub mod types;

pub use types::{
    account_id_from_hex, AccountId, AccountIdError, BlockInfo, ContractId, MessageOrigin,
    TransactionError, TransactionResult,
};

/// Id of the confidential document contract.
pub const NOTEPAD: ContractId = ContractId(1);
/// Id of the price reporting contract.
pub const PRICE_BOT: ContractId = ContractId(2);

/// Settings shared by the built-in contracts.
#[derive(Debug, Clone)]
pub struct ContractSettings {
    /// Account with administrative rights in every contract.
    pub root: AccountId,
    pub max_post_bytes: usize,
    pub price_bot: price_bot::PriceBotEndpoints,
}

/// Registry with the notepad and price bot contracts.
pub fn default_registry(settings: &ContractSettings, client: reqwest::Client) -> ContractRegistry {
    let mut registry = ContractRegistry::new();
    registry.register(notepad::Notepad::new(settings.root, settings.max_post_bytes));
    registry.register(price_bot::PriceBot::new(
        settings.root,
        settings.price_bot.clone(),
        client,
    ));
    registry
}

/// Execution context handed to command handlers.
pub struct NativeContext<'a> {
    pub block: BlockInfo,
    pub contract_id: ContractId,
    pub side_tasks: &'a mut SideTaskManager,
    pub egress: &'a mut EgressQueue,
}

impl NativeContext<'_> {
    /// Queue an outbound message from this contract.
    pub fn emit(&mut self, payload: Value) -> u64 {
        self.egress
            .push(self.block.block_number, self.contract_id, payload)
    }

    /// Register a side task owned by this contract.
    pub fn spawn_side_task(&mut self, task: impl SideTask + 'static) {
        self.side_tasks.add_task(self.contract_id, task);
    }
}

/// A contract implemented natively in the runtime.
pub trait NativeContract: Send + Sync + 'static {
    type Cmd: DeserializeOwned + Debug;
    type QReq: DeserializeOwned + Debug;
    type QResp: Serialize;

    /// Id which uniquely identifies the contract.
    fn id(&self) -> ContractId;

    fn name(&self) -> &'static str;

    /// Handle a command delivered through the chain.
    fn handle_command(
        &mut self,
        context: &mut NativeContext<'_>,
        origin: MessageOrigin,
        cmd: Self::Cmd,
    ) -> TransactionResult;

    /// Answer a direct query. `origin` is `None` for unsigned queries.
    fn handle_query(&self, origin: Option<&AccountId>, req: Self::QReq) -> Self::QResp;

    /// Serialize the contract state for sealing.
    fn snapshot(&self) -> Value;

    /// Replace the contract state with a previously sealed snapshot.
    fn restore(&mut self, state: Value) -> Result<(), serde_json::Error>;
}

/// Errors raised while routing a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("no contract registered with id {0}")]
    UnknownContract(ContractId),
    #[error("malformed query payload: {0}")]
    BadPayload(String),
    #[error("failed to encode query response: {0}")]
    Encode(String),
}

/// Object-safe view of a contract, speaking JSON.
pub trait Contract: Send + Sync {
    fn id(&self) -> ContractId;
    fn name(&self) -> &'static str;
    fn dispatch_command(
        &mut self,
        context: &mut NativeContext<'_>,
        origin: MessageOrigin,
        payload: Value,
    ) -> TransactionResult;
    fn dispatch_query(
        &self,
        origin: Option<&AccountId>,
        payload: Value,
    ) -> Result<Value, QueryError>;
    fn snapshot(&self) -> Value;
    fn restore(&mut self, state: Value) -> Result<(), serde_json::Error>;
}

/// Adapter exposing a [`NativeContract`] as a [`Contract`].
pub struct NativeCompatContract<C>(C);

impl<C: NativeContract> NativeCompatContract<C> {
    pub fn new(contract: C) -> Self {
        Self(contract)
    }
}

impl<C: NativeContract> Contract for NativeCompatContract<C> {
    fn id(&self) -> ContractId {
        self.0.id()
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn dispatch_command(
        &mut self,
        context: &mut NativeContext<'_>,
        origin: MessageOrigin,
        payload: Value,
    ) -> TransactionResult {
        let cmd: C::Cmd = serde_json::from_value(payload)
            .map_err(|e| TransactionError::BadInput(e.to_string()))?;
        self.0.handle_command(context, origin, cmd)
    }

    fn dispatch_query(
        &self,
        origin: Option<&AccountId>,
        payload: Value,
    ) -> Result<Value, QueryError> {
        let req: C::QReq =
            serde_json::from_value(payload).map_err(|e| QueryError::BadPayload(e.to_string()))?;
        let resp = self.0.handle_query(origin, req);
        serde_json::to_value(resp).map_err(|e| QueryError::Encode(e.to_string()))
    }

    fn snapshot(&self) -> Value {
        self.0.snapshot()
    }

    fn restore(&mut self, state: Value) -> Result<(), serde_json::Error> {
        self.0.restore(state)
    }
}

/// Registry of the contracts hosted by this worker.
#[derive(Default)]
pub struct ContractRegistry {
    contracts: BTreeMap<ContractId, Box<dyn Contract>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native contract, replacing any contract with the same id.
    pub fn register<C: NativeContract>(&mut self, contract: C) {
        let id = contract.id();
        self.contracts
            .insert(id, Box::new(NativeCompatContract::new(contract)));
    }

    pub fn get(&self, id: ContractId) -> Option<&dyn Contract> {
        self.contracts.get(&id).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, id: ContractId) -> Option<&mut (dyn Contract + 'static)> {
        self.contracts.get_mut(&id).map(|c| c.as_mut())
    }

    /// `(id, name)` of every registered contract, ordered by id.
    pub fn list(&self) -> Vec<(ContractId, &'static str)> {
        self.contracts
            .values()
            .map(|c| (c.id(), c.name()))
            .collect()
    }

    pub fn query(
        &self,
        id: ContractId,
        origin: Option<&AccountId>,
        payload: Value,
    ) -> Result<Value, QueryError> {
        self.get(id)
            .ok_or(QueryError::UnknownContract(id))?
            .dispatch_query(origin, payload)
    }

    pub fn snapshot_all(&self) -> BTreeMap<ContractId, Value> {
        self.contracts
            .iter()
            .map(|(id, c)| (*id, c.snapshot()))
            .collect()
    }

    /// Restore sealed states. Snapshots for unknown contracts are skipped.
    pub fn restore_all(
        &mut self,
        states: BTreeMap<ContractId, Value>,
    ) -> Result<(), serde_json::Error> {
        for (id, state) in states {
            match self.contracts.get_mut(&id) {
                Some(contract) => contract.restore(state)?,
                None => tracing::warn!(contract_id = %id, "Skipping snapshot of unknown contract"),
            }
        }
        Ok(())
    }
}
