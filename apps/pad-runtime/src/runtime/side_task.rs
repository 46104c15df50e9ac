// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! # Side Tasks
//!
//! Contracts sometimes need to talk to the outside world (HTTP APIs, bots).
//! Such work is non-deterministic, so it runs as a side task:
//!
//! 1. A command handler spawns the task at the current block `n` with a
//!    duration `d`. The future starts immediately on the tokio runtime.
//! 2. When block `n + d` is dispatched, the task is finalized whether or not
//!    the future completed. An unfinished future is aborted and the
//!    finalizer receives `None`.
//!
//! Every worker therefore applies the finalizer at the same block, which
//! keeps contract state consistent across replicas. Finalizers must not
//! depend on the result for state changes that have to be replicated; they
//! typically report it through the egress queue.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::egress::EgressQueue;
use crate::contracts::ContractId;

/// Context handed to side task finalizers.
pub struct FinalizeContext<'a> {
    pub block_number: u64,
    pub contract_id: ContractId,
    pub egress: &'a mut EgressQueue,
}

impl FinalizeContext<'_> {
    /// Queue an outbound message on behalf of the owning contract.
    pub fn emit(&mut self, payload: serde_json::Value) -> u64 {
        self.egress
            .push(self.block_number, self.contract_id, payload)
    }
}

/// A block-bounded unit of asynchronous work.
pub trait SideTask: Send + Sync {
    /// Block at which the task is finalized.
    fn deadline(&self) -> u64;

    /// Consume the task. Returns whether the future had completed.
    fn finish(self: Box<Self>, context: &mut FinalizeContext<'_>) -> bool;

    /// Stop the underlying future without finalizing.
    fn abort(&self);
}

type Finalizer<T> = Box<dyn FnOnce(Option<T>, &mut FinalizeContext<'_>) + Send + Sync>;

/// Side task backed by a tokio task.
pub struct AsyncSideTask<T> {
    deadline: u64,
    result: oneshot::Receiver<T>,
    handle: JoinHandle<()>,
    finalizer: Finalizer<T>,
}

impl<T: Send + 'static> AsyncSideTask<T> {
    /// Start `future` now; finalize at block `block_number + duration`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, P>(block_number: u64, duration: u64, future: F, finalizer: P) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        P: FnOnce(Option<T>, &mut FinalizeContext<'_>) + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let output = future.await;
            let _ = tx.send(output);
        });

        Self {
            deadline: block_number.saturating_add(duration),
            result: rx,
            handle,
            finalizer: Box::new(finalizer),
        }
    }
}

impl<T: Send + 'static> SideTask for AsyncSideTask<T> {
    fn deadline(&self) -> u64 {
        self.deadline
    }

    fn finish(self: Box<Self>, context: &mut FinalizeContext<'_>) -> bool {
        let mut this = *self;
        let output = match this.result.try_recv() {
            Ok(output) => Some(output),
            Err(_) => {
                this.handle.abort();
                None
            }
        };
        let completed = output.is_some();
        (this.finalizer)(output, context);
        completed
    }

    fn abort(&self) {
        self.handle.abort();
    }
}

struct Entry {
    contract_id: ContractId,
    task: Box<dyn SideTask>,
}

/// Summary of a finalized side task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideTaskOutcome {
    pub contract_id: ContractId,
    pub deadline: u64,
    pub completed: bool,
}

/// Tracks pending side tasks and finalizes them as blocks arrive.
#[derive(Default)]
pub struct SideTaskManager {
    tasks: Vec<Entry>,
}

impl SideTaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, contract_id: ContractId, task: impl SideTask + 'static) {
        debug!(
            contract_id = %contract_id,
            deadline = task.deadline(),
            "Side task registered"
        );
        self.tasks.push(Entry {
            contract_id,
            task: Box::new(task),
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Finalize every task due at or before `block_number`, in insertion order.
    pub fn poll(&mut self, block_number: u64, egress: &mut EgressQueue) -> Vec<SideTaskOutcome> {
        let (due, pending): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|entry| entry.task.deadline() <= block_number);
        self.tasks = pending;

        let mut outcomes = Vec::with_capacity(due.len());
        for entry in due {
            let deadline = entry.task.deadline();
            let mut context = FinalizeContext {
                block_number,
                contract_id: entry.contract_id,
                egress: &mut *egress,
            };
            let completed = entry.task.finish(&mut context);
            info!(
                contract_id = %entry.contract_id,
                deadline,
                completed,
                "Side task finalized"
            );
            outcomes.push(SideTaskOutcome {
                contract_id: entry.contract_id,
                deadline,
                completed,
            });
        }
        outcomes
    }

    /// Abort and drop every pending task (shutdown).
    pub fn abort_all(&mut self) {
        for entry in self.tasks.drain(..) {
            entry.task.abort();
        }
    }
}
