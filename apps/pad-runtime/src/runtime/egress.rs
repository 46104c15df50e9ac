// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Outbound message queue.
//!
//! Contracts and side task finalizers emit messages here; the relayer pulls
//! them with `GET /v1/egress?since=N` and submits them on chain. Sequence
//! numbers start at 1 and never repeat, including across restarts (the queue
//! is part of the sealed snapshot).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::contracts::ContractId;

/// Number of messages retained for the relayer to fetch.
pub const MAX_RETAINED_MESSAGES: usize = 4096;

/// A message leaving the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EgressMessage {
    pub sequence: u64,
    pub block_number: u64,
    #[schema(value_type = u32)]
    pub from: ContractId,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EgressQueue {
    last_sequence: u64,
    messages: VecDeque<EgressMessage>,
}

impl EgressQueue {
    /// Append a message and return its sequence number.
    pub fn push(&mut self, block_number: u64, from: ContractId, payload: serde_json::Value) -> u64 {
        self.last_sequence += 1;
        self.messages.push_back(EgressMessage {
            sequence: self.last_sequence,
            block_number,
            from,
            payload,
        });
        while self.messages.len() > MAX_RETAINED_MESSAGES {
            self.messages.pop_front();
        }
        self.last_sequence
    }

    /// Messages with a sequence number strictly greater than `sequence`.
    pub fn since(&self, sequence: u64) -> Vec<EgressMessage> {
        self.messages
            .iter()
            .filter(|m| m.sequence > sequence)
            .cloned()
            .collect()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_monotonic_and_filterable() {
        let mut queue = EgressQueue::default();
        assert_eq!(queue.push(1, ContractId(1), serde_json::json!("a")), 1);
        assert_eq!(queue.push(1, ContractId(2), serde_json::json!("b")), 2);
        assert_eq!(queue.push(2, ContractId(1), serde_json::json!("c")), 3);

        let after_first: Vec<u64> = queue.since(1).iter().map(|m| m.sequence).collect();
        assert_eq!(after_first, vec![2, 3]);
        assert!(queue.since(3).is_empty());
        assert_eq!(queue.last_sequence(), 3);
    }

    #[test]
    fn retention_drops_oldest_but_keeps_sequence() {
        let mut queue = EgressQueue::default();
        for i in 0..(MAX_RETAINED_MESSAGES + 10) {
            queue.push(i as u64, ContractId(1), serde_json::Value::Null);
        }
        assert_eq!(queue.len(), MAX_RETAINED_MESSAGES);
        assert_eq!(queue.last_sequence(), (MAX_RETAINED_MESSAGES + 10) as u64);
        assert_eq!(queue.since(0)[0].sequence, 11);
    }

    #[test]
    fn queue_survives_json_snapshot() {
        let mut queue = EgressQueue::default();
        queue.push(4, ContractId(2), serde_json::json!({ "kind": "x" }));
        let json = serde_json::to_value(&queue).unwrap();
        let restored: EgressQueue = serde_json::from_value(json).unwrap();
        assert_eq!(restored, queue);
    }
}
