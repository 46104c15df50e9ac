// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Cipherpad Runtime - Confidential Contract Worker
//!
//! This crate runs the Cipherpad contracts inside an Intel SGX enclave
//! (Gramine). Commands reach the contracts through chain blocks forwarded
//! by a relayer; wallets query the worker directly with signed requests.
//! Documents are encrypted on the client and stay opaque to the worker.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Operator JWTs and wallet-signed queries
//! - `contracts` - Contract framework and the hosted contracts
//! - `crypto` - Worker identity and the content envelope
//! - `runtime` - Block dispatch, side tasks and the egress queue
//! - `storage` - Encrypted storage (Gramine sealed FS), receipts and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod contracts;
pub mod crypto;
pub mod error;
pub mod runtime;
pub mod state;
pub mod storage;
pub mod tls;
