// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Worker keys, wallet signatures and document envelopes.

pub mod envelope;
pub mod keys;

pub use envelope::{ContentEnvelope, EnvelopeError, WrappedKey};
pub use keys::{
    account_id_from_public_key, parse_public_key, sign_message, verify_signature, KeyError,
    WorkerIdentity,
};
