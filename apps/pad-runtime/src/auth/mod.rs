// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! # Authentication Module
//!
//! Two independent mechanisms:
//!
//! - **Operators** (relayer, auditor, admin) send
//!   `Authorization: Bearer <JWT>` on the `/v1/sync`, `/v1/egress` and
//!   `/v1/audit` endpoints. Tokens are HS256 with a shared secret.
//! - **Wallets** sign contract queries with their secp256k1 key. The
//!   derived account is the query origin seen by contracts.
//!
//! Clock skew tolerance is 60 seconds for both.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod roles;
pub mod signed_query;

pub use claims::AuthenticatedOperator;
pub use error::AuthError;
pub use extractor::{Operator, RequireAuditor, RequireRelayer};
pub use roles::Role;
pub use signed_query::SignedQuery;
