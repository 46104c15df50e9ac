// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::runtime::Runtime;
use crate::storage::{EncryptedStorage, ReceiptDatabase};

/// Operator token verification settings.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret. `None` enables development mode (no signature check).
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim.
    pub issuer: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RwLock<Runtime>>,
    pub storage: Arc<EncryptedStorage>,
    pub receipts: Arc<ReceiptDatabase>,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(
        runtime: Runtime,
        storage: Arc<EncryptedStorage>,
        receipts: Arc<ReceiptDatabase>,
    ) -> Self {
        Self {
            runtime: Arc::new(RwLock::new(runtime)),
            storage,
            receipts,
            auth_config: AuthConfig::default(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }
}
