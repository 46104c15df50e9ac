// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Operator JWT claims.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by operator tokens (HS256).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClaims {
    /// Operator identifier.
    pub sub: String,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// `admin`, `relayer` or `auditor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Authenticated operator extracted from a verified token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedOperator {
    pub subject: String,
    pub role: Role,
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedOperator {
    /// Unknown or missing roles fall back to the default role.
    pub fn from_claims(claims: OperatorClaims) -> Self {
        let role = claims
            .role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default();

        Self {
            subject: claims.sub,
            role,
            expires_at: claims.exp,
        }
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }
}
