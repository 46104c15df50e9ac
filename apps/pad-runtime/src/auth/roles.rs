// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Operator roles for authorization.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Operator roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access to all operator endpoints
/// - `Relayer` - Block sync, receipts and egress
/// - `Auditor` - Read-only access to audit logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Relayer,
    Auditor,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        matches!(
            (self, required),
            (Role::Admin, _) | (Role::Relayer, Role::Relayer) | (Role::Auditor, Role::Auditor)
        )
    }
}

impl FromStr for Role {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "relayer" => Ok(Role::Relayer),
            "auditor" => Ok(Role::Auditor),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Relayer => write!(f, "relayer"),
            Role::Auditor => write!(f, "auditor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::Relayer));
        assert!(Role::Admin.has_privilege(Role::Auditor));
    }

    #[test]
    fn relayer_and_auditor_are_disjoint() {
        assert!(Role::Relayer.has_privilege(Role::Relayer));
        assert!(!Role::Relayer.has_privilege(Role::Auditor));
        assert!(!Role::Relayer.has_privilege(Role::Admin));
        assert!(Role::Auditor.has_privilege(Role::Auditor));
        assert!(!Role::Auditor.has_privilege(Role::Relayer));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("Relayer".parse::<Role>(), Ok(Role::Relayer));
        assert!("client".parse::<Role>().is_err());
    }

    #[test]
    fn default_role_is_relayer() {
        assert_eq!(Role::default(), Role::Relayer);
        assert_eq!(Role::default().to_string(), "relayer");
    }
}
