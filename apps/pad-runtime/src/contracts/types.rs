// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Identity and message types shared by every contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Length of an account identifier in bytes.
pub const ACCOUNT_ID_LEN: usize = 32;

/// Error returned when an account identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountIdError {
    #[error("account id is not valid hex: {0}")]
    InvalidHex(String),
    #[error("account id must be {ACCOUNT_ID_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// On-chain account identifier.
///
/// Accounts are derived from secp256k1 wallet keys as
/// `sha256(compressed SEC1 public key)`. The text form is 64 lowercase hex
/// characters; parsing also accepts a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    pub const fn new(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| AccountIdError::InvalidHex(e.to_string()))?;
        let bytes: [u8; ACCOUNT_ID_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AccountIdError::InvalidLength(b.len()))?;
        Ok(Self(bytes))
    }
}

/// Parse an account id from its hex form.
pub fn account_id_from_hex(s: &str) -> Result<AccountId, AccountIdError> {
    s.parse()
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a contract hosted by the runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ContractId(pub u32);

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender of a message delivered through the chain.
///
/// The relayer forwards the origin recorded on chain; the runtime trusts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// A runtime module (pallet) on the chain.
    Pallet(String),
    /// Another contract.
    Contract(ContractId),
    /// A worker, identified by its public key (hex).
    Worker(String),
    /// An end-user account that signed the extrinsic.
    AccountId(AccountId),
    /// The gatekeeper (key management authority).
    Gatekeeper,
}

impl MessageOrigin {
    /// The sending account, if this origin is an account.
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            MessageOrigin::AccountId(account) => Some(account),
            _ => None,
        }
    }
}

impl fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageOrigin::Pallet(name) => write!(f, "pallet:{name}"),
            MessageOrigin::Contract(id) => write!(f, "contract:{id}"),
            MessageOrigin::Worker(pubkey) => write!(f, "worker:{pubkey}"),
            MessageOrigin::AccountId(account) => write!(f, "account:{account}"),
            MessageOrigin::Gatekeeper => f.write_str("gatekeeper"),
        }
    }
}

/// Reasons a command can be rejected.
///
/// A rejected command leaves contract state untouched and is recorded in the
/// block's receipts; it never aborts the block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("origin is not allowed to issue this command")]
    BadOrigin,
    #[error("invalid input: {0}")]
    BadInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("no contract registered with id {0}")]
    UnknownContract(ContractId),
}

impl TransactionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::BadOrigin => "bad_origin",
            TransactionError::BadInput(_) => "bad_input",
            TransactionError::NotFound(_) => "not_found",
            TransactionError::AlreadyExists(_) => "already_exists",
            TransactionError::PayloadTooLarge { .. } => "payload_too_large",
            TransactionError::UnknownContract(_) => "unknown_contract",
        }
    }
}

pub type TransactionResult = Result<(), TransactionError>;

/// The block a command is executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub block_number: u64,
    /// Block timestamp in milliseconds since the Unix epoch.
    pub now_ms: u64,
}

impl BlockInfo {
    pub fn now_secs(&self) -> u64 {
        self.now_ms / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    #[test]
    fn account_id_parses_with_and_without_prefix() {
        let plain = account_id_from_hex(ALICE).unwrap();
        let prefixed = account_id_from_hex(&format!("0x{ALICE}")).unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain.to_string(), ALICE);
    }

    #[test]
    fn account_id_rejects_bad_input() {
        assert!(matches!(
            account_id_from_hex("zz"),
            Err(AccountIdError::InvalidHex(_))
        ));
        assert_eq!(
            account_id_from_hex("abcd"),
            Err(AccountIdError::InvalidLength(2))
        );
    }

    #[test]
    fn account_id_serializes_as_hex_string() {
        let account = account_id_from_hex(ALICE).unwrap();
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, format!("\"{ALICE}\""));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn origin_json_shape() {
        let account = account_id_from_hex(ALICE).unwrap();
        let origin = MessageOrigin::AccountId(account);
        let json = serde_json::to_value(&origin).unwrap();
        assert_eq!(json, serde_json::json!({ "account_id": ALICE }));
        assert_eq!(origin.account(), Some(&account));

        let gatekeeper: MessageOrigin = serde_json::from_str("\"gatekeeper\"").unwrap();
        assert_eq!(gatekeeper, MessageOrigin::Gatekeeper);
        assert!(gatekeeper.account().is_none());
    }

    #[test]
    fn transaction_error_codes_are_stable() {
        assert_eq!(TransactionError::BadOrigin.code(), "bad_origin");
        assert_eq!(
            TransactionError::PayloadTooLarge { size: 2, limit: 1 }.code(),
            "payload_too_large"
        );
        assert_eq!(
            TransactionError::UnknownContract(ContractId(9)).to_string(),
            "no contract registered with id 9"
        );
    }
}
