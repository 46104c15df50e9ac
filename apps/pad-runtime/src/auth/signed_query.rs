// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Wallet-signed contract queries.
//!
//! A query may carry a secp256k1 signature over
//! `"{contract_id}:{timestamp}:{payload}"`. A valid, fresh signature makes
//! the signer's account the query origin. Queries without any signature
//! fields are anonymous.

use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extractor::CLOCK_SKEW_LEEWAY;
use super::AuthError;
use crate::contracts::{AccountId, ContractId};
use crate::crypto::keys::{
    account_id_from_public_key, parse_public_key, public_key_hex, sign_message, verify_signature,
};

/// Body of `POST /v1/contracts/{contract_id}/query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SignedQuery {
    /// JSON-encoded contract request, exactly as signed.
    pub payload: String,
    /// Unix seconds at signing time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// SEC1 public key of the signer (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// 64-byte ECDSA signature (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// The exact bytes a client signs.
pub fn signing_message(contract_id: ContractId, timestamp: i64, payload: &str) -> String {
    format!("{contract_id}:{timestamp}:{payload}")
}

impl SignedQuery {
    pub fn unsigned(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            timestamp: None,
            public_key: None,
            signature: None,
        }
    }

    /// Sign `payload` for `contract_id` with a wallet key.
    pub fn sign(
        key: &SigningKey,
        contract_id: ContractId,
        timestamp: i64,
        payload: impl Into<String>,
    ) -> Self {
        let payload = payload.into();
        let signature = sign_message(
            key,
            signing_message(contract_id, timestamp, &payload).as_bytes(),
        );
        Self {
            payload,
            timestamp: Some(timestamp),
            public_key: Some(public_key_hex(key.verifying_key())),
            signature: Some(signature),
        }
    }

    /// Verify the signature and return the origin account.
    ///
    /// `Ok(None)` for anonymous queries.
    pub fn verify(&self, contract_id: ContractId, now: i64) -> Result<Option<AccountId>, AuthError> {
        let (timestamp, public_key, signature) =
            match (&self.timestamp, &self.public_key, &self.signature) {
                (None, None, None) => return Ok(None),
                (Some(ts), Some(pk), Some(sig)) => (*ts, pk, sig),
                (None, _, _) => return Err(AuthError::IncompleteSignedQuery("timestamp")),
                (_, None, _) => return Err(AuthError::IncompleteSignedQuery("public_key")),
                (_, _, None) => return Err(AuthError::IncompleteSignedQuery("signature")),
            };

        if timestamp.abs_diff(now) > CLOCK_SKEW_LEEWAY {
            return Err(AuthError::StaleTimestamp);
        }

        let key = parse_public_key(public_key).map_err(|_| AuthError::InvalidPublicKey)?;
        let message = signing_message(contract_id, timestamp, &self.payload);
        verify_signature(&key, message.as_bytes(), signature)
            .map_err(|_| AuthError::InvalidQuerySignature)?;

        Ok(Some(account_id_from_public_key(&key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::rand_core::OsRng;

    const NOW: i64 = 1_760_000_000;

    #[test]
    fn valid_signature_yields_account() {
        let key = SigningKey::random(&mut OsRng);
        let query = SignedQuery::sign(&key, ContractId(1), NOW, r#""ListPosts""#);

        let origin = query.verify(ContractId(1), NOW + 5).unwrap();
        assert_eq!(origin, Some(account_id_from_public_key(key.verifying_key())));
    }

    #[test]
    fn unsigned_query_has_no_origin() {
        assert_eq!(
            SignedQuery::unsigned("\"ListPosts\"")
                .verify(ContractId(1), NOW)
                .unwrap(),
            None
        );
    }

    #[test]
    fn signature_is_bound_to_contract_and_payload() {
        let key = SigningKey::random(&mut OsRng);
        let query = SignedQuery::sign(&key, ContractId(1), NOW, r#""ListPosts""#);

        assert!(matches!(
            query.verify(ContractId(2), NOW),
            Err(AuthError::InvalidQuerySignature)
        ));

        let mut tampered = query;
        tampered.payload = r#"{"QueryPost":{"id":"x"}}"#.to_string();
        assert!(matches!(
            tampered.verify(ContractId(1), NOW),
            Err(AuthError::InvalidQuerySignature)
        ));
    }

    #[test]
    fn stale_timestamps_are_rejected() {
        let key = SigningKey::random(&mut OsRng);
        let query = SignedQuery::sign(&key, ContractId(1), NOW, "\"ListPosts\"");
        assert!(query.verify(ContractId(1), NOW + 60).is_ok());
        assert!(matches!(
            query.verify(ContractId(1), NOW + 61),
            Err(AuthError::StaleTimestamp)
        ));
        assert!(matches!(
            query.verify(ContractId(1), NOW - 61),
            Err(AuthError::StaleTimestamp)
        ));
    }

    #[test]
    fn partial_signature_fields_are_rejected() {
        let key = SigningKey::random(&mut OsRng);
        let mut query = SignedQuery::sign(&key, ContractId(1), NOW, "\"ListPosts\"");
        query.signature = None;
        assert!(matches!(
            query.verify(ContractId(1), NOW),
            Err(AuthError::IncompleteSignedQuery("signature"))
        ));

        let mut bad_key = SignedQuery::sign(&key, ContractId(1), NOW, "\"ListPosts\"");
        bad_key.public_key = Some("02abcd".to_string());
        assert!(matches!(
            bad_key.verify(ContractId(1), NOW),
            Err(AuthError::InvalidPublicKey)
        ));
    }
}
