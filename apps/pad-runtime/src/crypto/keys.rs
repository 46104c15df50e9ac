// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! secp256k1 keys: worker identity, account derivation and signatures.
//!
//! The worker key is generated inside the enclave on first start and kept in
//! sealed storage as PKCS#8 PEM. It never leaves the enclave; only the
//! compressed public key is published through `/v1/info`.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::OsRng;
use k256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use k256::SecretKey;
use sha2::{Digest, Sha256};

use crate::contracts::AccountId;
use crate::storage::{EncryptedStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("key storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Derive the account id of a SEC1-encoded public key.
///
/// The key is normalised to its compressed form first, so compressed and
/// uncompressed encodings map to the same account.
pub fn account_id_from_public_key(key: &VerifyingKey) -> AccountId {
    let compressed = key.to_encoded_point(true);
    let digest = Sha256::digest(compressed.as_bytes());
    AccountId::new(digest.into())
}

/// Parse a hex-encoded SEC1 public key (compressed or uncompressed).
pub fn parse_public_key(hex_key: &str) -> Result<VerifyingKey, KeyError> {
    let trimmed = hex_key.strip_prefix("0x").unwrap_or(hex_key);
    let bytes = hex::decode(trimmed).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
    VerifyingKey::from_sec1_bytes(&bytes).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}

/// Hex encoding of the compressed public key.
pub fn public_key_hex(key: &VerifyingKey) -> String {
    hex::encode(key.to_encoded_point(true).as_bytes())
}

/// Sign `message` (ECDSA over SHA-256); returns the 64-byte signature as hex.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> String {
    let signature: Signature = key.sign(message);
    hex::encode(signature.to_bytes())
}

/// Verify a hex-encoded signature produced by [`sign_message`].
pub fn verify_signature(
    key: &VerifyingKey,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), KeyError> {
    let trimmed = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = hex::decode(trimmed).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
    let signature =
        Signature::from_slice(&bytes).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
    key.verify(message, &signature)
        .map_err(|_| KeyError::VerificationFailed)
}

/// Parse a PEM private key (PKCS#8 or SEC1).
pub fn signing_key_from_pem(pem_bytes: &[u8]) -> Result<SigningKey, KeyError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| KeyError::InvalidPrivateKey(format!("Invalid UTF-8: {e}")))?;
    let pem = pem::parse(pem_str)
        .map_err(|e| KeyError::InvalidPrivateKey(format!("Invalid PEM: {e}")))?;

    let secret_key = SecretKey::from_pkcs8_der(pem.contents())
        .or_else(|_| SecretKey::from_sec1_der(pem.contents()))
        .map_err(|e| KeyError::InvalidPrivateKey(format!("Invalid key format: {e}")))?;
    Ok(SigningKey::from(secret_key))
}

/// The worker's long-lived enclave identity.
#[derive(Clone)]
pub struct WorkerIdentity {
    signing_key: SigningKey,
}

impl WorkerIdentity {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self {
            signing_key: signing_key_from_pem(pem_bytes)?,
        })
    }

    pub fn to_pem(&self) -> Result<String, KeyError> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| KeyError::InvalidPrivateKey(format!("Failed to encode key: {e}")))
    }

    /// Load the identity from sealed storage, generating it on first start.
    ///
    /// Returns the identity and whether it was newly created.
    pub fn load_or_create(storage: &EncryptedStorage) -> Result<(Self, bool), KeyError> {
        let path = storage.paths().worker_key();
        if storage.exists(&path) {
            let pem = storage.read_raw(&path)?;
            return Ok((Self::from_pem(&pem)?, false));
        }

        let identity = Self::generate();
        storage.write_raw(&path, identity.to_pem()?.as_bytes())?;
        tracing::info!(
            public_key = %identity.public_key_hex(),
            "Generated new worker identity"
        );
        Ok((identity, true))
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        public_key_hex(self.verifying_key())
    }

    pub fn account_id(&self) -> AccountId {
        account_id_from_public_key(self.verifying_key())
    }
}

impl std::fmt::Debug for WorkerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerIdentity")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
