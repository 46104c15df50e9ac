// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Wallet-bound document envelopes.
//!
//! Editors encrypt documents before they ever reach the chain:
//!
//! 1. A random AES-256-GCM content key encrypts the document once.
//! 2. For every recipient wallet, an ephemeral secp256k1 key performs ECDH
//!    with the recipient's public key. HKDF-SHA256 turns the shared secret
//!    into a wrapping key, which encrypts the content key. The recipient's
//!    account id is bound as associated data.
//!
//! The runtime never holds recipient secrets; it only checks that stored
//! envelopes are well formed ([`ContentEnvelope::validate`]). [`seal`] and
//! [`open`] are the reference client implementation.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64ct::{Base64, Encoding};
use hkdf::Hkdf;
use k256::ecdh::{diffie_hellman, EphemeralSecret};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::contracts::AccountId;

pub const ENVELOPE_VERSION: u8 = 1;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
const COMPRESSED_POINT_LEN: usize = 33;
const HKDF_SALT: &[u8] = b"cipherpad/envelope/v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed envelope field `{field}`: {reason}")]
    Malformed { field: &'static str, reason: String },
    #[error("envelope has no recipients")]
    NoRecipients,
    #[error("account is not a recipient of this envelope")]
    NotARecipient,
    #[error("decryption failed")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
}

/// Content key wrapped for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WrappedKey {
    #[schema(value_type = String)]
    pub account: AccountId,
    /// Compressed ephemeral public key, hex.
    pub ephemeral_public_key: String,
    /// Base64 nonce used to wrap the key.
    pub nonce: String,
    /// Base64 AES-GCM ciphertext of the content key.
    pub wrapped_key: String,
}

/// An encrypted document as stored by the notepad contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContentEnvelope {
    pub version: u8,
    /// Base64 content nonce.
    pub nonce: String,
    /// Base64 AES-GCM ciphertext (includes the tag).
    pub ciphertext: String,
    pub recipients: Vec<WrappedKey>,
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    Base64::decode_vec(value).map_err(|e| EnvelopeError::Malformed {
        field,
        reason: e.to_string(),
    })
}

fn account_of(public_key: &PublicKey) -> AccountId {
    let digest = Sha256::digest(public_key.to_encoded_point(true).as_bytes());
    AccountId::new(digest.into())
}

/// HKDF-SHA256 over the ECDH secret.
fn derive_wrapping_key(shared_secret: &[u8], info: &[u8]) -> Result<Key<Aes256Gcm>, EnvelopeError> {
    let mut okm = Key::<Aes256Gcm>::default();
    Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret)
        .expand(info, &mut okm)
        .map_err(|_| EnvelopeError::Encrypt)?;
    Ok(okm)
}

fn kdf_info(ephemeral: &PublicKey, recipient: &PublicKey) -> Vec<u8> {
    let mut info = Vec::with_capacity(COMPRESSED_POINT_LEN * 2);
    info.extend_from_slice(ephemeral.to_encoded_point(true).as_bytes());
    info.extend_from_slice(recipient.to_encoded_point(true).as_bytes());
    info
}

/// Encrypt `plaintext` so that each of `recipients` can open it.
pub fn seal(plaintext: &[u8], recipients: &[PublicKey]) -> Result<ContentEnvelope, EnvelopeError> {
    if recipients.is_empty() {
        return Err(EnvelopeError::NoRecipients);
    }

    let content_key = Aes256Gcm::generate_key(&mut OsRng);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = Aes256Gcm::new(&content_key)
        .encrypt(&nonce, plaintext)
        .map_err(|_| EnvelopeError::Encrypt)?;

    let mut wrapped = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let account = account_of(recipient);
        let ephemeral = EphemeralSecret::random(&mut OsRng);
        let ephemeral_public = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(recipient);
        let wrapping_key = derive_wrapping_key(
            shared.raw_secret_bytes(),
            &kdf_info(&ephemeral_public, recipient),
        )?;

        let wrap_nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let wrapped_key = Aes256Gcm::new(&wrapping_key)
            .encrypt(
                &wrap_nonce,
                Payload {
                    msg: content_key.as_slice(),
                    aad: account.as_bytes(),
                },
            )
            .map_err(|_| EnvelopeError::Encrypt)?;

        wrapped.push(WrappedKey {
            account,
            ephemeral_public_key: hex::encode(ephemeral_public.to_encoded_point(true).as_bytes()),
            nonce: Base64::encode_string(&wrap_nonce),
            wrapped_key: Base64::encode_string(&wrapped_key),
        });
    }

    Ok(ContentEnvelope {
        version: ENVELOPE_VERSION,
        nonce: Base64::encode_string(&nonce),
        ciphertext: Base64::encode_string(&ciphertext),
        recipients: wrapped,
    })
}

/// Decrypt an envelope with a recipient's wallet secret.
pub fn open(envelope: &ContentEnvelope, secret: &SecretKey) -> Result<Vec<u8>, EnvelopeError> {
    envelope.validate()?;

    let public = secret.public_key();
    let account = account_of(&public);
    let entry = envelope
        .recipients
        .iter()
        .find(|r| r.account == account)
        .ok_or(EnvelopeError::NotARecipient)?;

    let ephemeral_bytes = hex::decode(&entry.ephemeral_public_key).map_err(|e| {
        EnvelopeError::Malformed {
            field: "ephemeral_public_key",
            reason: e.to_string(),
        }
    })?;
    let ephemeral =
        PublicKey::from_sec1_bytes(&ephemeral_bytes).map_err(|e| EnvelopeError::Malformed {
            field: "ephemeral_public_key",
            reason: e.to_string(),
        })?;

    let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
    let wrapping_key =
        derive_wrapping_key(shared.raw_secret_bytes(), &kdf_info(&ephemeral, &public))?;

    let wrap_nonce = decode_field("recipients.nonce", &entry.nonce)?;
    let wrapped_key = decode_field("recipients.wrapped_key", &entry.wrapped_key)?;
    let content_key = Aes256Gcm::new(&wrapping_key)
        .decrypt(
            Nonce::from_slice(&wrap_nonce),
            Payload {
                msg: &wrapped_key,
                aad: account.as_bytes(),
            },
        )
        .map_err(|_| EnvelopeError::Decrypt)?;
    if content_key.len() != 32 {
        return Err(EnvelopeError::Decrypt);
    }

    let nonce = decode_field("nonce", &envelope.nonce)?;
    let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key))
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| EnvelopeError::Decrypt)
}

impl ContentEnvelope {
    /// Structural checks; does not (and cannot) decrypt.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.version != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(self.version));
        }

        let nonce = decode_field("nonce", &self.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(EnvelopeError::Malformed {
                field: "nonce",
                reason: format!("expected {NONCE_LEN} bytes, got {}", nonce.len()),
            });
        }

        let ciphertext = decode_field("ciphertext", &self.ciphertext)?;
        if ciphertext.len() < TAG_LEN {
            return Err(EnvelopeError::Malformed {
                field: "ciphertext",
                reason: "shorter than the authentication tag".to_string(),
            });
        }

        if self.recipients.is_empty() {
            return Err(EnvelopeError::NoRecipients);
        }
        for recipient in &self.recipients {
            let wrap_nonce = decode_field("recipients.nonce", &recipient.nonce)?;
            if wrap_nonce.len() != NONCE_LEN {
                return Err(EnvelopeError::Malformed {
                    field: "recipients.nonce",
                    reason: format!("expected {NONCE_LEN} bytes, got {}", wrap_nonce.len()),
                });
            }
            decode_field("recipients.wrapped_key", &recipient.wrapped_key)?;
            let point = hex::decode(&recipient.ephemeral_public_key).map_err(|e| {
                EnvelopeError::Malformed {
                    field: "ephemeral_public_key",
                    reason: e.to_string(),
                }
            })?;
            if point.len() != COMPRESSED_POINT_LEN {
                return Err(EnvelopeError::Malformed {
                    field: "ephemeral_public_key",
                    reason: format!("expected {COMPRESSED_POINT_LEN} bytes, got {}", point.len()),
                });
            }
        }
        Ok(())
    }

    /// Size of the JSON encoding, used for storage limits.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(usize::MAX)
    }
}
