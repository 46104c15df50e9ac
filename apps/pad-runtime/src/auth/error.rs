// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type, covering operator tokens and signed queries.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
    #[error("Signed query is incomplete: {0}")]
    IncompleteSignedQuery(&'static str),
    #[error("Query public key is invalid")]
    InvalidPublicKey,
    #[error("Query signature is invalid")]
    InvalidQuerySignature,
    #[error("Query timestamp is outside the accepted window")]
    StaleTimestamp,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::IncompleteSignedQuery(_) => "incomplete_signed_query",
            AuthError::InvalidPublicKey => "invalid_public_key",
            AuthError::InvalidQuerySignature => "invalid_query_signature",
            AuthError::StaleTimestamp => "stale_timestamp",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::IncompleteSignedQuery(_) | AuthError::InvalidPublicKey => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
