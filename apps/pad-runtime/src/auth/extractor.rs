// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Axum extractors for operator endpoints.
//!
//! ```rust,ignore
//! async fn sync_blocks(
//!     RequireRelayer(operator): RequireRelayer,
//!     State(state): State<AppState>,
//! ) -> Result<Json<SyncResponse>, ApiError> {
//!     // operator.subject identifies the relayer
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::claims::{AuthenticatedOperator, OperatorClaims};
use super::{AuthError, Role};
use crate::audit_log;
use crate::state::{AppState, AuthConfig};
use crate::storage::{AuditEvent, AuditEventType};

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for any authenticated operator.
///
/// ## Authentication Modes
///
/// - **Production mode** (`RELAYER_JWT_SECRET` set): HS256 signature,
///   expiry and (if configured) issuer are verified.
/// - **Development mode**: the token is decoded without signature
///   verification; only expiry is checked.
pub struct Operator(pub AuthenticatedOperator);

impl FromRequestParts<AppState> for Operator {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let result = bearer_token(parts).and_then(|token| verify_jwt(token, &state.auth_config));
        match result {
            Ok(operator) => Ok(Operator(operator)),
            Err(e) => {
                tracing::warn!(path = %parts.uri.path(), error_code = e.error_code(), "Operator authentication failed");
                audit_log!(
                    state.storage.as_ref(),
                    AuditEvent::new(AuditEventType::AuthFailure)
                        .with_details(serde_json::json!({ "path": parts.uri.path() }))
                        .failed(e.error_code())
                );
                Err(e)
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Verify an operator token according to `config`.
pub fn verify_jwt(token: &str, config: &AuthConfig) -> Result<AuthenticatedOperator, AuthError> {
    match &config.jwt_secret {
        Some(secret) => verify_jwt_production(token, secret, config.issuer.as_deref()),
        None => verify_jwt_development(token),
    }
}

fn verify_jwt_production(
    token: &str,
    secret: &str,
    issuer: Option<&str>,
) -> Result<AuthenticatedOperator, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<OperatorClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken,
    })?;

    Ok(AuthenticatedOperator::from_claims(token_data.claims))
}

/// WARNING: development only. No signature check.
fn verify_jwt_development(token: &str) -> Result<AuthenticatedOperator, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<OperatorClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedOperator::from_claims(claims))
}

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    required: Role,
) -> Result<AuthenticatedOperator, AuthError> {
    let Operator(operator) = Operator::from_request_parts(parts, state).await?;
    if !operator.has_role(required) {
        tracing::warn!(subject = %operator.subject, role = %operator.role, %required, "Operator lacks role");
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(operator)
}

/// Requires the `relayer` role (or `admin`).
pub struct RequireRelayer(pub AuthenticatedOperator);

impl FromRequestParts<AppState> for RequireRelayer {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Relayer)
            .await
            .map(RequireRelayer)
    }
}

/// Requires the `auditor` role (or `admin`).
pub struct RequireAuditor(pub AuthenticatedOperator);

impl FromRequestParts<AppState> for RequireAuditor {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Auditor)
            .await
            .map(RequireAuditor)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) fn token(secret: &str, role: &str, exp_offset: i64, iss: Option<&str>) -> String {
        let now = Utc::now().timestamp();
        let claims = OperatorClaims {
            sub: "operator-1".to_string(),
            iat: now,
            exp: now + exp_offset,
            iss: iss.map(str::to_string),
            role: Some(role.to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn parts(auth: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/v1/sync/blocks");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn production() -> AuthConfig {
        AuthConfig {
            jwt_secret: Some("s3cret".to_string()),
            issuer: Some("cipherpad".to_string()),
        }
    }

    #[test]
    fn production_mode_verifies_signature_and_issuer() {
        let config = production();
        let good = token("s3cret", "relayer", 600, Some("cipherpad"));
        assert_eq!(verify_jwt(&good, &config).unwrap().role, Role::Relayer);

        let forged = token("other", "admin", 600, Some("cipherpad"));
        assert!(matches!(
            verify_jwt(&forged, &config),
            Err(AuthError::InvalidSignature)
        ));

        let wrong_issuer = token("s3cret", "relayer", 600, Some("elsewhere"));
        assert!(matches!(
            verify_jwt(&wrong_issuer, &config),
            Err(AuthError::InvalidIssuer)
        ));

        let expired = token("s3cret", "relayer", -3600, Some("cipherpad"));
        assert!(matches!(
            verify_jwt(&expired, &config),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn development_mode_only_checks_expiry() {
        let config = AuthConfig::default();
        let any_secret = token("whatever", "auditor", 600, None);
        assert_eq!(verify_jwt(&any_secret, &config).unwrap().role, Role::Auditor);

        let expired = token("whatever", "auditor", -3600, None);
        assert!(matches!(
            verify_jwt(&expired, &config),
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            verify_jwt("not.a.jwt", &config),
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn extractor_requires_bearer_header() {
        let (state, _temp) = test_state();

        let result = Operator::from_request_parts(&mut parts(None), &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));

        let result =
            Operator::from_request_parts(&mut parts(Some("Basic abc".to_string())), &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn role_extractors_enforce_roles() {
        let (state, _temp) = test_state();
        let auditor = format!("Bearer {}", token("x", "auditor", 600, None));
        let admin = format!("Bearer {}", token("x", "admin", 600, None));

        let result = RequireRelayer::from_request_parts(&mut parts(Some(auditor.clone())), &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
        assert!(
            RequireAuditor::from_request_parts(&mut parts(Some(auditor)), &state)
                .await
                .is_ok()
        );
        assert!(
            RequireRelayer::from_request_parts(&mut parts(Some(admin)), &state)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn failures_are_audited() {
        let (state, _temp) = test_state();
        let _ = Operator::from_request_parts(&mut parts(None), &state).await;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = crate::storage::AuditRepository::new(&state.storage)
            .read_events(&today)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::AuthFailure);
        assert_eq!(events[0].error.as_deref(), Some("missing_auth_header"));
    }
}
