// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Contract queries sent directly by wallets.
//!
//! Queries never touch the chain. The optional signature identifies the
//! caller; contracts decide what an anonymous caller may see.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    auth::SignedQuery,
    contracts::ContractId,
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub contract_id: u32,
    /// Verified account of the caller, absent for unsigned queries.
    pub origin: Option<String>,
    /// Contract response. Contract-level denials arrive as `{"Err": ...}`.
    #[schema(value_type = Object)]
    pub result: Value,
}

/// Query a contract.
#[utoipa::path(
    post,
    path = "/v1/contracts/{contract_id}/query",
    tag = "Contracts",
    params(("contract_id" = u32, Path, description = "Contract id")),
    request_body = SignedQuery,
    responses(
        (status = 200, description = "Contract response", body = QueryResponse),
        (status = 400, description = "Malformed payload or signature fields"),
        (status = 401, description = "Bad signature or stale timestamp"),
        (status = 404, description = "Unknown contract")
    )
)]
pub async fn query_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<u32>,
    Json(query): Json<SignedQuery>,
) -> Result<Json<QueryResponse>, Response> {
    let contract_id = ContractId(contract_id);
    let origin = query
        .verify(contract_id, Utc::now().timestamp())
        .map_err(|e| {
            tracing::debug!(%contract_id, error_code = e.error_code(), "Query signature rejected");
            e.into_response()
        })?;

    let payload: Value = serde_json::from_str(&query.payload).map_err(|e| {
        ApiError::bad_request(format!("Payload is not valid JSON: {e}")).into_response()
    })?;

    let result = state
        .runtime
        .read()
        .await
        .query(contract_id, origin.as_ref(), payload)
        .map_err(|e| ApiError::from(e).into_response())?;

    Ok(Json(QueryResponse {
        contract_id: contract_id.0,
        origin: origin.map(|account| account.to_hex()),
        result,
    }))
}
