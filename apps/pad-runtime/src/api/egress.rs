// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{auth::RequireRelayer, runtime::egress::EgressMessage, state::AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct EgressParams {
    /// Return messages with a sequence number greater than this.
    #[serde(default)]
    pub since: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EgressResponse {
    /// Highest sequence number issued so far.
    pub last_sequence: u64,
    pub messages: Vec<EgressMessage>,
}

/// Outbound messages for the relayer to submit on chain.
#[utoipa::path(
    get,
    path = "/v1/egress",
    tag = "Sync",
    params(EgressParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending outbound messages", body = EgressResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Relayer role required")
    )
)]
pub async fn get_egress(
    RequireRelayer(_operator): RequireRelayer,
    State(state): State<AppState>,
    Query(params): Query<EgressParams>,
) -> Json<EgressResponse> {
    let runtime = state.runtime.read().await;
    Json(EgressResponse {
        last_sequence: runtime.egress_sequence(),
        messages: runtime.egress_since(params.since),
    })
}
