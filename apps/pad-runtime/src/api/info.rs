// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

use axum::{extract::State, Json};

use crate::{runtime::RuntimeInfo, state::AppState};

/// Public worker identity, block height and hosted contracts.
#[utoipa::path(
    get,
    path = "/v1/info",
    tag = "Runtime",
    responses(
        (status = 200, description = "Runtime information", body = RuntimeInfo)
    )
)]
pub async fn get_info(State(state): State<AppState>) -> Json<RuntimeInfo> {
    Json(state.runtime.read().await.info())
}
