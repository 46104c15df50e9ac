// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Audit log access for auditors.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::RequireAuditor,
    error::ApiError,
    state::AppState,
    storage::{AuditEvent, AuditRepository, StorageError},
};

/// Maximum number of days in one range query.
pub const MAX_RANGE_DAYS: i64 = 31;

/// Query parameters for audit log queries.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Single day (YYYY-MM-DD). Defaults to today.
    pub date: Option<String>,
    /// Start of a date range (YYYY-MM-DD), used together with `to`.
    pub from: Option<String>,
    /// End of a date range (YYYY-MM-DD), inclusive.
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditDatesResponse {
    /// Days with at least one audit event, oldest first.
    pub dates: Vec<String>,
}

fn parse_date(value: &str, param: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid {param} format. Use YYYY-MM-DD.")))
}

/// Read audit events for one day or a date range.
#[utoipa::path(
    get,
    path = "/v1/audit",
    tag = "Audit",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Auditor role required")
    )
)]
pub async fn query_audit_log(
    RequireAuditor(auditor): RequireAuditor,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let repo = AuditRepository::new(&state.storage);

    let events = match (&params.from, &params.to) {
        (Some(from), Some(to)) => {
            let start = parse_date(from, "from")?;
            let end = parse_date(to, "to")?;
            if end < start {
                return Err(ApiError::bad_request("`to` is before `from`"));
            }
            if (end - start).num_days() >= MAX_RANGE_DAYS {
                return Err(ApiError::bad_request(format!(
                    "Date range is limited to {MAX_RANGE_DAYS} days"
                )));
            }
            repo.read_events_range(from, to)?
        }
        (None, None) => {
            let today = Utc::now().format("%Y-%m-%d").to_string();
            let date = params.date.as_deref().unwrap_or(&today);
            parse_date(date, "date")?;
            match repo.read_events(date) {
                Ok(events) => events,
                Err(StorageError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e.into()),
            }
        }
        _ => return Err(ApiError::bad_request("`from` and `to` must be given together")),
    };

    tracing::debug!(auditor = %auditor.subject, total = events.len(), "Audit log read");
    Ok(Json(AuditLogResponse {
        total: events.len(),
        events,
    }))
}

/// Days that have audit events.
#[utoipa::path(
    get,
    path = "/v1/audit/dates",
    tag = "Audit",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Days with audit events", body = AuditDatesResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Auditor role required")
    )
)]
pub async fn list_audit_dates(
    RequireAuditor(_auditor): RequireAuditor,
    State(state): State<AppState>,
) -> Result<Json<AuditDatesResponse>, ApiError> {
    let dates = AuditRepository::new(&state.storage).dates()?;
    Ok(Json(AuditDatesResponse { dates }))
}
