// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedOperator, Role, SignedQuery},
    contracts::notepad::{Post, PostSummary},
    crypto::envelope::{ContentEnvelope, WrappedKey},
    runtime::{egress::EgressMessage, Block, ChainMessage, CommandReceipt, ContractInfo, RuntimeInfo},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

pub mod audit;
pub mod egress;
pub mod health;
pub mod info;
pub mod query;
pub mod sync;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/info", get(info::get_info))
        .route("/sync/blocks", post(sync::sync_blocks))
        .route("/sync/receipts/{block_number}", get(sync::get_receipts))
        .route("/egress", get(egress::get_egress))
        .route(
            "/contracts/{contract_id}/query",
            post(query::query_contract),
        )
        .route("/audit", get(audit::query_audit_log))
        .route("/audit/dates", get(audit::list_audit_dates));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        info::get_info,
        sync::sync_blocks,
        sync::get_receipts,
        egress::get_egress,
        query::query_contract,
        audit::query_audit_log,
        audit::list_audit_dates
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            RuntimeInfo,
            ContractInfo,
            Block,
            ChainMessage,
            CommandReceipt,
            sync::SyncBlocksRequest,
            sync::SyncBlocksResponse,
            sync::BlockReceipts,
            EgressMessage,
            egress::EgressResponse,
            SignedQuery,
            query::QueryResponse,
            Post,
            PostSummary,
            ContentEnvelope,
            WrappedKey,
            AuditEvent,
            AuditEventType,
            audit::AuditLogResponse,
            audit::AuditDatesResponse,
            AuthenticatedOperator,
            Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Runtime", description = "Worker identity and state"),
        (name = "Sync", description = "Block ingestion and outbound messages (relayer)"),
        (name = "Contracts", description = "Contract queries"),
        (name = "Audit", description = "Audit log (auditor)")
    )
)]
struct ApiDoc;
