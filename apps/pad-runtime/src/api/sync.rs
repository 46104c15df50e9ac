// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Block ingestion from the relayer.
//!
//! A batch is applied in order under the runtime write lock. The first
//! failing block stops the batch; blocks before it stay applied and the
//! relayer resumes from `GET /v1/info`.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::RequireRelayer,
    error::ApiError,
    runtime::{Block, CommandReceipt},
    state::AppState,
};

/// Maximum number of blocks accepted in one request.
pub const MAX_BATCH_BLOCKS: usize = 256;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncBlocksRequest {
    pub blocks: Vec<Block>,
}

/// Receipts of one dispatched block.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlockReceipts {
    pub block_number: u64,
    pub receipts: Vec<CommandReceipt>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncBlocksResponse {
    /// Last dispatched block after this batch.
    pub block_number: u64,
    pub blocks: Vec<BlockReceipts>,
}

/// Dispatch a batch of chain blocks.
#[utoipa::path(
    post,
    path = "/v1/sync/blocks",
    tag = "Sync",
    request_body = SyncBlocksRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Blocks dispatched", body = SyncBlocksResponse),
        (status = 400, description = "Empty or oversized batch"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Relayer role required"),
        (status = 409, description = "Block out of order")
    )
)]
pub async fn sync_blocks(
    RequireRelayer(operator): RequireRelayer,
    State(state): State<AppState>,
    Json(request): Json<SyncBlocksRequest>,
) -> Result<Json<SyncBlocksResponse>, ApiError> {
    if request.blocks.is_empty() {
        return Err(ApiError::bad_request("No blocks in request"));
    }
    if request.blocks.len() > MAX_BATCH_BLOCKS {
        return Err(ApiError::bad_request(format!(
            "At most {MAX_BATCH_BLOCKS} blocks per request"
        )));
    }

    let mut runtime = state.runtime.write().await;
    let mut blocks = Vec::with_capacity(request.blocks.len());
    for block in request.blocks {
        let block_number = block.number;
        let receipts = runtime.dispatch_block(block).inspect_err(|e| {
            tracing::warn!(
                relayer = %operator.subject,
                block_number,
                current = runtime.block_number(),
                error = %e,
                "Block batch stopped"
            );
        })?;
        blocks.push(BlockReceipts {
            block_number,
            receipts,
        });
    }

    Ok(Json(SyncBlocksResponse {
        block_number: runtime.block_number(),
        blocks,
    }))
}

/// Receipts recorded for a dispatched block.
#[utoipa::path(
    get,
    path = "/v1/sync/receipts/{block_number}",
    tag = "Sync",
    params(("block_number" = u64, Path, description = "Block number")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Receipts of the block", body = BlockReceipts),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Relayer role required"),
        (status = 404, description = "Block not dispatched yet")
    )
)]
pub async fn get_receipts(
    RequireRelayer(_operator): RequireRelayer,
    State(state): State<AppState>,
    Path(block_number): Path<u64>,
) -> Result<Json<BlockReceipts>, ApiError> {
    let current = state.runtime.read().await.block_number();
    if block_number == 0 || block_number > current {
        return Err(ApiError::not_found(format!(
            "Block {block_number} has not been dispatched"
        )));
    }
    let receipts = state.receipts.receipts_for_block(block_number)?;
    Ok(Json(BlockReceipts {
        block_number,
        receipts,
    }))
}
