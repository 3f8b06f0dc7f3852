//! Write endpoints
//!
//! Each single-operation route wraps its operation in a one-element batch, so
//! every write goes through the same dispatcher.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, ApiResult, FilterParams, WriteAck};
use crate::api::state::AppState;
use crate::types::{Object, WriteBatch, WriteOperation};

#[derive(Debug, Deserialize)]
pub struct NestParams {
    pub filter: Option<String>,
    pub property: Option<String>,
}

fn apply_one(state: &AppState, op: WriteOperation) -> ApiResult<WriteAck> {
    let ack = WriteAck::new(op.entity_type(), op.action());
    state.ctx.apply_batch(&[op])?;
    info!(schema = ack.schema.as_deref(), action = ack.action, "write applied");
    Ok(Json(ack))
}

/// POST /write - Apply a batch of operations atomically
pub async fn write_batch(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<WriteBatch>,
) -> ApiResult<WriteAck> {
    state.ctx.apply_batch(&batch)?;
    info!(operations = batch.len(), "write batch applied");
    Ok(Json(WriteAck::batch()))
}

/// POST /add/:type
pub async fn add(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Json(payload): Json<Object>,
) -> ApiResult<WriteAck> {
    apply_one(&state, WriteOperation::Add { entity_type, payload })
}

/// POST /add/:type/nest?filter=&property=
pub async fn nest(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Query(params): Query<NestParams>,
    Json(payload): Json<Object>,
) -> ApiResult<WriteAck> {
    let filter = FilterParams {
        filter: params.filter,
    }
    .require()?;
    let property = params
        .property
        .ok_or_else(|| ApiError::bad_request("query parameter 'property' is required"))?;

    apply_one(
        &state,
        WriteOperation::Nest {
            entity_type,
            payload,
            filter,
            property,
        },
    )
}

/// POST /update/:type
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Json(payload): Json<Object>,
) -> ApiResult<WriteAck> {
    apply_one(&state, WriteOperation::Update { entity_type, payload })
}

/// POST /update/:type/multiple?filter=
pub async fn update_multiple(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Query(params): Query<FilterParams>,
    Json(payload): Json<Object>,
) -> ApiResult<WriteAck> {
    let filter = params.require()?;
    apply_one(
        &state,
        WriteOperation::UpdateMultiple {
            entity_type,
            payload,
            filter,
        },
    )
}

/// POST /delete/:type?filter=
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Query(params): Query<FilterParams>,
) -> ApiResult<WriteAck> {
    let filter = params.require()?;
    apply_one(&state, WriteOperation::Delete { entity_type, filter })
}

/// POST /delete/:type/all
pub async fn delete_all(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
) -> ApiResult<WriteAck> {
    apply_one(&state, WriteOperation::DeleteAll { entity_type })
}
