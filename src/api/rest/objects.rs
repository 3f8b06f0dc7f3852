//! Query endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use super::{ApiResult, FilterParams};
use crate::api::state::AppState;

/// GET /get/:type?filter= - Objects matching the filter (all without one)
pub async fn get_filtered(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Value> {
    let results = match params.filter {
        Some(filter) => state.ctx.get_filtered(&entity_type, &filter)?,
        None => state.ctx.get_all(&entity_type)?,
    };
    let objects = results.to_vec()?;
    Ok(Json(json!({ "results": objects })))
}

/// GET /get/:type/all
pub async fn get_all(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
) -> ApiResult<Value> {
    let results = state.ctx.get_all(&entity_type)?;
    let objects = results.to_vec()?;
    Ok(Json(json!({ "results": objects })))
}

/// GET /get/:type/length
pub async fn get_length(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
) -> ApiResult<Value> {
    let length = state.ctx.get_count(&entity_type)?;
    Ok(Json(json!({ "length": length })))
}

/// GET /get/:type/:key - One object by primary key, as `{"results": {"0": ...}}`
pub async fn get_by_key(
    State(state): State<Arc<AppState>>,
    Path((entity_type, key)): Path<(String, String)>,
) -> ApiResult<Value> {
    let key = state.ctx.coerce_key(&entity_type, &key)?;
    let object = state.ctx.get_by_key(&entity_type, &key)?;
    Ok(Json(json!({ "results": { "0": object } })))
}
