//! Meta data and schema endpoints

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use super::ApiResult;
use crate::api::state::AppState;
use crate::types::{MetaRecord, SchemaDefinition};

/// Latest meta record with the schema decoded
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaResponse {
    pub path: String,
    pub schema_version: u64,
    pub schema: SchemaDefinition,
}

/// GET / - Latest meta record
pub async fn get_meta(State(state): State<Arc<AppState>>) -> ApiResult<MetaResponse> {
    let latest = state.ctx.get_latest_meta()?;
    Ok(Json(MetaResponse {
        schema: latest.definition()?,
        path: latest.path,
        schema_version: latest.schema_version,
    }))
}

/// GET /path
pub async fn get_path(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let latest = state.ctx.get_latest_meta()?;
    Ok(Json(json!({ "path": latest.path })))
}

/// GET /schema - The schema as its stored JSON string
pub async fn get_schema(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let latest = state.ctx.get_latest_meta()?;
    Ok(Json(json!({ "schema": latest.schema })))
}

/// GET /schema/version
pub async fn get_schema_version(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let latest = state.ctx.get_latest_meta()?;
    Ok(Json(json!({ "schemaVersion": latest.schema_version })))
}

/// GET /schema/history - Every meta record of the path, oldest first
pub async fn get_schema_history(State(state): State<Arc<AppState>>) -> Json<Vec<MetaRecord>> {
    Json(state.ctx.meta_history())
}

/// POST /schema/update - Move the store to a new schema version
pub async fn update_schema(
    State(state): State<Arc<AppState>>,
    Json(schema): Json<SchemaDefinition>,
) -> ApiResult<Value> {
    let update = state.ctx.update_schema(schema)?;
    Ok(Json(json!({
        "action": "updateSchema",
        "schemaVersion": update.schema_version,
        "success": update.success,
    })))
}
