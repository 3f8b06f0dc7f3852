//! REST endpoints over the service context
//!
//! - `GET /`, `/path`, `/schema`, `/schema/version`, `/schema/history` - meta data
//! - `GET /get/:type[?filter=]`, `/get/:type/all`, `/get/:type/length`, `/get/:type/:key` - queries
//! - `POST /write`, `/add/:type`, `/add/:type/nest`, `/update/:type`,
//!   `/update/:type/multiple`, `/delete/:type`, `/delete/:type/all` - writes
//! - `POST /schema/update` - schema change

pub mod meta;
pub mod objects;
pub mod writes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, StoreError};

/// Optional `?filter=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub filter: Option<String>,
}

impl FilterParams {
    pub fn require(self) -> Result<String, ApiError> {
        self.filter
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("query parameter 'filter' is required"))
    }
}

/// Acknowledgement of a single write
#[derive(Debug, Serialize)]
pub struct WriteAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub action: &'static str,
    pub success: bool,
}

impl WriteAck {
    pub fn new(schema: impl Into<String>, action: &'static str) -> Self {
        Self {
            schema: Some(schema.into()),
            action,
            success: true,
        }
    }

    pub fn batch() -> Self {
        Self {
            schema: None,
            action: "multipleWrites",
            success: true,
        }
    }
}

/// API error response: `{"success": false, "kind", "error"}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub kind: ErrorKind,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            kind,
            error: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::InvalidInput, message)
    }
}

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound | ErrorKind::PropertyNotFound => StatusCode::NOT_FOUND,
        ErrorKind::VersionConflict | ErrorKind::ConstraintViolation | ErrorKind::SchemaMismatch => {
            StatusCode::CONFLICT
        }
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::TransactionAborted | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // An aborted batch answers with the status of the operation that failed
        let status = status_for(err.root_kind());
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
