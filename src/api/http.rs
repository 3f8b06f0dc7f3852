//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::rest::{meta, objects, writes};
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.ctx.config().cors_origin);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Meta data
        .route("/", get(meta::get_meta))
        .route("/path", get(meta::get_path))
        .route("/schema", get(meta::get_schema))
        .route("/schema/version", get(meta::get_schema_version))
        .route("/schema/history", get(meta::get_schema_history))
        .route("/schema/update", post(meta::update_schema))
        // Queries
        .route("/get/:type", get(objects::get_filtered))
        .route("/get/:type/all", get(objects::get_all))
        .route("/get/:type/length", get(objects::get_length))
        .route("/get/:type/:key", get(objects::get_by_key))
        // Writes
        .route("/write", post(writes::write_batch))
        .route("/add/:type", post(writes::add))
        .route("/add/:type/nest", post(writes::nest))
        .route("/update/:type", post(writes::update))
        .route("/update/:type/multiple", post(writes::update_multiple))
        .route("/delete/:type", post(writes::delete))
        .route("/delete/:type/all", post(writes::delete_all))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for a single credentialed origin
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!(origin, "invalid CORS origin, cross-origin requests will be refused");
            cors
        }
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::service::ServiceContext;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
        let app = create_router(Arc::new(AppState::new(Arc::new(ctx))));
        (app, temp_dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _temp_dir) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_root_returns_latest_meta() {
        let (app, _temp_dir) = create_test_app();

        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "default.store");
        assert_eq!(body["schemaVersion"], 0);
        assert_eq!(body["schema"][0]["name"], "Person");
    }

    #[tokio::test]
    async fn test_add_then_read_back() {
        let (app, _temp_dir) = create_test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/add/Dog",
            Some(json!({"id": 1, "name": "Rex", "breed": "Lab"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"schema": "Dog", "action": "add", "success": true}));

        let (_, body) = send(&app, "GET", "/get/Dog/1", None).await;
        assert_eq!(body["results"]["0"]["name"], "Rex");

        let (_, body) = send(&app, "GET", "/get/Dog/length", None).await;
        assert_eq!(body["length"], 1);

        let (_, body) = send(&app, "GET", "/get/Dog?filter=breed%20%3D%3D%20'Lab'", None).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nest_on_scalar_is_not_found() {
        let (app, _temp_dir) = create_test_app();
        send(&app, "POST", "/add/Person", Some(json!({"id": 1, "name": "A"}))).await;

        let (status, body) = send(
            &app,
            "POST",
            "/add/Person/nest?filter=id%20%3D%3D%201&property=name",
            Some(json!({"id": 1, "name": "Rex", "breed": "Lab"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "transactionAborted");
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let (app, _temp_dir) = create_test_app();
        let (status, body) = send(&app, "POST", "/delete/Dog", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalidInput");
    }

    #[tokio::test]
    async fn test_unknown_type_is_not_found() {
        let (app, _temp_dir) = create_test_app();
        let (status, _) = send(&app, "GET", "/get/Cat/all", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_schema_update_bumps_version() {
        let (app, _temp_dir) = create_test_app();
        let schema = json!([{
            "name": "Cat",
            "primaryKey": "id",
            "properties": {"id": "int", "name": "string"}
        }]);

        let (status, body) = send(&app, "POST", "/schema/update", Some(schema)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["schemaVersion"], 1);

        let (_, body) = send(&app, "GET", "/schema/version", None).await;
        assert_eq!(body["schemaVersion"], 1);

        let (_, body) = send(&app, "GET", "/schema/history", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }
}
