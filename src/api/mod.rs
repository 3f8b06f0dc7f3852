//! API module for HTTP endpoints
//!
//! A thin axum layer over [`ServiceContext`](crate::service::ServiceContext):
//! each route maps to one service operation.

pub mod http;
pub mod rest;
pub mod state;

pub use http::create_router;
pub use state::AppState;
