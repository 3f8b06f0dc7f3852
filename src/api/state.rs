//! Shared application state for HTTP handlers

use std::sync::Arc;

use crate::service::ServiceContext;

pub struct AppState {
    pub ctx: Arc<ServiceContext>,
}

impl AppState {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }
}
