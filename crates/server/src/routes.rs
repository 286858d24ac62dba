use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use secrecy::SecretString;
use tendero_agent::runtime::AgentRuntime;
use tendero_core::catalog::CatalogStore;

use crate::{admin, health, webhook};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub catalog: Arc<CatalogStore>,
    pub verify_token: SecretString,
    /// `None` disables the admin routes.
    pub admin_token: Option<SecretString>,
    pub started_at: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::status))
        .route("/health", get(health::health))
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        .route("/admin/catalog/refresh", post(admin::refresh_catalog))
        .with_state(state)
}
