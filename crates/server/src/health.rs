use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
    pub products: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogHealth {
    pub version: u64,
    pub products: usize,
    pub loaded_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub catalog: CatalogHealth,
    pub conversations: usize,
    pub timestamp: String,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "active",
        message: "¡El servidor del chatbot de Asoferru está activo!".to_owned(),
        timestamp: Utc::now().to_rfc3339(),
        products: state.catalog.current().len(),
    })
}

/// Liveness: the process answers as long as it runs. An empty catalog is
/// reported through `catalog.version == 0`, not through the status code.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.catalog.current();
    let payload = HealthResponse {
        status: "healthy",
        uptime_secs: state.started_at.elapsed().as_secs(),
        catalog: CatalogHealth {
            version: snapshot.version,
            products: snapshot.len(),
            loaded_at: snapshot.loaded_at.map(|loaded_at| loaded_at.to_rfc3339()),
        },
        conversations: state.runtime.conversations().len().await,
        timestamp: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
