use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshResponse {
    pub version: u64,
    pub products: usize,
}

/// `POST /admin/catalog/refresh`. Hidden (404) unless an admin token is configured.
pub async fn refresh_catalog(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(expected) = state.admin_token.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !bearer_matches(&headers, expected) {
        warn!(event_name = "admin.unauthorized", "admin request with missing or wrong token");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
    }

    match state.catalog.refresh().await {
        Ok(snapshot) => {
            info!(
                event_name = "admin.catalog.refreshed",
                version = snapshot.version,
                products = snapshot.len(),
                "catalog refreshed on admin request"
            );
            Json(RefreshResponse { version: snapshot.version, products: snapshot.len() })
                .into_response()
        }
        Err(error) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": error.to_string(), "kind": error.kind() })),
        )
            .into_response(),
    }
}

fn bearer_matches(headers: &HeaderMap, expected: &SecretString) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected.expose_secret())
}
