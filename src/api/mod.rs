//! REST API endpoints.
//!
//! Axum-based HTTP surface over the platform operations. Handlers take the
//! platform write lock for the whole of each mutation and persist the state
//! before releasing it.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::PlayerId;
use crate::platform::CoreError;
use crate::storage::StorageError;
use routes::{admin, drafts, matches, players};
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => match err {
                CoreError::Validation(_) | CoreError::Rating(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::StateConflict(_)
                | CoreError::Capacity(_)
                | CoreError::ResultExists(_) => StatusCode::CONFLICT,
                CoreError::WindowExpired(_) => StatusCode::GONE,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Core(err) => err.code(),
            ApiError::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let details = match &self {
            ApiError::Core(CoreError::Validation(v)) => serde_json::to_value(&v.issues).ok(),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Body of requests made on behalf of an actor.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: PlayerId,
}

/// Build the CORS layer for a configured origin; `*` allows any origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    if origin == "*" {
        return Ok(CorsLayer::permissive());
    }
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/players", post(players::register_player))
        .route("/api/players/:id", get(players::get_player))
        .route("/api/players/:id/ledger", get(players::get_ledger))
        .route("/api/matches", post(matches::create_match))
        .route("/api/matches/:id", get(matches::get_match))
        .route("/api/matches/:id/join", post(matches::join_match))
        .route("/api/matches/:id/leave", post(matches::leave_match))
        .route("/api/matches/:id/remove", post(matches::remove_member))
        .route("/api/matches/:id/cancel", post(matches::cancel_match))
        .route(
            "/api/matches/:id/draft",
            get(drafts::get_match_draft).post(drafts::create_draft),
        )
        .route(
            "/api/drafts/:id",
            axum::routing::put(drafts::update_draft).delete(drafts::delete_draft),
        )
        .route("/api/drafts/:id/confirm", post(drafts::confirm_draft))
        .route("/api/admin/audit", get(admin::audit))
        .route("/api/admin/reconcile", post(admin::reconcile))
        .route(
            "/api/admin/matches/:id/force-cancel",
            post(admin::force_cancel),
        )
        .route(
            "/api/admin/matches/:id/force-delete",
            post(admin::force_delete),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
