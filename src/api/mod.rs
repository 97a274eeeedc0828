//! REST API module using Axum
//!
//! Thin translation layer over the simulation core: read endpoints serve
//! sections of the latest snapshot, write endpoints validate and forward to
//! the simulator's action methods. Domain errors map onto status codes
//! (404 / 400 / 409 / 412); the core never sees HTTP.

pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::Router;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::errors::SimError;

/// Create the complete application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .merge(routes::api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

/// API error type for consistent error responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: axum::http::StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl From<SimError> for ApiError {
    fn from(e: SimError) -> Self {
        use axum::http::StatusCode;
        let status = match e {
            SimError::NotFound(_) => StatusCode::NOT_FOUND,
            SimError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            SimError::Conflict(_) => StatusCode::CONFLICT,
            SimError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        };
        Self {
            status,
            code: e.tag(),
            message: e.to_string(),
        }
    }
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::CONFLICT,
            code: "CONFLICT",
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, axum::Json(body)).into_response()
    }
}
