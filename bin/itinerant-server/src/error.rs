//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body of the form
//! `{"success": false, "message": ...}` with a matching status code.
//!
//! Upstream failures are logged with full detail; the caller only sees a
//! generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use itinerant_core::{WorkflowError, WorkflowState};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The referenced session does not exist or has expired.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The operation is not allowed in the session's current stage.
    #[error("invalid state: {message}")]
    InvalidState {
        message: String,
        current_state: WorkflowState,
    },

    /// Generation, place search or geocoding failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<WorkflowError> for ServerError {
    fn from(e: WorkflowError) -> Self {
        let message = e.to_string();
        match e {
            WorkflowError::Validation(m) => ServerError::BadRequest(m),
            WorkflowError::State { current, .. } => ServerError::InvalidState {
                message,
                current_state: current,
            },
            WorkflowError::NotFound { .. } => ServerError::NotFound(message),
            WorkflowError::Upstream(m) => ServerError::Upstream(m),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "success": false, "message": m })),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "success": false, "message": m })),
            ServerError::InvalidState { message, current_state } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "message": message,
                    "currentState": current_state,
                }),
            ),
            ServerError::Upstream(m) => {
                error!(error = %m, "upstream collaborator failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "message": "the planning assistant could not complete this step; please try again",
                    }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
