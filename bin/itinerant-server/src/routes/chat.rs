//! Free-text chat: trip details, destination changes, review edits.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ValidJson;
use crate::schemas::session::StageResponse;
use crate::schemas::stage::ChatRequest;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatRequest)))]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply and updated session", body = StageResponse),
        (status = 400, description = "Invalid request or not allowed in the current stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ChatRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state.workflow.chat(&req.session_id, &req.message).await?;
    Ok(Json(outcome.into()))
}
