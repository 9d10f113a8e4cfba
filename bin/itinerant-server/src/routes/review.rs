//! Review and finalisation, shared by both flows.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ValidJson;
use crate::schemas::session::{SessionRequest, StageResponse};
use crate::schemas::stage::StartReviewRequest;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(start_review, finalize), components(schemas(StartReviewRequest)))]
pub struct ReviewApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start-review", post(start_review))
        .route("/finalize", post(finalize))
}

#[utoipa::path(
    post,
    path = "/api/start-review",
    tag = "review",
    request_body = StartReviewRequest,
    responses(
        (status = 200, description = "Plan ready for review", body = StageResponse),
        (status = 400, description = "Days missing, unknown restaurant ids or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn start_review(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<StartReviewRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state
        .workflow
        .start_review(&req.session_id, req.selected_restaurant_ids)
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/finalize",
    tag = "review",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Final plan produced", body = StageResponse),
        (status = 400, description = "Wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<SessionRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state.workflow.finalize(&req.session_id).await?;
    Ok(Json(outcome.into()))
}
