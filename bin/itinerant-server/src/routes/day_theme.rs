//! Day-theme flow: skeleton, then one day at a time.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ValidJson;
use crate::schemas::session::{SessionRequest, StageResponse};
use crate::schemas::stage::{ConfirmDayRequest, ExpandDayRequest, ModifyDayRequest, SelectionsBody};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate_skeleton, expand_day, confirm_day, modify_day),
    components(schemas(SessionRequest, ExpandDayRequest, ConfirmDayRequest, SelectionsBody, ModifyDayRequest))
)]
pub struct DayThemeApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate-skeleton", post(generate_skeleton))
        .route("/expand-day", post(expand_day))
        .route("/confirm-day", post(confirm_day))
        .route("/modify-day", post(modify_day))
}

#[utoipa::path(
    post,
    path = "/api/generate-skeleton",
    tag = "day-theme",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "One theme per day", body = StageResponse),
        (status = 400, description = "Trip details missing or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn generate_skeleton(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<SessionRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state.workflow.generate_skeleton(&req.session_id).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/expand-day",
    tag = "day-theme",
    request_body = ExpandDayRequest,
    responses(
        (status = 200, description = "Options staged for the day", body = StageResponse),
        (status = 400, description = "Unknown day or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn expand_day(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ExpandDayRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state
        .workflow
        .expand_day(&req.session_id, req.day_number)
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/confirm-day",
    tag = "day-theme",
    request_body = ConfirmDayRequest,
    responses(
        (status = 200, description = "Day planned", body = StageResponse),
        (status = 400, description = "Nothing staged for the day, unknown pick or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
    )
)]
pub async fn confirm_day(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ConfirmDayRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state
        .workflow
        .confirm_day(&req.session_id, req.day_number, req.selections.map(Into::into))
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/modify-day",
    tag = "day-theme",
    request_body = ModifyDayRequest,
    responses(
        (status = 200, description = "Day regenerated", body = StageResponse),
        (status = 400, description = "Day not planned or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn modify_day(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ModifyDayRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state
        .workflow
        .modify_day(&req.session_id, req.day_number, &req.instruction)
        .await?;
    Ok(Json(outcome.into()))
}
