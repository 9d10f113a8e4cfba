//! Activity-first flow: pick activities, group them into days, add
//! restaurants.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ValidJson;
use crate::schemas::session::{SessionRequest, StageResponse};
use crate::schemas::stage::{
    ConfirmDayGroupingRequest, GroupDaysRequest, MealPreferencesRequest, MoveBody,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(suggest_activities, group_days, confirm_day_grouping, meal_preferences),
    components(schemas(GroupDaysRequest, ConfirmDayGroupingRequest, MoveBody, MealPreferencesRequest))
)]
pub struct ActivityFirstApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/suggest-activities", post(suggest_activities))
        .route("/group-days", post(group_days))
        .route("/confirm-day-grouping", post(confirm_day_grouping))
        .route("/meal-preferences", post(meal_preferences))
}

#[utoipa::path(
    post,
    path = "/api/suggest-activities",
    tag = "activity-first",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Located activity suggestions", body = StageResponse),
        (status = 400, description = "Destination missing or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn suggest_activities(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<SessionRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state.workflow.suggest_activities(&req.session_id).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/group-days",
    tag = "activity-first",
    request_body = GroupDaysRequest,
    responses(
        (status = 200, description = "Activities grouped into days", body = StageResponse),
        (status = 400, description = "Unknown activity ids or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn group_days(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<GroupDaysRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state
        .workflow
        .group_days(&req.session_id, req.selected_activity_ids)
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/confirm-day-grouping",
    tag = "activity-first",
    request_body = ConfirmDayGroupingRequest,
    responses(
        (status = 200, description = "Every grouped day laid out", body = StageResponse),
        (status = 400, description = "Invalid move or wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn confirm_day_grouping(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ConfirmDayGroupingRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let moves = req.moves.into_iter().map(Into::into).collect();
    let outcome = state
        .workflow
        .confirm_day_grouping(&req.session_id, moves)
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/meal-preferences",
    tag = "activity-first",
    request_body = MealPreferencesRequest,
    responses(
        (status = 200, description = "Restaurants found around each day", body = StageResponse),
        (status = 400, description = "Wrong stage"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Generation failed"),
    )
)]
pub async fn meal_preferences(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<MealPreferencesRequest>,
) -> Result<Json<StageResponse>, ServerError> {
    let outcome = state
        .workflow
        .meal_preferences(&req.session_id, req.preferences)
        .await?;
    Ok(Json(outcome.into()))
}
