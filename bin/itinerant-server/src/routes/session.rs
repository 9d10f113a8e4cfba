//! Session lifecycle: start, inspect, delete, map view.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::session::{DeleteResponse, MapResponse, SessionResponse, StageResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(start_session, get_session, delete_session, get_map),
    components(schemas(StageResponse, SessionResponse, DeleteResponse, MapResponse))
)]
pub struct SessionApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start-session", post(start_session))
        .route("/session/{session_id}", get(get_session).delete(delete_session))
        .route("/session/{session_id}/map", get(get_map))
}

#[utoipa::path(
    post,
    path = "/api/start-session",
    tag = "sessions",
    responses(
        (status = 200, description = "Session created", body = StageResponse),
    )
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StageResponse>, ServerError> {
    let session = state.workflow.start_session().await?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    get,
    path = "/api/session/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionResponse),
        (status = 404, description = "Unknown or expired session"),
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ServerError> {
    let session = state.workflow.session(&session_id).await?;
    Ok(Json(SessionResponse {
        success: true,
        session,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/session/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session deleted (idempotent)", body = DeleteResponse),
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<DeleteResponse> {
    let deleted = state.workflow.delete_session(&session_id).await;
    Json(DeleteResponse {
        success: true,
        deleted,
    })
}

#[utoipa::path(
    get,
    path = "/api/session/{session_id}/map",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Markers, routes and legend of the planned days", body = MapResponse),
        (status = 404, description = "Unknown or expired session"),
    )
)]
pub async fn get_map(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<MapResponse>, ServerError> {
    let map = state.workflow.map_view(&session_id).await?;
    Ok(Json(MapResponse {
        success: true,
        session_id,
        map,
    }))
}
