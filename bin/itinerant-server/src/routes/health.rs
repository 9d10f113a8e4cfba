//! Liveness probe with a glance at the session store.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthStatus)))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    /// Sessions held in memory, including expired ones the sweeper has not
    /// reached yet.
    pub stored_sessions: usize,
    pub session_ttl_secs: u64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthStatus)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        stored_sessions: state.workflow.store().len().await,
        session_ttl_secs: state.config.session_ttl.as_secs(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use itinerant_core::testing::ScriptedGenerator;
    use itinerant_core::{Enricher, MemorySessionStore, Workflow};

    use crate::config::Config;

    #[tokio::test]
    async fn health_counts_stored_sessions() {
        let store = Arc::new(MemorySessionStore::default());
        let workflow = Workflow::new(store, Arc::new(ScriptedGenerator::new()), Enricher::disabled());
        let state = Arc::new(AppState::new(Config::default(), workflow));

        let Json(body) = get_health(State(state.clone())).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.stored_sessions, 0);

        state.workflow.start_session().await.unwrap();
        state.workflow.start_session().await.unwrap();
        let Json(body) = get_health(State(state.clone())).await;
        assert_eq!(body.stored_sessions, 2);
        assert_eq!(body.session_ttl_secs, state.config.session_ttl.as_secs());
    }
}
