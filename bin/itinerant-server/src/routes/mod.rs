//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (CORS, per-request trace id)
//! - the OpenAPI document at `/api-docs/openapi.json`
//! - the health route
//! - the workflow routes under `/api`

mod activity_first;
mod chat;
mod day_theme;
pub mod doc;
mod health;
mod review;
mod session;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router, middleware};
use tower::ServiceBuilder;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(session::router())
        .merge(chat::router())
        .merge(day_theme::router())
        .merge(activity_first::router())
        .merge(review::router());

    let api_doc = doc::get_docs();

    Router::new()
        .merge(health::router())
        .nest("/api", api_router)
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let doc = api_doc.clone();
                async move { Json(doc) }
            }),
        )
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
