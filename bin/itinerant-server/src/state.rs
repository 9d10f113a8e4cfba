//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use itinerant_core::{MemorySessionStore, Workflow};

use crate::config::Config;

/// The orchestrator as the server runs it.
pub type SessionWorkflow = Workflow<MemorySessionStore>;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Stage orchestrator over the in-memory session store.
    pub workflow: Arc<SessionWorkflow>,
}

impl AppState {
    pub fn new(config: Config, workflow: SessionWorkflow) -> Self {
        Self {
            config: Arc::new(config),
            workflow: Arc::new(workflow),
        }
    }
}
