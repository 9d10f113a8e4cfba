use thiserror::Error;

use crate::model::WorkflowState;
use crate::services::GenerationError;

/// Errors produced by workflow operations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// Input is malformed or refers to something that does not exist in the
    /// session (an unknown id, a day outside the plan).
    #[error("{0}")]
    Validation(String),

    /// The operation is not permitted from the session's current state.
    #[error("'{operation}' is not allowed in state {current} (allowed from: {})", join_states(.allowed))]
    State {
        operation: String,
        current: WorkflowState,
        allowed: Vec<WorkflowState>,
    },

    /// The referenced session does not exist or has expired.
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    /// A collaborator failed or returned something unusable.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(session_id: impl Into<String>) -> Self {
        Self::NotFound { session_id: session_id.into() }
    }

    /// The state the session was in when the operation was refused, if this
    /// is a state error.
    pub fn current_state(&self) -> Option<WorkflowState> {
        match self {
            Self::State { current, .. } => Some(*current),
            _ => None,
        }
    }
}

impl From<GenerationError> for WorkflowError {
    fn from(e: GenerationError) -> Self {
        Self::Upstream(e.to_string())
    }
}

fn join_states(states: &[WorkflowState]) -> String {
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
