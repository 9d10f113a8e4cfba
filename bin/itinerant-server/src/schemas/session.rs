use itinerant_core::map::MapView;
use itinerant_core::{Role, Session, StageOutcome, WorkflowState};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Body shared by every operation that only needs the session id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

/// Answer of every stage operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    pub success: bool,
    pub session_id: String,
    #[schema(value_type = String, example = "SKELETON")]
    pub workflow_state: WorkflowState,
    /// The assistant's reply for this step.
    pub message: String,
    /// Full session snapshot after the step.
    #[schema(value_type = Object)]
    pub session: Session,
}

impl From<StageOutcome> for StageResponse {
    fn from(outcome: StageOutcome) -> Self {
        Self {
            success: true,
            session_id: outcome.session.session_id.clone(),
            workflow_state: outcome.session.workflow_state,
            message: outcome.reply,
            session: outcome.session,
        }
    }
}

impl From<Session> for StageResponse {
    /// A snapshot with the latest assistant turn as its message.
    fn from(session: Session) -> Self {
        let message = session
            .conversation_history
            .entries()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Self {
            success: true,
            session_id: session.session_id.clone(),
            workflow_state: session.workflow_state,
            message,
            session,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub session: Session,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    /// `false` when there was nothing to delete.
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapResponse {
    pub success: bool,
    pub session_id: String,
    #[schema(value_type = Object)]
    pub map: MapView,
}
