//! The stage orchestrator.
//!
//! Every operation follows the same shape: load the session, check the
//! transition table, call the generator with a [`StageContext`], enrich
//! whatever came back, then commit one patch and the conversation turns.
//! A failure before the commit leaves the session untouched.

mod activity_first;
mod day_theme;
pub mod destination;
pub mod transitions;

pub use activity_first::ActivityMove;
pub use day_theme::DaySelections;
pub use transitions::{Operation, check};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::conversation::ChatMessage;
use crate::enrich::Enricher;
use crate::error::WorkflowError;
use crate::map::{self, MapView};
use crate::model::{ExpandedDay, FinalPlan, Session, TripInfoPatch, WorkflowState};
use crate::services::GenerationService;
use crate::session::{SessionPatch, SessionStore};
use crate::stage::{Stage, StageContext, StagePayload, StageRequest};

const WELCOME: &str = "Hi! Where would you like to go, and when? Tell me about your \
    dates, who is travelling and what you enjoy, and I'll sketch a plan with you.";

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Conversation turns forwarded with each generation call.
    pub history_window: usize,
    /// Search radius around a day's activities when looking for restaurants.
    pub restaurant_radius_m: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            restaurant_radius_m: 1500,
        }
    }
}

/// What a successful stage operation hands back to the caller.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Natural-language reply appended to the conversation.
    pub reply: String,
    pub session: Session,
}

pub struct Workflow<S> {
    store: Arc<S>,
    generator: Arc<dyn GenerationService>,
    enricher: Enricher,
    config: WorkflowConfig,
}

impl<S: SessionStore> Workflow<S> {
    pub fn new(store: Arc<S>, generator: Arc<dyn GenerationService>, enricher: Enricher) -> Self {
        Self {
            store,
            generator,
            enricher,
            config: WorkflowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ── Session lifecycle ────────────────────────────────────────────────────

    pub async fn start_session(&self) -> Result<Session, WorkflowError> {
        let session = self.store.create().await;
        let id = session.session_id;
        self.store
            .add_to_conversation(&id, ChatMessage::assistant(WELCOME))
            .await;
        info!(session_id = %id, "session started");
        self.load(&id).await
    }

    pub async fn session(&self, id: &str) -> Result<Session, WorkflowError> {
        self.load(id).await
    }

    pub async fn delete_session(&self, id: &str) -> bool {
        let removed = self.store.delete(id).await;
        if removed {
            info!(session_id = %id, "session deleted");
        }
        removed
    }

    pub async fn map_view(&self, id: &str) -> Result<MapView, WorkflowError> {
        let session = self.load(id).await?;
        Ok(map::build(&session))
    }

    // ── Chat ─────────────────────────────────────────────────────────────────

    /// Free-text chat. A destination change is honoured from any state;
    /// otherwise chat gathers trip details in `INFO_GATHERING` and edits
    /// planned days in `REVIEW`. Once the plan is in review only an explicit
    /// "change the destination to ..." resets it.
    pub async fn chat(&self, id: &str, message: &str) -> Result<StageOutcome, WorkflowError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(WorkflowError::validation("message must not be empty"));
        }
        let session = self.load(id).await?;

        let detected = match session.workflow_state {
            WorkflowState::Review | WorkflowState::Finalize => destination::detect_explicit(message),
            _ => destination::detect(message),
        };
        if let Some(destination) = detected {
            let unchanged = session
                .trip_info
                .destination()
                .is_some_and(|current| current.to_lowercase() == destination.to_lowercase());
            if !unchanged {
                return self.reset_destination(session, message, destination).await;
            }
        }

        check(Operation::Chat, session.workflow_state)?;
        match session.workflow_state {
            WorkflowState::Review => self.review_chat(session, message).await,
            _ => self.gather_info(session, message).await,
        }
    }

    async fn gather_info(&self, session: Session, message: &str) -> Result<StageOutcome, WorkflowError> {
        let request = StageRequest::InfoGathering { message: message.to_owned() };
        let (reply, trip_info) = match self.call(&session, request).await? {
            StagePayload::InfoGathering { reply, trip_info } => (reply, trip_info),
            other => return Err(unexpected(Stage::InfoGathering, &other)),
        };
        debug!(session_id = %session.session_id, "trip details extracted");
        let patch = SessionPatch::new().merge_trip_info(trip_info);
        self.commit(&session.session_id, patch, Some(message), reply).await
    }

    async fn reset_destination(
        &self,
        session: Session,
        message: &str,
        destination: String,
    ) -> Result<StageOutcome, WorkflowError> {
        check(Operation::ResetDestination, session.workflow_state)?;
        info!(
            session_id = %session.session_id,
            from = session.trip_info.destination().unwrap_or("-"),
            to = %destination,
            state = %session.workflow_state,
            "destination changed, resetting plan"
        );

        // Generate against the trip as it will look after the reset, but only
        // write once the call has succeeded.
        let mut preview = session.clone();
        SessionPatch::destination_reset(destination.clone(), TripInfoPatch::default())
            .apply(&mut preview);

        let request = StageRequest::InfoGathering { message: message.to_owned() };
        let (reply, trip_info) = match self.call(&preview, request).await? {
            StagePayload::InfoGathering { reply, trip_info } => (reply, trip_info),
            other => return Err(unexpected(Stage::InfoGathering, &other)),
        };
        let patch = SessionPatch::destination_reset(destination, trip_info);
        self.commit(&session.session_id, patch, Some(message), reply).await
    }

    async fn review_chat(&self, session: Session, message: &str) -> Result<StageOutcome, WorkflowError> {
        let request = StageRequest::ReviewChat {
            message: message.to_owned(),
            days: session.expanded_days.values().cloned().collect(),
        };
        let (reply, modifications) = match self.call(&session, request).await? {
            StagePayload::ReviewChat { reply, modifications } => (reply, modifications),
            other => return Err(unexpected(Stage::ReviewChat, &other)),
        };

        let destination = session.trip_info.destination().unwrap_or_default().to_owned();
        let mut expanded = session.expanded_days.clone();
        let mut changed = 0usize;
        for replacement in modifications {
            let Some(original) = expanded.get(&replacement.day_number) else {
                debug!(day = replacement.day_number, "ignoring modification for an unplanned day");
                continue;
            };
            let day = carry_over(original, replacement);
            let day = self.enrich_day(day, &destination).await;
            expanded.insert(day.day_number, day);
            changed += 1;
        }
        debug!(session_id = %session.session_id, changed, "review chat applied");

        let patch = SessionPatch::new().expanded_days(expanded);
        self.commit(&session.session_id, patch, Some(message), reply).await
    }

    // ── Finalize ─────────────────────────────────────────────────────────────

    pub async fn finalize(&self, id: &str) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::Finalize, session.workflow_state)?;

        let days: Vec<ExpandedDay> = session.expanded_days.values().cloned().collect();
        let request = StageRequest::Finalize {
            days: days.clone(),
            grouped_days: session.grouped_days.clone(),
        };
        let (reply, title, summary, tips) = match self.call(&session, request).await? {
            StagePayload::Finalize { reply, title, summary, tips } => (reply, title, summary, tips),
            other => return Err(unexpected(Stage::Finalize, &other)),
        };

        let title = match title.trim() {
            "" => format!(
                "{} itinerary",
                session.trip_info.destination().unwrap_or("Trip")
            ),
            t => t.to_owned(),
        };
        let plan = FinalPlan {
            title,
            summary,
            days,
            grouped_days: session.grouped_days.clone(),
            tips,
            generated_at: Utc::now(),
        };
        info!(session_id = %id, days = plan.days.len(), "plan finalized");

        let patch = SessionPatch::new().state(next).final_plan(Some(plan));
        self.commit(id, patch, None, reply).await
    }

    // ── Shared plumbing ──────────────────────────────────────────────────────

    async fn load(&self, id: &str) -> Result<Session, WorkflowError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| WorkflowError::not_found(id))
    }

    /// One generation round trip for `session`.
    async fn call(&self, session: &Session, request: StageRequest) -> Result<StagePayload, WorkflowError> {
        let stage = request.stage();
        let context = StageContext {
            trip_info: session.trip_info.clone(),
            history: session
                .conversation_history
                .tail(self.config.history_window)
                .to_vec(),
            request,
        };
        debug!(session_id = %session.session_id, %stage, "calling generation service");
        self.generator.generate(&context).await.map_err(|e| {
            warn!(session_id = %session.session_id, %stage, error = %e, "generation failed");
            WorkflowError::from(e)
        })
    }

    /// Write `patch`, then the user turn (if any) and the reply.
    async fn commit(
        &self,
        id: &str,
        patch: SessionPatch,
        user_message: Option<&str>,
        reply: String,
    ) -> Result<StageOutcome, WorkflowError> {
        self.store
            .update(id, patch)
            .await
            .ok_or_else(|| WorkflowError::not_found(id))?;
        if let Some(message) = user_message {
            self.store
                .add_to_conversation(id, ChatMessage::user(message))
                .await;
        }
        if !reply.trim().is_empty() {
            self.store
                .add_to_conversation(id, ChatMessage::assistant(reply.clone()))
                .await;
        }
        let session = self.load(id).await?;
        Ok(StageOutcome { reply, session })
    }

    /// Resolve every meal and activity of a day.
    async fn enrich_day(&self, mut day: ExpandedDay, destination: &str) -> ExpandedDay {
        self.enricher
            .enrich(day.places_mut(), destination, None)
            .await;
        day
    }
}

fn unexpected(expected: Stage, payload: &StagePayload) -> WorkflowError {
    payload.mismatch(expected).into()
}

fn require_destination(session: &Session) -> Result<String, WorkflowError> {
    session
        .trip_info
        .destination()
        .map(str::to_owned)
        .ok_or_else(|| WorkflowError::validation("the destination is not known yet"))
}

/// Keep the identity of `original` on a regenerated day: number and date
/// always, theme and notes when the replacement leaves them blank.
fn carry_over(original: &ExpandedDay, mut replacement: ExpandedDay) -> ExpandedDay {
    replacement.day_number = original.day_number;
    replacement.date = original.date.or(replacement.date);
    if replacement.theme.trim().is_empty() {
        replacement.theme = original.theme.clone();
    }
    if replacement.notes.trim().is_empty() {
        replacement.notes = original.notes.clone();
    }
    replacement
}

#[cfg(test)]
mod tests;
