//! Day-theme flow: skeleton, per-day expansion and confirmation.

use std::collections::BTreeMap;

use tracing::info;

use super::activity_first::place_restaurants;
use super::{
    Operation, StageOutcome, Workflow, carry_over, check, require_destination, unexpected,
};
use crate::error::WorkflowError;
use crate::model::{
    Activity, DaySuggestions, ExpandedDay, Meal, SkeletonDay, StagedSuggestions, WorkflowState,
};
use crate::session::{SessionPatch, SessionStore};
use crate::stage::{Stage, StagePayload, StageRequest};

/// The traveller's picks for a staged day, by option name. Omitted entries
/// fall back to the first option offered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaySelections {
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
    pub morning: Option<Vec<String>>,
    pub afternoon: Option<Vec<String>>,
    pub evening: Option<Vec<String>>,
}

impl<S: SessionStore> Workflow<S> {
    pub async fn generate_skeleton(&self, id: &str) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::GenerateSkeleton, session.workflow_state)?;
        require_destination(&session)?;
        let duration = session
            .trip_info
            .duration
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                WorkflowError::validation("the trip length is not known yet; share your travel dates")
            })?;

        let (reply, days) = match self.call(&session, StageRequest::Skeleton {}).await? {
            StagePayload::Skeleton { reply, days } => (reply, days),
            other => return Err(unexpected(Stage::Skeleton, &other)),
        };
        if days.len() < duration as usize {
            return Err(WorkflowError::Upstream(format!(
                "skeleton has {} days but the trip lasts {duration}",
                days.len()
            )));
        }

        let skeleton: Vec<SkeletonDay> = days
            .into_iter()
            .take(duration as usize)
            .zip(1..)
            .map(|(mut day, n)| {
                day.day_number = n;
                day.date = session.trip_info.date_of_day(n).or(day.date);
                day
            })
            .collect();
        info!(session_id = %id, days = skeleton.len(), "skeleton generated");

        let patch = SessionPatch::new()
            .state(next)
            .skeleton(skeleton)
            .expanded_days(BTreeMap::new())
            .current_expand_day(Some(1))
            .current_suggestions(None)
            .final_plan(None);
        self.commit(id, patch, None, reply).await
    }

    /// Stage options for one day. Defaults to the day the flow is on.
    pub async fn expand_day(
        &self,
        id: &str,
        day_number: Option<u32>,
    ) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::ExpandDay, session.workflow_state)?;
        let destination = require_destination(&session)?;

        let day_number = day_number
            .or(session.current_expand_day)
            .or_else(|| session.next_unexpanded_day())
            .ok_or_else(|| WorkflowError::validation("every day is already planned"))?;
        let day = session
            .skeleton_day(day_number)
            .cloned()
            .ok_or_else(|| WorkflowError::validation(format!("day {day_number} is not part of the trip")))?;
        if session.expanded_days.contains_key(&day_number) {
            return Err(WorkflowError::validation(format!(
                "day {day_number} is already planned; modify it instead"
            )));
        }

        let request = StageRequest::ExpandDay {
            day,
            previous_days: session
                .expanded_days
                .range(..day_number)
                .map(|(_, d)| d.clone())
                .collect(),
        };
        let (reply, mut suggestions) = match self.call(&session, request).await? {
            StagePayload::ExpandDay { reply, suggestions } => (reply, suggestions),
            other => return Err(unexpected(Stage::ExpandDay, &other)),
        };
        self.enricher
            .enrich(suggestions.options_mut(), &destination, None)
            .await;
        info!(
            session_id = %id,
            day = day_number,
            options = suggestions.options().count(),
            "day suggestions staged"
        );

        let patch = SessionPatch::new()
            .state(next)
            .current_expand_day(Some(day_number))
            .current_suggestions(Some(StagedSuggestions { day_number, suggestions }));
        self.commit(id, patch, None, reply).await
    }

    /// Turn the staged options for `day_number` into a planned day.
    pub async fn confirm_day(
        &self,
        id: &str,
        day_number: u32,
        selections: Option<DaySelections>,
    ) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::ConfirmDay, session.workflow_state)?;
        let staged = session
            .current_suggestions
            .as_ref()
            .filter(|s| s.day_number == day_number)
            .ok_or_else(|| {
                WorkflowError::validation(format!("no suggestions are waiting for day {day_number}"))
            })?;
        let skeleton_day = session.skeleton_day(day_number).ok_or_else(|| {
            WorkflowError::validation(format!("day {day_number} is not part of the trip"))
        })?;

        let selections = selections.unwrap_or_default();
        let day = assemble_day(skeleton_day, &staged.suggestions, &selections)?;

        let following = session
            .planned_days()
            .into_iter()
            .find(|n| *n != day_number && !session.expanded_days.contains_key(n));

        info!(session_id = %id, day = day_number, next_day = ?following, "day confirmed");

        let reply = match following {
            Some(n) => format!("Day {day_number} is confirmed. Let's plan day {n} next."),
            None => format!(
                "Day {day_number} is confirmed. Every day is planned; start the review when you're ready."
            ),
        };
        let patch = SessionPatch::new()
            .state(next)
            .expanded_day(day)
            .current_expand_day(following);
        self.commit(id, patch, None, reply).await
    }

    /// Regenerate an already planned day from a free-text instruction.
    pub async fn modify_day(
        &self,
        id: &str,
        day_number: u32,
        instruction: &str,
    ) -> Result<StageOutcome, WorkflowError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(WorkflowError::validation("instruction must not be empty"));
        }
        let session = self.load(id).await?;
        check(Operation::ModifyDay, session.workflow_state)?;
        let original = session
            .expanded_days
            .get(&day_number)
            .cloned()
            .ok_or_else(|| WorkflowError::validation(format!("day {day_number} has not been planned yet")))?;

        let request = StageRequest::ModifyDay {
            day: original.clone(),
            instruction: instruction.to_owned(),
        };
        let (reply, replacement) = match self.call(&session, request).await? {
            StagePayload::ModifyDay { reply, day } => (reply, day),
            other => return Err(unexpected(Stage::ModifyDay, &other)),
        };
        let destination = session.trip_info.destination().unwrap_or_default().to_owned();
        let day = self
            .enrich_day(carry_over(&original, replacement), &destination)
            .await;

        info!(session_id = %id, day = day_number, "day modified");
        let patch = SessionPatch::new().expanded_day(day);
        self.commit(id, patch, Some(instruction), reply).await
    }

    /// Move to `REVIEW`. The day-theme flow needs every day planned; the
    /// activity-first flow spreads the chosen restaurants over its days.
    pub async fn start_review(
        &self,
        id: &str,
        selected_restaurant_ids: Option<Vec<String>>,
    ) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::StartReview, session.workflow_state)?;

        let mut patch = SessionPatch::new().state(next);
        if session.workflow_state == WorkflowState::ExpandDay {
            let missing: Vec<String> = session
                .skeleton
                .iter()
                .map(|d| d.day_number)
                .filter(|n| !session.expanded_days.contains_key(n))
                .map(|n| n.to_string())
                .collect();
            if session.skeleton.is_empty() || !missing.is_empty() {
                return Err(WorkflowError::validation(format!(
                    "every day must be planned before the review (missing: {})",
                    missing.join(", ")
                )));
            }
        } else {
            let (grouped_days, selected) =
                place_restaurants(&session, selected_restaurant_ids.unwrap_or_default())?;
            patch = patch.grouped_days(grouped_days).selected_restaurant_ids(selected);
        }

        let request = StageRequest::StartReview {
            days: session.expanded_days.values().cloned().collect(),
        };
        let reply = match self.call(&session, request).await? {
            StagePayload::StartReview { reply } => reply,
            other => return Err(unexpected(Stage::StartReview, &other)),
        };
        info!(session_id = %id, "review started");
        self.commit(id, patch, None, reply).await
    }
}

/// Build the planned day from the staged options and the traveller's picks.
fn assemble_day(
    skeleton_day: &SkeletonDay,
    options: &DaySuggestions,
    picks: &DaySelections,
) -> Result<ExpandedDay, WorkflowError> {
    Ok(ExpandedDay {
        day_number: skeleton_day.day_number,
        date: skeleton_day.date,
        theme: skeleton_day.theme.clone(),
        breakfast: pick_meal("breakfast", &options.breakfast, picks.breakfast.as_deref())?,
        lunch: pick_meal("lunch", &options.lunch, picks.lunch.as_deref())?,
        dinner: pick_meal("dinner", &options.dinner, picks.dinner.as_deref())?,
        morning: pick_period("morning", &options.morning, picks.morning.as_deref())?,
        afternoon: pick_period("afternoon", &options.afternoon, picks.afternoon.as_deref())?,
        evening: pick_period("evening", &options.evening, picks.evening.as_deref())?,
        notes: options.notes.clone(),
    })
}

fn find_option<'a>(slot: &str, options: &'a [Activity], name: &str) -> Result<&'a Activity, WorkflowError> {
    let wanted = name.trim().to_lowercase();
    options
        .iter()
        .find(|o| o.name.trim().to_lowercase() == wanted)
        .ok_or_else(|| WorkflowError::validation(format!("'{name}' is not one of the {slot} options")))
}

fn pick_meal(slot: &str, options: &[Meal], pick: Option<&str>) -> Result<Option<Meal>, WorkflowError> {
    match pick {
        Some(name) => find_option(slot, options, name).map(|m| Some(m.clone())),
        None => Ok(options.first().cloned()),
    }
}

fn pick_period(
    slot: &str,
    options: &[Activity],
    picks: Option<&[String]>,
) -> Result<Vec<Activity>, WorkflowError> {
    match picks {
        Some(names) => names
            .iter()
            .map(|name| find_option(slot, options, name).cloned())
            .collect(),
        None => Ok(options.first().cloned().into_iter().collect()),
    }
}
