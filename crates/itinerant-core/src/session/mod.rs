//! Session storage: the store contract, partial updates and the background
//! sweeper.

mod memory;
mod sweeper;

pub use memory::MemorySessionStore;
pub use sweeper::SessionSweeper;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use crate::conversation::ChatMessage;
use crate::model::{
    ExpandedDay, FinalPlan, GroupedDay, RestaurantSuggestion, Session, SkeletonDay,
    StagedSuggestions, SuggestedActivity, TripInfoPatch, WorkflowState,
};

/// Idle lifetime of a session unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Owner of every live [`Session`].
///
/// All reads hand out snapshots. A session whose idle time exceeds
/// [`SessionStore::ttl`] is treated as absent by every operation, whether or
/// not [`SessionStore::purge_expired`] has physically removed it yet.
pub trait SessionStore: Send + Sync + 'static {
    /// Allocate a fresh session in `INFO_GATHERING`.
    fn create(&self) -> impl Future<Output = Session> + Send;

    /// Snapshot of a live session; refreshes its idle timer.
    fn get(&self, id: &str) -> impl Future<Output = Option<Session>> + Send;

    /// Apply a shallow patch. `None` when the session is absent or expired.
    fn update(
        &self,
        id: &str,
        patch: SessionPatch,
    ) -> impl Future<Output = Option<Session>> + Send;

    /// Append one message; `false` when the session is absent.
    fn add_to_conversation(
        &self,
        id: &str,
        message: ChatMessage,
    ) -> impl Future<Output = bool> + Send;

    /// Insert or overwrite one expanded day. Staged suggestions for that day
    /// are cleared in the same step.
    fn set_expanded_day(
        &self,
        id: &str,
        day: ExpandedDay,
    ) -> impl Future<Output = Option<Session>> + Send;

    /// Remove a session. Deleting an unknown id is a no-op returning `false`.
    fn delete(&self, id: &str) -> impl Future<Output = bool> + Send;

    /// Physically remove every expired session, returning how many went.
    fn purge_expired(&self) -> impl Future<Output = usize> + Send;

    fn ttl(&self) -> Duration;
}

/// How a patch touches `tripInfo`.
#[derive(Debug, Clone, PartialEq)]
pub enum TripInfoUpdate {
    /// Field-by-field merge; absent fields are preserved.
    Merge(TripInfoPatch),
    /// Destination change: the destination is replaced outright, then the
    /// remaining fields of `patch` are merged as usual.
    Reset {
        destination: String,
        patch: TripInfoPatch,
    },
}

/// Shallow partial update of a [`Session`].
///
/// `None` leaves a field untouched. Nullable session fields use a nested
/// option so they can be explicitly cleared with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub trip_info: Option<TripInfoUpdate>,
    pub workflow_state: Option<WorkflowState>,
    pub skeleton: Option<Vec<SkeletonDay>>,
    pub suggested_activities: Option<Vec<SuggestedActivity>>,
    pub selected_activity_ids: Option<BTreeSet<String>>,
    pub grouped_days: Option<Vec<GroupedDay>>,
    pub restaurant_suggestions: Option<Vec<RestaurantSuggestion>>,
    pub selected_restaurant_ids: Option<BTreeSet<String>>,
    pub expanded_days: Option<BTreeMap<u32, ExpandedDay>>,
    /// Single-day upsert, applied after the other fields. Clears staged
    /// suggestions for the same day.
    pub expanded_day: Option<ExpandedDay>,
    pub current_expand_day: Option<Option<u32>>,
    pub current_suggestions: Option<Option<StagedSuggestions>>,
    pub final_plan: Option<Option<FinalPlan>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: WorkflowState) -> Self {
        self.workflow_state = Some(state);
        self
    }

    pub fn merge_trip_info(mut self, patch: TripInfoPatch) -> Self {
        self.trip_info = Some(TripInfoUpdate::Merge(patch));
        self
    }

    pub fn skeleton(mut self, days: Vec<SkeletonDay>) -> Self {
        self.skeleton = Some(days);
        self
    }

    pub fn suggested_activities(mut self, activities: Vec<SuggestedActivity>) -> Self {
        self.suggested_activities = Some(activities);
        self
    }

    pub fn selected_activity_ids(mut self, ids: BTreeSet<String>) -> Self {
        self.selected_activity_ids = Some(ids);
        self
    }

    pub fn grouped_days(mut self, days: Vec<GroupedDay>) -> Self {
        self.grouped_days = Some(days);
        self
    }

    pub fn restaurant_suggestions(mut self, restaurants: Vec<RestaurantSuggestion>) -> Self {
        self.restaurant_suggestions = Some(restaurants);
        self
    }

    pub fn selected_restaurant_ids(mut self, ids: BTreeSet<String>) -> Self {
        self.selected_restaurant_ids = Some(ids);
        self
    }

    pub fn expanded_days(mut self, days: BTreeMap<u32, ExpandedDay>) -> Self {
        self.expanded_days = Some(days);
        self
    }

    pub fn expanded_day(mut self, day: ExpandedDay) -> Self {
        self.expanded_day = Some(day);
        self
    }

    pub fn current_expand_day(mut self, day: Option<u32>) -> Self {
        self.current_expand_day = Some(day);
        self
    }

    pub fn current_suggestions(mut self, staged: Option<StagedSuggestions>) -> Self {
        self.current_suggestions = Some(staged);
        self
    }

    pub fn final_plan(mut self, plan: Option<FinalPlan>) -> Self {
        self.final_plan = Some(plan);
        self
    }

    /// The destination-change back-edge: replace the destination, merge
    /// whatever else was extracted, drop every stage artifact and return to
    /// `INFO_GATHERING`.
    pub fn destination_reset(destination: impl Into<String>, follow_up: TripInfoPatch) -> Self {
        Self {
            trip_info: Some(TripInfoUpdate::Reset {
                destination: destination.into(),
                patch: follow_up,
            }),
            workflow_state: Some(WorkflowState::InfoGathering),
            skeleton: Some(Vec::new()),
            suggested_activities: Some(Vec::new()),
            selected_activity_ids: Some(BTreeSet::new()),
            grouped_days: Some(Vec::new()),
            restaurant_suggestions: Some(Vec::new()),
            selected_restaurant_ids: Some(BTreeSet::new()),
            expanded_days: Some(BTreeMap::new()),
            expanded_day: None,
            current_expand_day: Some(None),
            current_suggestions: Some(None),
            final_plan: Some(None),
        }
    }

    /// Apply onto a session in place. Top-level fields are replaced;
    /// `tripInfo` goes through [`TripInfoUpdate`].
    pub fn apply(self, session: &mut Session) {
        let Self {
            trip_info,
            workflow_state,
            skeleton,
            suggested_activities,
            selected_activity_ids,
            grouped_days,
            restaurant_suggestions,
            selected_restaurant_ids,
            expanded_days,
            expanded_day,
            current_expand_day,
            current_suggestions,
            final_plan,
        } = self;

        match trip_info {
            Some(TripInfoUpdate::Merge(patch)) => session.trip_info.merge(patch),
            Some(TripInfoUpdate::Reset { destination, patch }) => {
                session.trip_info.destination = Some(destination);
                session.trip_info.merge(TripInfoPatch { destination: None, ..patch });
            }
            None => {}
        }
        if let Some(v) = workflow_state {
            session.workflow_state = v;
        }
        if let Some(v) = skeleton {
            session.skeleton = v;
        }
        if let Some(v) = suggested_activities {
            session.suggested_activities = v;
        }
        if let Some(v) = selected_activity_ids {
            session.selected_activity_ids = v;
        }
        if let Some(v) = grouped_days {
            session.grouped_days = v;
        }
        if let Some(v) = restaurant_suggestions {
            session.restaurant_suggestions = v;
        }
        if let Some(v) = selected_restaurant_ids {
            session.selected_restaurant_ids = v;
        }
        if let Some(v) = expanded_days {
            session.expanded_days = v;
        }
        if let Some(v) = current_expand_day {
            session.current_expand_day = v;
        }
        if let Some(v) = current_suggestions {
            session.current_suggestions = v;
        }
        if let Some(v) = final_plan {
            session.final_plan = v;
        }
        if let Some(day) = expanded_day {
            let day_number = day.day_number;
            session.expanded_days.insert(day_number, day);
            if session
                .current_suggestions
                .as_ref()
                .is_some_and(|staged| staged.day_number == day_number)
            {
                session.current_suggestions = None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{ActivityLevel, TripInfo};
    use chrono::Utc;

    #[test]
    fn day_upsert_lands_with_the_rest_of_the_patch() {
        let mut session = Session::new("s", Utc::now());
        session.workflow_state = WorkflowState::ExpandDay;
        session.current_suggestions = Some(StagedSuggestions {
            day_number: 2,
            suggestions: Default::default(),
        });

        SessionPatch::new()
            .current_expand_day(Some(3))
            .expanded_day(ExpandedDay { day_number: 2, theme: "Vatican".into(), ..Default::default() })
            .apply(&mut session);

        assert_eq!(session.expanded_days[&2].theme, "Vatican");
        assert_eq!(session.current_expand_day, Some(3));
        assert!(session.current_suggestions.is_none());

        // staged options for another day survive
        session.current_suggestions = Some(StagedSuggestions {
            day_number: 3,
            suggestions: Default::default(),
        });
        SessionPatch::new()
            .expanded_day(ExpandedDay { day_number: 1, ..Default::default() })
            .apply(&mut session);
        assert_eq!(session.current_suggestions.map(|s| s.day_number), Some(3));
    }

    #[test]
    fn reset_replaces_destination_and_clears_artifacts() {
        let mut session = Session::new("s", Utc::now());
        session.workflow_state = WorkflowState::ExpandDay;
        session.trip_info = TripInfo {
            destination: Some("Rome".into()),
            activity_level: ActivityLevel::Relaxed,
            travelers: 2,
            ..TripInfo::default()
        };
        session.expanded_days.insert(1, ExpandedDay { day_number: 1, ..Default::default() });
        session.current_expand_day = Some(2);

        SessionPatch::destination_reset(
            "Paris",
            TripInfoPatch { destination: Some("Lyon".into()), ..Default::default() },
        )
        .apply(&mut session);

        assert_eq!(session.trip_info.destination.as_deref(), Some("Paris"));
        assert_eq!(session.trip_info.activity_level, ActivityLevel::Relaxed);
        assert_eq!(session.trip_info.travelers, 2);
        assert_eq!(session.workflow_state, WorkflowState::InfoGathering);
        assert!(session.expanded_days.is_empty());
        assert_eq!(session.current_expand_day, None);
    }

    #[test]
    fn untouched_fields_survive_a_patch() {
        let mut session = Session::new("s", Utc::now());
        session.current_expand_day = Some(3);
        SessionPatch::new().state(WorkflowState::Skeleton).apply(&mut session);
        assert_eq!(session.current_expand_day, Some(3));
        assert_eq!(session.workflow_state, WorkflowState::Skeleton);
    }
}
