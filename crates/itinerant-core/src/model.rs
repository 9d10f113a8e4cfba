//! Session data model.
//!
//! Wire names follow the browser client: camelCase fields, `place_id` kept
//! verbatim, and SCREAMING_SNAKE_CASE workflow states.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::conversation::ConversationLog;
use crate::coords::{self, Coordinates};

// ── Workflow state ────────────────────────────────────────────────────────────

/// The closed set of workflow states shared by both planning flows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    #[default]
    InfoGathering,
    // day-theme flow
    Skeleton,
    ExpandDay,
    // activity-first flow
    SuggestActivities,
    GroupDays,
    DayItinerary,
    MealPreferences,
    // shared tail
    Review,
    Finalize,
}

// ── Trip info ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityLevel {
    Relaxed,
    #[default]
    Moderate,
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripInfo {
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Inclusive day count, derived from the dates whenever both are known.
    pub duration: Option<u32>,
    pub interests: Vec<String>,
    pub activity_level: ActivityLevel,
    pub travelers: u32,
    pub budget: Option<String>,
}

impl Default for TripInfo {
    fn default() -> Self {
        Self {
            destination: None,
            start_date: None,
            end_date: None,
            duration: None,
            interests: Vec::new(),
            activity_level: ActivityLevel::default(),
            travelers: 1,
            budget: None,
        }
    }
}

impl TripInfo {
    /// Merge a partial update field by field; absent fields keep their value.
    pub fn merge(&mut self, patch: TripInfoPatch) {
        let TripInfoPatch {
            destination,
            start_date,
            end_date,
            duration,
            interests,
            activity_level,
            travelers,
            budget,
        } = patch;

        if let Some(d) = destination.filter(|d| !d.trim().is_empty()) {
            self.destination = Some(d.trim().to_owned());
        }
        if start_date.is_some() {
            self.start_date = start_date;
        }
        if end_date.is_some() {
            self.end_date = end_date;
        }
        if let Some(d) = duration.filter(|d| *d > 0) {
            self.duration = Some(d);
        }
        if let Some(i) = interests {
            self.interests = i;
        }
        if let Some(level) = activity_level {
            self.activity_level = level;
        }
        if let Some(t) = travelers.filter(|t| *t > 0) {
            self.travelers = t;
        }
        if budget.is_some() {
            self.budget = budget;
        }
        self.derive_duration();
    }

    /// Recompute `duration` from the dates; leaves it alone when either date
    /// is missing or the range is inverted.
    pub fn derive_duration(&mut self) {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end >= start {
                self.duration = u32::try_from((end - start).num_days() + 1).ok();
            }
        }
    }

    /// Calendar date of a 1-based day number, when the start date is known.
    pub fn date_of_day(&self, day_number: u32) -> Option<NaiveDate> {
        let start = self.start_date?;
        start.checked_add_days(chrono::Days::new(u64::from(day_number.checked_sub(1)?)))
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref().filter(|d| !d.trim().is_empty())
    }
}

/// Partial [`TripInfo`] as extracted from a chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripInfoPatch {
    #[serde(deserialize_with = "lenient_string")]
    pub destination: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_u32")]
    pub duration: Option<u32>,
    pub interests: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_activity_level")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(deserialize_with = "lenient_u32")]
    pub travelers: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    pub budget: Option<String>,
}

// ── Stage artifacts ───────────────────────────────────────────────────────────

/// One named place in a day plan. Meals share the same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, alias = "timeSlot", deserialize_with = "lenient_string")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub estimated_cost: Option<String>,
    #[serde(default, deserialize_with = "coords::lenient_coordinates")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(rename = "place_id", default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

pub type Meal = Activity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonDay {
    pub day_number: u32,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub theme: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedDay {
    pub day_number: u32,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub theme: String,
    #[serde(default)]
    pub breakfast: Option<Meal>,
    #[serde(default)]
    pub lunch: Option<Meal>,
    #[serde(default)]
    pub dinner: Option<Meal>,
    #[serde(default)]
    pub morning: Vec<Activity>,
    #[serde(default)]
    pub afternoon: Vec<Activity>,
    #[serde(default)]
    pub evening: Vec<Activity>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: String,
}

impl ExpandedDay {
    /// Every place in the day, meals first, in a stable order.
    pub fn places(&self) -> impl Iterator<Item = &Activity> {
        self.breakfast
            .iter()
            .chain(self.lunch.iter())
            .chain(self.dinner.iter())
            .chain(self.morning.iter())
            .chain(self.afternoon.iter())
            .chain(self.evening.iter())
    }

    /// Mutable counterpart of [`Self::places`], same order.
    pub fn places_mut(&mut self) -> Vec<&mut Activity> {
        self.breakfast
            .iter_mut()
            .chain(self.lunch.iter_mut())
            .chain(self.dinner.iter_mut())
            .chain(self.morning.iter_mut())
            .chain(self.afternoon.iter_mut())
            .chain(self.evening.iter_mut())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedActivity {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub estimated_duration: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub estimated_cost: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub best_time_of_day: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub neighborhood: Option<String>,
    #[serde(default, deserialize_with = "coords::lenient_coordinates")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(rename = "place_id", default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl SuggestedActivity {
    /// Project into a day-plan [`Activity`], keeping any resolved location.
    pub fn to_activity(&self) -> Activity {
        Activity {
            name: self.name.clone(),
            kind: self.kind.clone(),
            description: self.description.clone(),
            duration: self.estimated_duration.clone(),
            estimated_cost: self.estimated_cost.clone(),
            coordinates: self.coordinates,
            rating: self.rating,
            place_id: self.place_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSuggestion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "place_id", default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub vicinity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedDay {
    pub day_number: u32,
    pub date: Option<NaiveDate>,
    pub theme: String,
    pub activities: Vec<SuggestedActivity>,
    pub restaurants: Vec<RestaurantSuggestion>,
}

/// Options offered for a single day before the traveller confirms it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaySuggestions {
    pub breakfast: Vec<Meal>,
    pub lunch: Vec<Meal>,
    pub dinner: Vec<Meal>,
    pub morning: Vec<Activity>,
    pub afternoon: Vec<Activity>,
    pub evening: Vec<Activity>,
    #[serde(deserialize_with = "lenient_text")]
    pub notes: String,
}

impl DaySuggestions {
    pub fn options(&self) -> impl Iterator<Item = &Activity> {
        self.breakfast
            .iter()
            .chain(&self.lunch)
            .chain(&self.dinner)
            .chain(&self.morning)
            .chain(&self.afternoon)
            .chain(&self.evening)
    }

    pub fn options_mut(&mut self) -> Vec<&mut Activity> {
        self.breakfast
            .iter_mut()
            .chain(self.lunch.iter_mut())
            .chain(self.dinner.iter_mut())
            .chain(self.morning.iter_mut())
            .chain(self.afternoon.iter_mut())
            .chain(self.evening.iter_mut())
            .collect()
    }
}

/// Suggestions staged for a day that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedSuggestions {
    pub day_number: u32,
    pub suggestions: DaySuggestions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPlan {
    pub title: String,
    pub summary: String,
    pub days: Vec<ExpandedDay>,
    pub grouped_days: Vec<GroupedDay>,
    pub tips: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One in-flight trip. Owned by a [`crate::SessionStore`]; callers only ever
/// hold snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub workflow_state: WorkflowState,
    pub trip_info: TripInfo,
    pub skeleton: Vec<SkeletonDay>,
    pub suggested_activities: Vec<SuggestedActivity>,
    pub selected_activity_ids: BTreeSet<String>,
    pub grouped_days: Vec<GroupedDay>,
    pub restaurant_suggestions: Vec<RestaurantSuggestion>,
    pub selected_restaurant_ids: BTreeSet<String>,
    pub expanded_days: BTreeMap<u32, ExpandedDay>,
    pub current_expand_day: Option<u32>,
    pub current_suggestions: Option<StagedSuggestions>,
    pub final_plan: Option<FinalPlan>,
    pub conversation_history: ConversationLog,
}

impl Session {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_accessed: now,
            workflow_state: WorkflowState::InfoGathering,
            trip_info: TripInfo::default(),
            skeleton: Vec::new(),
            suggested_activities: Vec::new(),
            selected_activity_ids: BTreeSet::new(),
            grouped_days: Vec::new(),
            restaurant_suggestions: Vec::new(),
            selected_restaurant_ids: BTreeSet::new(),
            expanded_days: BTreeMap::new(),
            current_expand_day: None,
            current_suggestions: None,
            final_plan: None,
            conversation_history: ConversationLog::default(),
        }
    }

    /// Day numbers of the active plan: the skeleton in the day-theme flow,
    /// the grouped days in the activity-first flow.
    pub fn planned_days(&self) -> Vec<u32> {
        if !self.skeleton.is_empty() {
            self.skeleton.iter().map(|d| d.day_number).collect()
        } else {
            self.grouped_days.iter().map(|d| d.day_number).collect()
        }
    }

    /// First planned day with no entry in `expanded_days`.
    pub fn next_unexpanded_day(&self) -> Option<u32> {
        self.planned_days()
            .into_iter()
            .find(|n| !self.expanded_days.contains_key(n))
    }

    pub fn skeleton_day(&self, day_number: u32) -> Option<&SkeletonDay> {
        self.skeleton.iter().find(|d| d.day_number == day_number)
    }
}

// ── Lenient field decoding ────────────────────────────────────────────────────
//
// Generated payloads are loosely typed; a single odd field should not sink
// an otherwise usable stage result.

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(Option::unwrap_or_default)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(coords::coerce_component))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.and_then(|s| {
        let s = s.trim();
        // Accept full timestamps by keeping only the date part.
        let date_part = s.get(..10).unwrap_or(s);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }))
}

fn lenient_activity_level<'de, D>(deserializer: D) -> Result<Option<ActivityLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
        "relaxed" | "low" | "slow" => Some(ActivityLevel::Relaxed),
        "moderate" | "medium" | "balanced" => Some(ActivityLevel::Moderate),
        "active" | "high" | "intense" => Some(ActivityLevel::Active),
        _ => None,
    }))
}
