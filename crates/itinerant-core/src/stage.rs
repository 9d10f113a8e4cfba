//! Stage contracts exchanged with the generation collaborator.
//!
//! Every call carries a [`StageContext`] whose request names the stage; the
//! answer is a [`StagePayload`] tagged with the same stage.

use serde::{Deserialize, Serialize};

use crate::conversation::ChatMessage;
use crate::model::{
    DaySuggestions, ExpandedDay, GroupedDay, SkeletonDay, SuggestedActivity, TripInfo,
    TripInfoPatch,
};
use crate::services::GenerationError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    InfoGathering,
    Skeleton,
    ExpandDay,
    ModifyDay,
    SuggestActivities,
    GroupDays,
    DayItinerary,
    MealPreferences,
    StartReview,
    ReviewChat,
    Finalize,
}

/// Everything the generator sees for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageContext {
    pub trip_info: TripInfo,
    /// Most recent conversation turns, oldest first.
    pub history: Vec<ChatMessage>,
    pub request: StageRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StageRequest {
    InfoGathering {
        message: String,
    },
    Skeleton {},
    ExpandDay {
        day: SkeletonDay,
        previous_days: Vec<ExpandedDay>,
    },
    ModifyDay {
        day: ExpandedDay,
        instruction: String,
    },
    SuggestActivities {},
    GroupDays {
        activities: Vec<SuggestedActivity>,
    },
    DayItinerary {
        grouped_days: Vec<GroupedDay>,
    },
    MealPreferences {
        preferences: Option<String>,
    },
    StartReview {
        days: Vec<ExpandedDay>,
    },
    ReviewChat {
        message: String,
        days: Vec<ExpandedDay>,
    },
    Finalize {
        days: Vec<ExpandedDay>,
        grouped_days: Vec<GroupedDay>,
    },
}

impl StageRequest {
    pub fn stage(&self) -> Stage {
        match self {
            Self::InfoGathering { .. } => Stage::InfoGathering,
            Self::Skeleton {} => Stage::Skeleton,
            Self::ExpandDay { .. } => Stage::ExpandDay,
            Self::ModifyDay { .. } => Stage::ModifyDay,
            Self::SuggestActivities {} => Stage::SuggestActivities,
            Self::GroupDays { .. } => Stage::GroupDays,
            Self::DayItinerary { .. } => Stage::DayItinerary,
            Self::MealPreferences { .. } => Stage::MealPreferences,
            Self::StartReview { .. } => Stage::StartReview,
            Self::ReviewChat { .. } => Stage::ReviewChat,
            Self::Finalize { .. } => Stage::Finalize,
        }
    }
}

/// A generator's proposal for one grouped day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayGroup {
    pub day_number: u32,
    pub theme: String,
    pub activity_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StagePayload {
    InfoGathering {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        trip_info: TripInfoPatch,
    },
    Skeleton {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        days: Vec<SkeletonDay>,
    },
    ExpandDay {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        suggestions: DaySuggestions,
    },
    ModifyDay {
        #[serde(default)]
        reply: String,
        day: ExpandedDay,
    },
    SuggestActivities {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        activities: Vec<SuggestedActivity>,
    },
    GroupDays {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        days: Vec<DayGroup>,
    },
    DayItinerary {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        days: Vec<ExpandedDay>,
    },
    MealPreferences {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        queries: Vec<String>,
    },
    StartReview {
        #[serde(default)]
        reply: String,
    },
    ReviewChat {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        modifications: Vec<ExpandedDay>,
    },
    Finalize {
        #[serde(default)]
        reply: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        summary: String,
        #[serde(default)]
        tips: Vec<String>,
    },
}

impl StagePayload {
    pub fn stage(&self) -> Stage {
        match self {
            Self::InfoGathering { .. } => Stage::InfoGathering,
            Self::Skeleton { .. } => Stage::Skeleton,
            Self::ExpandDay { .. } => Stage::ExpandDay,
            Self::ModifyDay { .. } => Stage::ModifyDay,
            Self::SuggestActivities { .. } => Stage::SuggestActivities,
            Self::GroupDays { .. } => Stage::GroupDays,
            Self::DayItinerary { .. } => Stage::DayItinerary,
            Self::MealPreferences { .. } => Stage::MealPreferences,
            Self::StartReview { .. } => Stage::StartReview,
            Self::ReviewChat { .. } => Stage::ReviewChat,
            Self::Finalize { .. } => Stage::Finalize,
        }
    }

    /// The error to raise when this payload answered the wrong request.
    pub fn mismatch(&self, expected: Stage) -> GenerationError {
        GenerationError::WrongStage { expected, actual: self.stage() }
    }
}
