use itinerant_core::{ActivityMove, DaySelections};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExpandDayRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    /// Defaults to the day the flow is on.
    #[validate(range(min = 1))]
    pub day_number: Option<u32>,
}

/// Picks by option name; omitted slots take the first option.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionsBody {
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
    pub morning: Option<Vec<String>>,
    pub afternoon: Option<Vec<String>>,
    pub evening: Option<Vec<String>>,
}

impl From<SelectionsBody> for DaySelections {
    fn from(body: SelectionsBody) -> Self {
        DaySelections {
            breakfast: body.breakfast,
            lunch: body.lunch,
            dinner: body.dinner,
            morning: body.morning,
            afternoon: body.afternoon,
            evening: body.evening,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDayRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(range(min = 1))]
    pub day_number: u32,
    #[serde(default)]
    pub selections: Option<SelectionsBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModifyDayRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(range(min = 1))]
    pub day_number: u32,
    #[validate(length(min = 1, max = 4000))]
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GroupDaysRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub selected_activity_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoveBody {
    #[validate(length(min = 1))]
    pub activity_id: String,
    #[validate(range(min = 1))]
    pub to_day: u32,
}

impl From<MoveBody> for ActivityMove {
    fn from(body: MoveBody) -> Self {
        ActivityMove {
            activity_id: body.activity_id,
            to_day: body.to_day,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDayGroupingRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[serde(default)]
    #[validate(nested)]
    pub moves: Vec<MoveBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPreferencesRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(length(max = 4000))]
    pub preferences: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartReviewRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    /// Activity-first flow only: restaurants to spread over the days.
    pub selected_restaurant_ids: Option<Vec<String>>,
}
