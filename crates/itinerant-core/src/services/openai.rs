//! Generation over any OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{GenerationError, GenerationService};
use crate::stage::{Stage, StageContext, StagePayload};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationService for OpenAiGenerator {
    #[instrument(skip_all, fields(stage = %context.request.stage()))]
    async fn generate(&self, context: &StageContext) -> Result<StagePayload, GenerationError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(GenerationError::Unavailable("no API key configured".into()));
        };
        let stage = context.request.stage();
        let context_json =
            serde_json::to_string(context).map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let body = json!({
            "model": self.config.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": instruction(stage) },
                { "role": "user", "content": context_json },
            ],
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, message });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("completion has no content".into()))?;

        debug!(bytes = content.len(), "completion received");
        parse_payload(stage, &content)
    }
}

/// Decode a completion body into the payload for `stage`. A missing `stage`
/// tag is filled in; a different one is left alone for the caller to reject.
pub fn parse_payload(stage: Stage, content: &str) -> Result<StagePayload, GenerationError> {
    let mut value: Value = serde_json::from_str(strip_fences(content))
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let Some(obj) = value.as_object_mut() else {
        return Err(GenerationError::Malformed("expected a JSON object".into()));
    };
    obj.entry("stage").or_insert_with(|| Value::String(stage.to_string()));
    serde_json::from_value(value).map_err(|e| GenerationError::Malformed(e.to_string()))
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn instruction(stage: Stage) -> &'static str {
    match stage {
        Stage::InfoGathering => {
            "You are a travel planner gathering trip details. Reply with JSON \
             {\"reply\": string, \"tripInfo\": {destination, startDate, endDate, \
             interests, activityLevel, travelers, budget}} containing only the \
             fields the user stated. Dates are YYYY-MM-DD."
        }
        Stage::Skeleton => {
            "Propose one theme per trip day. Reply with JSON {\"reply\": string, \
             \"days\": [{dayNumber, theme, highlights: [string]}]} with exactly \
             tripInfo.duration days."
        }
        Stage::ExpandDay => {
            "Offer options for the requested day. Reply with JSON {\"reply\": \
             string, \"suggestions\": {breakfast, lunch, dinner, morning, \
             afternoon, evening: [{name, type, description, duration, \
             estimatedCost}], notes}} with two or three options per list."
        }
        Stage::ModifyDay => {
            "Apply the instruction to the given day. Reply with JSON {\"reply\": \
             string, \"day\": {dayNumber, theme, breakfast, lunch, dinner, \
             morning, afternoon, evening, notes}}."
        }
        Stage::SuggestActivities => {
            "Suggest 12 to 20 activities for the destination. Reply with JSON \
             {\"reply\": string, \"activities\": [{id, name, type, description, \
             estimatedDuration, estimatedCost, bestTimeOfDay, neighborhood}]}."
        }
        Stage::GroupDays => {
            "Group the given activities into themed days by neighbourhood. Reply \
             with JSON {\"reply\": string, \"days\": [{dayNumber, theme, \
             activityIds: [string]}]}."
        }
        Stage::DayItinerary => {
            "Lay out each grouped day as a timed itinerary. Reply with JSON \
             {\"reply\": string, \"days\": [{dayNumber, theme, morning, \
             afternoon, evening: [{name, type, description, timeSlot}], notes}]}."
        }
        Stage::MealPreferences => {
            "Turn the dining preferences into restaurant search phrases. Reply \
             with JSON {\"reply\": string, \"queries\": [string]}."
        }
        Stage::StartReview => {
            "Summarise the plan and invite final changes. Reply with JSON \
             {\"reply\": string}."
        }
        Stage::ReviewChat => {
            "Answer the traveller and apply requested changes. Reply with JSON \
             {\"reply\": string, \"modifications\": [full day objects for changed \
             days only]}."
        }
        Stage::Finalize => {
            "Write the finished plan's framing. Reply with JSON {\"reply\": \
             string, \"title\": string, \"summary\": string, \"tips\": [string]}."
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::TripInfo;
    use crate::stage::StageRequest;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context() -> StageContext {
        StageContext {
            trip_info: TripInfo::default(),
            history: Vec::new(),
            request: StageRequest::StartReview { days: Vec::new() },
        }
    }

    fn generator(base_url: String, api_key: Option<&str>) -> OpenAiGenerator {
        OpenAiGenerator::new(OpenAiConfig {
            base_url,
            api_key: api_key.map(str::to_owned),
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn completion_content_becomes_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant",
                    "content": "{\"reply\": \"Looks great!\"}" } }]
            })))
            .mount(&server)
            .await;

        let payload = generator(server.uri(), Some("sk-test"))
            .generate(&context())
            .await
            .unwrap();
        assert_eq!(payload, StagePayload::StartReview { reply: "Looks great!".into() });
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = generator(server.uri(), Some("sk-test"))
            .generate(&context())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let err = generator("http://127.0.0.1:9".into(), None)
            .generate(&context())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let p = parse_payload(Stage::MealPreferences, "```json\n{\"queries\": [\"pizza\"]}\n```")
            .unwrap();
        assert_eq!(
            p,
            StagePayload::MealPreferences { reply: String::new(), queries: vec!["pizza".into()] }
        );
    }

    #[test]
    fn non_object_content_is_malformed() {
        let err = parse_payload(Stage::Finalize, "[1, 2]").unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }
}
