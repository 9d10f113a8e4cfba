use utoipa::OpenApi;

use crate::routes::{activity_first, chat, day_theme, health, review, session};

#[derive(OpenApi)]
#[openapi(info(
    title = "itinerant-server",
    description = "Trip co-design session workflow API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(session::SessionApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(day_theme::DayThemeApi::openapi());
    root.merge(activity_first::ActivityFirstApi::openapi());
    root.merge(review::ReviewApi::openapi());
    root
}
