//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use itinerant_core::services::OpenAiConfig;
use itinerant_core::session::DEFAULT_TTL;
use itinerant_core::WorkflowConfig;

/// Runtime configuration for itinerant-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; without API keys the collaborators report themselves as
/// unavailable instead of failing at boot.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins. `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Idle lifetime of a planning session.
    pub session_ttl: Duration,

    /// How often expired sessions are physically removed.
    pub sweep_interval: Duration,

    /// Concurrent lookups per enrichment batch.
    pub enrich_batch_size: usize,

    pub history_window: usize,

    pub restaurant_radius_m: u32,

    /// Enables Places search and Geocoding when present.
    pub google_maps_api_key: Option<String>,

    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_timeout: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let session_ttl = Duration::from_secs(parse_env(
            "ITINERANT_SESSION_TTL_SECS",
            DEFAULT_TTL.as_secs(),
        ))
        .max(Duration::from_secs(1));
        let sweep_default = (session_ttl.as_secs() / 6).max(1);
        let defaults = WorkflowConfig::default();
        let llm = OpenAiConfig::default();

        Self {
            bind_address: env_or("ITINERANT_BIND", "0.0.0.0:3000"),
            log_level: env_or("ITINERANT_LOG", "info"),
            log_json: std::env::var("ITINERANT_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: env_opt("ITINERANT_CORS_ORIGINS"),
            session_ttl,
            sweep_interval: Duration::from_secs(
                parse_env("ITINERANT_SWEEP_INTERVAL_SECS", sweep_default).max(1),
            ),
            enrich_batch_size: parse_env("ITINERANT_ENRICH_BATCH_SIZE", 5usize).max(1),
            history_window: parse_env("ITINERANT_HISTORY_WINDOW", defaults.history_window),
            restaurant_radius_m: parse_env(
                "ITINERANT_RESTAURANT_RADIUS_M",
                defaults.restaurant_radius_m,
            ),
            google_maps_api_key: env_opt("GOOGLE_MAPS_API_KEY"),
            llm_base_url: env_or("ITINERANT_LLM_BASE_URL", &llm.base_url),
            llm_api_key: env_opt("ITINERANT_LLM_API_KEY"),
            llm_model: env_or("ITINERANT_LLM_MODEL", &llm.model),
            llm_timeout: Duration::from_secs(parse_env(
                "ITINERANT_LLM_TIMEOUT_SECS",
                llm.timeout.as_secs(),
            )),
        }
    }

    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            history_window: self.history_window,
            restaurant_radius_m: self.restaurant_radius_m,
        }
    }

    pub fn generation(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            timeout: self.llm_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let llm = OpenAiConfig::default();
        let defaults = WorkflowConfig::default();
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            session_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_TTL / 6,
            enrich_batch_size: 5,
            history_window: defaults.history_window,
            restaurant_radius_m: defaults.restaurant_radius_m,
            google_maps_api_key: None,
            llm_base_url: llm.base_url,
            llm_api_key: None,
            llm_model: llm.model,
            llm_timeout: llm.timeout,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Unset and blank values are both treated as absent.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
