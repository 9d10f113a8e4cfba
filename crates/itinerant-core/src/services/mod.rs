//! Collaborator boundary: text generation, place search and geocoding.
//!
//! The workflow only ever talks to these traits; `google` and `openai` hold
//! the HTTP implementations wired in by the server.

pub mod google;
pub mod openai;

pub use google::{GoogleGeocoder, GooglePlaces};
pub use openai::{OpenAiConfig, OpenAiGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::Coordinates;
use crate::stage::{Stage, StageContext, StagePayload};

/// Errors produced by place search and geocoding.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("lookup provider returned {status}: {message}")]
    Status { status: String, message: String },

    #[error("malformed lookup response: {0}")]
    Malformed(String),
}

/// Errors produced by the generation collaborator.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(String),

    #[error("generation endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed generation output: {0}")]
    Malformed(String),

    /// The payload answers a different stage than the one requested.
    #[error("expected a '{expected}' payload, got '{actual}'")]
    WrongStage { expected: Stage, actual: Stage },

    #[error("generation service unavailable: {0}")]
    Unavailable(String),
}

/// A place search. `center` + `radius_m` scope the search when present.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub text: String,
    pub center: Option<Coordinates>,
    pub radius_m: Option<u32>,
    /// Provider place type, e.g. `restaurant`.
    pub category: Option<String>,
}

impl PlaceQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            center: None,
            radius_m: None,
            category: None,
        }
    }

    pub fn near(mut self, center: Coordinates, radius_m: u32) -> Self {
        self.center = Some(center);
        self.radius_m = Some(radius_m);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One ranked place search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    pub name: String,
    pub location: Coordinates,
    pub rating: Option<f64>,
    pub price_level: Option<u8>,
    pub place_id: Option<String>,
    pub vicinity: Option<String>,
    pub types: Vec<String>,
}

/// Ranked place search.
#[async_trait]
pub trait PlacesLookup: Send + Sync {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<PlaceResult>, LookupError>;
}

/// Free-text address to coordinates. `Ok(None)` means "no match".
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, LookupError>;
}

/// Stage-specific structured generation.
///
/// Implementations return the payload variant matching
/// `context.request.stage()`; callers verify this.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, context: &StageContext) -> Result<StagePayload, GenerationError>;
}
