//! JSON body extractor that also runs `validator` rules.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;

/// Like [`axum::Json`], but rejects with a 400 [`ServerError`] both when the
/// body does not parse and when it fails validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;
        value
            .validate()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        Ok(Self(value))
    }
}
