use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::core::shared::error::CrmError;

/// Request body extractor whose rejection is a `CrmError::Validation`, so a
/// malformed or wrong-typed body gets the same `{error, kind}` shape as every
/// other failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = CrmError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for CrmError {
    fn from(rejection: JsonRejection) -> Self {
        // body_text carries serde's path, e.g. "durationMinutes: invalid type".
        Self::Validation(rejection.body_text())
    }
}
