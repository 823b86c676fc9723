/*
 * Responsibility
 * - axum::Json の薄い wrapper
 * - decode できない body を共通の AppError (MALFORMED_REQUEST) で返す
 *   (axum 既定の text/plain 422 を返さない)
 */
use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::{AppError, InvalidReason};

#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "request body rejected");
                Err(AppError::InvalidArgument(InvalidReason::MalformedRequest))
            }
        }
    }
}
