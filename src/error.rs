/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - RepoError / token / allowlist の失敗を一つの分類に寄せる
 * - 内部原因 (SQL, secret, stack) は body に出さず tracing にだけ残す
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::entities::EntityKind;
use crate::repos::error::RepoError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingCredential,
    Expired,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    PathNotAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    AmbiguousSelector,
    MalformedUpdate,
    MalformedRequest,
    UnverifiedWallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalStateReason {
    ScopeNotOpen,
    ScopeAlreadyOpen,
    ScopeClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    CommitFailure,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized ({0:?})")]
    Unauthorized(UnauthorizedReason),
    #[error("forbidden ({0:?})")]
    Forbidden(ForbiddenReason),
    #[error("{0} not found")]
    NotFound(EntityKind),
    #[error("invalid argument ({0:?})")]
    InvalidArgument(InvalidReason),
    #[error("{0} already exists")]
    Conflict(EntityKind),
    #[error("illegal state ({0:?})")]
    IllegalState(IllegalStateReason),
    #[error("fatal ({0:?})")]
    Fatal(FatalReason),
    #[error("service unavailable")]
    Unavailable,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// (status, stable code, short message) for the response body.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Unauthorized(reason) => {
                let (code, message) = match reason {
                    UnauthorizedReason::MissingCredential => {
                        ("MISSING_CREDENTIAL", "authorization header missing")
                    }
                    UnauthorizedReason::Expired => ("TOKEN_EXPIRED", "token has expired"),
                    UnauthorizedReason::Invalid => ("INVALID_TOKEN", "invalid token"),
                };
                (StatusCode::UNAUTHORIZED, code, message.into())
            }
            AppError::Forbidden(ForbiddenReason::PathNotAllowed) => (
                StatusCode::FORBIDDEN,
                "PATH_NOT_ALLOWED",
                "forbidden path".into(),
            ),
            AppError::NotFound(kind) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{kind} not found."))
            }
            AppError::InvalidArgument(reason) => {
                let (code, message) = match reason {
                    InvalidReason::AmbiguousSelector => {
                        ("AMBIGUOUS_SELECTOR", "exactly one selector is required")
                    }
                    InvalidReason::MalformedUpdate => ("MALFORMED_UPDATE", "nothing to update"),
                    InvalidReason::MalformedRequest => ("MALFORMED_REQUEST", "malformed request"),
                    InvalidReason::UnverifiedWallet => ("UNVERIFIED_WALLET", "invalid wallet"),
                };
                (StatusCode::BAD_REQUEST, code, message.into())
            }
            AppError::Conflict(kind) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{kind} already exists."),
            ),
            AppError::IllegalState(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ILLEGAL_STATE",
                "internal server error".into(),
            ),
            AppError::Fatal(FatalReason::CommitFailure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMIT_FAILURE",
                "changes could not be saved".into(),
            ),
            AppError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "service unavailable".into(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(kind) => AppError::Conflict(kind),
            RepoError::PoolTimeout | RepoError::PoolClosed => {
                tracing::warn!(error = %e, "no database session available");
                AppError::Unavailable
            }
            e => {
                tracing::error!(error = ?e, "storage failure");
                AppError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_uses_stable_code() {
        let (status, body) = body_of(AppError::NotFound(EntityKind::Resource)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "wallet not found.");
    }

    #[tokio::test]
    async fn commit_failure_is_distinct_from_internal() {
        let (status, body) = body_of(AppError::Fatal(FatalReason::CommitFailure)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "COMMIT_FAILURE");
    }

    #[tokio::test]
    async fn unauthorized_reasons_have_their_own_codes() {
        let (status, body) = body_of(AppError::Unauthorized(UnauthorizedReason::Expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "TOKEN_EXPIRED");

        let (_, body) = body_of(AppError::Unauthorized(UnauthorizedReason::MissingCredential)).await;
        assert_eq!(body["error"]["code"], "MISSING_CREDENTIAL");
    }

    #[tokio::test]
    async fn storage_errors_do_not_leak_details() {
        let err = AppError::from(RepoError::CommitRejected("SELECT secret FROM vault".into()));
        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("vault"));
    }

    #[test]
    fn pool_exhaustion_maps_to_unavailable() {
        assert!(matches!(
            AppError::from(RepoError::PoolTimeout),
            AppError::Unavailable
        ));
    }
}
