/*
 * Responsibility
 * - POST /subjects: token の sub を users.id として登録する
 * - 既に存在すれば 409 CONFLICT
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::subjects::{RegisterSubjectRequest, SubjectResponse},
        extractors::{ApiJson, AuthCtxExtractor},
        handlers::malformed,
    },
    error::AppError,
    repos::scope::ResourceSessionScope,
    state::AppState,
};

pub async fn register_subject(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    ApiJson(req): ApiJson<RegisterSubjectRequest>,
) -> Result<(StatusCode, Json<SubjectResponse>), AppError> {
    req.validate().map_err(malformed)?;

    let mut scope = ResourceSessionScope::begin(&state.pool).await?;
    let outcome = scope.register(&auth.subject_id, req.name).await;
    let subject = scope.finish(outcome).await?;

    tracing::info!(subject_id = %subject.id, "subject registered");
    Ok((StatusCode::CREATED, Json(subject.into())))
}
