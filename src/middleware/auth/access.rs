//! session token 検証 → AuthCtx を extensions に入れる
//!
//! - `Authorization` ヘッダが無い / token が空 → 401 MISSING_CREDENTIAL
//! - Bearer 以外の scheme、署名・alg 不一致、`sub` 空 → 401 INVALID_TOKEN
//! - 期限切れ → 401 TOKEN_EXPIRED
//!
//! allowlist gate より内側でのみ動く (未登録 path ではここに来ない)。

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::{AppError, UnauthorizedReason};
use crate::state::AppState;

/// `/api/v1/*` に認証を掛けるための middleware を適用する。
///
/// `route_layer` なので、route に一致したリクエストにだけ掛かる。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthorized(UnauthorizedReason::MissingCredential))?;

    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized(UnauthorizedReason::Invalid))?
        .trim();
    if value.is_empty() {
        return Err(AppError::Unauthorized(UnauthorizedReason::MissingCredential));
    }

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            Ok(token.trim().to_string())
        }
        _ if value.eq_ignore_ascii_case("bearer") => Ok(String::new()),
        _ => Err(AppError::Unauthorized(UnauthorizedReason::Invalid)),
    }
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).inspect_err(|err| {
        tracing::info!(error = %err, path = %req.uri().path(), "rejected credential");
    })?;

    let subject_id = match state.auth.validate(&token) {
        Ok(sub) => sub,
        Err(err) => {
            tracing::warn!(error = %err, path = %req.uri().path(), "session token verification failed");
            return Err(err.into());
        }
    };

    tracing::debug!(subject_id = %subject_id, "session token accepted");

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::new(subject_id, token));

    Ok(next.run(req).await)
}
