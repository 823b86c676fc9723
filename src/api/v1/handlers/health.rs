/*
 * Responsibility
 * - GET /health (疎通用、認証なし)
 * - allowlist には載せる (未登録 path は 403 になるため)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
