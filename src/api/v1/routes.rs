/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - ROUTE_TABLE: allowlist gate が compile する手書きの route 一覧 (full path)
 *   route を足したらここにも足す (足さないと 403 になる)
 * - Bearer が必要な範囲は route_layer で適用する
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    subjects::register_subject,
    wallets::{create_wallet, get_wallet, list_wallets, update_wallet},
};
use crate::middleware;
use crate::state::AppState;

pub const ROUTE_TABLE: &[&str] = &[
    "/health",
    "/api/v1/subjects",
    "/api/v1/wallets",
    "/api/v1/wallets/{wallet_id}",
];

/// Router to be nested under `/api/v1`; every route requires a session token.
pub fn routes(state: AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/subjects", post(register_subject))
        .route("/wallets", get(list_wallets).post(create_wallet))
        .route(
            "/wallets/{wallet_id}",
            get(get_wallet).put(update_wallet),
        );

    middleware::auth::access::apply(router, state)
}
