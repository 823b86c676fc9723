/*
 * Responsibility
 * - middleware の公開インターフェース
 * - 適用順 (外 → 内): http → cors → allowlist → auth::access → handler
 */
pub mod allowlist;
pub mod auth;
pub mod cors;
pub mod http;
