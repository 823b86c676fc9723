/*
 * Responsibility
 * - v1 handler の公開インターフェース
 * - handler 共通の小さな helper
 */
pub mod health;
pub mod subjects;
pub mod wallets;

use crate::error::{AppError, InvalidReason};

/// DTO validation failure → 400 MALFORMED_REQUEST (理由はログにだけ残す)
pub(crate) fn malformed(reason: &'static str) -> AppError {
    tracing::debug!(reason, "request rejected by validation");
    AppError::InvalidArgument(InvalidReason::MalformedRequest)
}
