/*
 * Responsibility
 * - 永続化層の公開インターフェース
 * - SessionPool / Session (backend 抽象) と ResourceSessionScope (1 operation = 1 session)
 */
pub mod entities;
pub mod error;
pub mod memory;
pub mod pg;
pub mod scope;
pub mod session;
