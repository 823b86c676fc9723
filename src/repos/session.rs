//! Storage seam used by `ResourceSessionScope`.
//!
//! A `SessionPool` hands out one exclusive `Session` per logical operation.
//! Every read and write goes through that session; nothing is visible to
//! other sessions until `commit`. Dropping a session without committing
//! discards its writes and returns the connection to the pool.
//!
//! Implementations:
//! - `pg::PgSessionPool` (sqlx / Postgres, one transaction per session)
//! - `memory::MemorySessionPool` (local development and tests)
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repos::entities::{SubjectPatch, SubjectRow, Wallet, WalletPatch};
use crate::repos::error::RepoResult;

#[async_trait]
pub trait SessionPool: Send + Sync + 'static {
    // Backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Wait (bounded by the pool's acquire timeout) for a connection and start a session on it.
    async fn acquire(&self) -> RepoResult<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send {
    async fn fetch_subject(&mut self, id: &str) -> RepoResult<Option<SubjectRow>>;

    async fn fetch_wallet(&mut self, id: &str) -> RepoResult<Option<Wallet>>;

    // Wallets owned by `owner_id`, oldest first.
    async fn fetch_wallets_of(&mut self, owner_id: &str) -> RepoResult<Vec<Wallet>>;

    // Fails with `RepoError::Conflict(Subject)` when the id is taken.
    async fn insert_subject(&mut self, row: &SubjectRow) -> RepoResult<()>;

    async fn insert_wallet(&mut self, wallet: &Wallet) -> RepoResult<()>;

    // Returns `None` when no row has `id`.
    async fn update_subject(
        &mut self,
        id: &str,
        patch: &SubjectPatch,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<SubjectRow>>;

    async fn update_wallet(
        &mut self,
        id: &str,
        patch: &WalletPatch,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<Wallet>>;

    async fn commit(self: Box<Self>) -> RepoResult<()>;

    async fn rollback(self: Box<Self>) -> RepoResult<()>;
}
