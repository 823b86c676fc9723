/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

use crate::repos::entities::EntityKind;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("migration error")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,
    #[error("connection pool is closed")]
    PoolClosed,
    #[error("{0} already exists")]
    Conflict(EntityKind),
    #[error("commit rejected: {0}")]
    CommitRejected(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => RepoError::PoolTimeout,
            sqlx::Error::PoolClosed => RepoError::PoolClosed,
            e => RepoError::Db(e),
        }
    }

    /// Same as `from_sqlx`, but a unique violation becomes a conflict on `kind`.
    pub fn from_insert(kind: EntityKind, e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(dbe) = &e
            && dbe.code().as_deref() == Some("23505")
        {
            return RepoError::Conflict(kind);
        }
        RepoError::from_sqlx(e)
    }
}
