/*
 * Responsibility
 * - Postgres backend (sqlx)
 * - PgPool は max_connections / acquire_timeout で上限と待ち時間を固定する
 * - 1 session = 1 transaction (drop されたら sqlx が rollback する)
 */
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions};

use crate::repos::entities::{EntityKind, SubjectPatch, SubjectRow, Wallet, WalletPatch};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::session::{Session, SessionPool};

#[derive(Debug, Clone)]
pub struct PgPoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub max_lifetime: Duration,
}

#[derive(Clone, Debug)]
pub struct PgSessionPool {
    pool: PgPool,
}

impl PgSessionPool {
    pub async fn connect(database_url: &str, settings: &PgPoolSettings) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .max_lifetime(settings.max_lifetime)
            .test_before_acquire(true)
            .connect(database_url)
            .await
            .map_err(RepoError::from_sqlx)?;

        Ok(Self { pool })
    }

    /// Create the two tables if they do not exist yet.
    pub async fn bootstrap(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionPool for PgSessionPool {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn acquire(&self) -> RepoResult<Box<dyn Session>> {
        let tx = self.pool.begin().await.map_err(RepoError::from_sqlx)?;
        Ok(Box::new(PgSession { tx }))
    }
}

pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Session for PgSession {
    async fn fetch_subject(&mut self, id: &str) -> RepoResult<Option<SubjectRow>> {
        let row = sqlx::query_as::<_, SubjectRow>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM subjects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row)
    }

    async fn fetch_wallet(&mut self, id: &str) -> RepoResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT
                id, owner_id, name, public_address, network,
                force_testnet, validated, created_at, updated_at
            FROM wallets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row)
    }

    async fn fetch_wallets_of(&mut self, owner_id: &str) -> RepoResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT
                id, owner_id, name, public_address, network,
                force_testnet, validated, created_at, updated_at
            FROM wallets
            WHERE owner_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(rows)
    }

    async fn insert_subject(&mut self, row: &SubjectRow) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subjects (id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepoError::from_insert(EntityKind::Subject, e))?;

        Ok(())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (
                id, owner_id, name, public_address, network,
                force_testnet, validated, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.owner_id)
        .bind(&wallet.name)
        .bind(&wallet.public_address)
        .bind(&wallet.network)
        .bind(wallet.force_testnet)
        .bind(wallet.validated)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepoError::from_insert(EntityKind::Resource, e))?;

        Ok(())
    }

    async fn update_subject(
        &mut self,
        id: &str,
        patch: &SubjectPatch,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<SubjectRow>> {
        let row = sqlx::query_as::<_, SubjectRow>(
            r#"
            UPDATE subjects
            SET
                name = COALESCE($2, name),
                updated_at = $3
            WHERE id = $1
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(updated_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row)
    }

    async fn update_wallet(
        &mut self,
        id: &str,
        patch: &WalletPatch,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<Wallet>> {
        // NULL binds leave the column as it is.
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET
                name = COALESCE($2, name),
                public_address = COALESCE($3, public_address),
                network = COALESCE($4, network),
                force_testnet = COALESCE($5, force_testnet),
                validated = COALESCE($6, validated),
                updated_at = $7
            WHERE id = $1
            RETURNING
                id, owner_id, name, public_address, network,
                force_testnet, validated, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.public_address.as_deref())
        .bind(patch.network.as_deref())
        .bind(patch.force_testnet)
        .bind(patch.validated)
        .bind(updated_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row)
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await.map_err(RepoError::from_sqlx)
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx.rollback().await.map_err(RepoError::from_sqlx)
    }
}

// Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::entities::{fresh_id, next_stamp, now_stamp};

    async fn pool() -> PgSessionPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
        let settings = PgPoolSettings {
            max_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(60),
        };
        let pool = PgSessionPool::connect(&url, &settings).await.unwrap();
        pool.bootstrap().await.unwrap();
        pool
    }

    fn subject(id: &str) -> SubjectRow {
        let stamp = now_stamp();
        SubjectRow {
            id: id.to_string(),
            name: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[tokio::test]
    #[ignore = "needs a Postgres at TEST_DATABASE_URL"]
    async fn duplicate_subject_insert_is_a_conflict() {
        let pool = pool().await;
        let id = fresh_id();

        let mut first = pool.acquire().await.unwrap();
        first.insert_subject(&subject(&id)).await.unwrap();
        first.commit().await.unwrap();

        let mut second = pool.acquire().await.unwrap();
        let err = second.insert_subject(&subject(&id)).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(EntityKind::Subject)));
    }

    #[tokio::test]
    #[ignore = "needs a Postgres at TEST_DATABASE_URL"]
    async fn partial_update_leaves_unset_columns() {
        let pool = pool().await;
        let owner = fresh_id();
        let stamp = now_stamp();
        let wallet = Wallet {
            id: fresh_id(),
            owner_id: owner.clone(),
            name: "old".into(),
            public_address: "bc1qexample".into(),
            network: "bitcoin".into(),
            force_testnet: false,
            validated: true,
            created_at: stamp,
            updated_at: stamp,
        };

        let mut session = pool.acquire().await.unwrap();
        session.insert_subject(&subject(&owner)).await.unwrap();
        session.insert_wallet(&wallet).await.unwrap();
        session.commit().await.unwrap();

        let mut session = pool.acquire().await.unwrap();
        let patch = WalletPatch {
            force_testnet: Some(true),
            ..Default::default()
        };
        let updated = session
            .update_wallet(&wallet.id, &patch, next_stamp(stamp))
            .await
            .unwrap()
            .unwrap();
        session.commit().await.unwrap();

        assert_eq!(updated.name, "old");
        assert_eq!(updated.public_address, "bc1qexample");
        assert!(updated.force_testnet);
        assert!(updated.updated_at > stamp);
    }

    #[tokio::test]
    #[ignore = "needs a Postgres at TEST_DATABASE_URL"]
    async fn rollback_discards_the_transaction() {
        let pool = pool().await;
        let id = fresh_id();

        let mut session = pool.acquire().await.unwrap();
        session.insert_subject(&subject(&id)).await.unwrap();
        session.rollback().await.unwrap();

        let mut session = pool.acquire().await.unwrap();
        assert!(session.fetch_subject(&id).await.unwrap().is_none());
    }
}
