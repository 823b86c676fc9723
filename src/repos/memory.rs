//! In-process backend for local development (no `DATABASE_URL`) and tests.
//!
//! - The pool is bounded by a semaphore; `acquire` waits at most `acquire_timeout`.
//! - A session reads from a snapshot taken at acquire time plus its own writes.
//! - Writes are buffered and applied to the shared tables only on commit.
//! - Updates are buffered as patches and re-applied to the committed row, so
//!   concurrent updates of disjoint fields both survive.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::repos::entities::{
    EntityKind, SubjectPatch, SubjectRow, Wallet, WalletPatch, next_stamp,
};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::session::{Session, SessionPool};

#[derive(Debug, Clone, Default)]
struct Tables {
    subjects: HashMap<String, SubjectRow>,
    wallets: HashMap<String, Wallet>,
}

#[derive(Debug)]
enum Write {
    InsertSubject(SubjectRow),
    InsertWallet(Wallet),
    PatchSubject {
        id: String,
        patch: SubjectPatch,
        updated_at: DateTime<Utc>,
    },
    PatchWallet {
        id: String,
        patch: WalletPatch,
        updated_at: DateTime<Utc>,
    },
}

#[derive(Clone, Debug)]
pub struct MemorySessionPool {
    tables: Arc<Mutex<Tables>>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    reject_commits: Arc<AtomicBool>,
}

impl MemorySessionPool {
    pub fn new(max_sessions: usize, acquire_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            permits: Arc::new(Semaphore::new(max_sessions.max(1))),
            acquire_timeout,
            reject_commits: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sessions not currently handed out.
    #[cfg(test)]
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Make every following commit fail (used to exercise commit-failure paths).
    #[cfg(test)]
    pub fn reject_commits(&self, reject: bool) {
        self.reject_commits.store(reject, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn wallet_count(&self) -> usize {
        self.tables.lock().await.wallets.len()
    }
}

#[async_trait]
impl SessionPool for MemorySessionPool {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn acquire(&self) -> RepoResult<Box<dyn Session>> {
        let permit = tokio::time::timeout(
            self.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| RepoError::PoolTimeout)?
        .map_err(|_| RepoError::PoolClosed)?;

        let view = self.tables.lock().await.clone();

        Ok(Box::new(MemorySession {
            shared: self.tables.clone(),
            view,
            writes: Vec::new(),
            reject_commit: self.reject_commits.load(Ordering::SeqCst),
            _permit: permit,
        }))
    }
}

struct MemorySession {
    shared: Arc<Mutex<Tables>>,
    view: Tables,
    writes: Vec<Write>,
    reject_commit: bool,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch_subject(&mut self, id: &str) -> RepoResult<Option<SubjectRow>> {
        Ok(self.view.subjects.get(id).cloned())
    }

    async fn fetch_wallet(&mut self, id: &str) -> RepoResult<Option<Wallet>> {
        Ok(self.view.wallets.get(id).cloned())
    }

    async fn fetch_wallets_of(&mut self, owner_id: &str) -> RepoResult<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self
            .view
            .wallets
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect();
        wallets.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(wallets)
    }

    async fn insert_subject(&mut self, row: &SubjectRow) -> RepoResult<()> {
        if self.view.subjects.contains_key(&row.id) {
            return Err(RepoError::Conflict(EntityKind::Subject));
        }
        self.view.subjects.insert(row.id.clone(), row.clone());
        self.writes.push(Write::InsertSubject(row.clone()));
        Ok(())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> RepoResult<()> {
        if self.view.wallets.contains_key(&wallet.id) {
            return Err(RepoError::Conflict(EntityKind::Resource));
        }
        self.view.wallets.insert(wallet.id.clone(), wallet.clone());
        self.writes.push(Write::InsertWallet(wallet.clone()));
        Ok(())
    }

    async fn update_subject(
        &mut self,
        id: &str,
        patch: &SubjectPatch,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<SubjectRow>> {
        let Some(row) = self.view.subjects.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            row.name = Some(name.clone());
        }
        row.updated_at = updated_at;

        self.writes.push(Write::PatchSubject {
            id: id.to_string(),
            patch: patch.clone(),
            updated_at,
        });
        Ok(Some(row.clone()))
    }

    async fn update_wallet(
        &mut self,
        id: &str,
        patch: &WalletPatch,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<Option<Wallet>> {
        let Some(wallet) = self.view.wallets.get_mut(id) else {
            return Ok(None);
        };
        patch.apply_to(wallet);
        wallet.updated_at = updated_at;

        self.writes.push(Write::PatchWallet {
            id: id.to_string(),
            patch: patch.clone(),
            updated_at,
        });
        Ok(Some(wallet.clone()))
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let MemorySession {
            shared,
            writes,
            reject_commit,
            _permit,
            ..
        } = *self;

        if reject_commit {
            return Err(RepoError::CommitRejected("backend refused the commit".into()));
        }

        let mut tables = shared.lock().await;

        // All-or-nothing: check before applying anything.
        let taken = writes.iter().any(|w| {
            matches!(w, Write::InsertSubject(row) if tables.subjects.contains_key(&row.id))
        });
        if taken {
            return Err(RepoError::Conflict(EntityKind::Subject));
        }

        for write in writes {
            match write {
                Write::InsertSubject(row) => {
                    tables.subjects.insert(row.id.clone(), row);
                }
                Write::InsertWallet(wallet) => {
                    tables.wallets.insert(wallet.id.clone(), wallet);
                }
                Write::PatchSubject {
                    id,
                    patch,
                    updated_at,
                } => {
                    if let Some(row) = tables.subjects.get_mut(&id) {
                        if let Some(name) = patch.name {
                            row.name = Some(name);
                        }
                        row.updated_at = later_of(row.updated_at, updated_at);
                    }
                }
                Write::PatchWallet {
                    id,
                    patch,
                    updated_at,
                } => {
                    if let Some(wallet) = tables.wallets.get_mut(&id) {
                        patch.apply_to(wallet);
                        wallet.updated_at = later_of(wallet.updated_at, updated_at);
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        // Buffered writes and the permit go with `self`.
        Ok(())
    }
}

// Another session may have committed a newer stamp since our snapshot.
fn later_of(committed: DateTime<Utc>, ours: DateTime<Utc>) -> DateTime<Utc> {
    if ours > committed {
        ours
    } else {
        next_stamp(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::entities::now_stamp;

    fn subject(id: &str) -> SubjectRow {
        let stamp = now_stamp();
        SubjectRow {
            id: id.to_string(),
            name: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn pool(size: usize) -> MemorySessionPool {
        MemorySessionPool::new(size, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let pool = pool(2);

        let mut writer = pool.acquire().await.unwrap();
        writer.insert_subject(&subject("u1")).await.unwrap();

        let mut reader = pool.acquire().await.unwrap();
        assert!(reader.fetch_subject("u1").await.unwrap().is_none());
        reader.rollback().await.unwrap();

        writer.commit().await.unwrap();

        let mut reader = pool.acquire().await.unwrap();
        assert!(reader.fetch_subject("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let pool = pool(1);

        let mut session = pool.acquire().await.unwrap();
        session.insert_subject(&subject("u1")).await.unwrap();
        session.rollback().await.unwrap();

        let mut session = pool.acquire().await.unwrap();
        assert!(session.fetch_subject("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exhausted_pool_times_out() {
        let pool = pool(1);

        let _held = pool.acquire().await.unwrap();
        let second = pool.acquire().await;

        assert!(matches!(second, Err(RepoError::PoolTimeout)));
    }

    #[tokio::test]
    async fn dropping_a_session_returns_its_permit() {
        let pool = pool(1);

        let session = pool.acquire().await.unwrap();
        assert_eq!(pool.idle(), 0);
        drop(session);
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn racing_registrations_conflict_on_commit() {
        let pool = pool(2);

        let mut first = pool.acquire().await.unwrap();
        let mut second = pool.acquire().await.unwrap();
        first.insert_subject(&subject("u1")).await.unwrap();
        second.insert_subject(&subject("u1")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert!(matches!(err, RepoError::Conflict(EntityKind::Subject)));
    }

    #[tokio::test]
    async fn wallets_of_are_oldest_first() {
        let pool = pool(1);
        let mut session = pool.acquire().await.unwrap();
        session.insert_subject(&subject("u1")).await.unwrap();

        let base = now_stamp();
        for (id, offset) in [("w-late", 10), ("w-early", 1)] {
            let stamp = base + chrono::TimeDelta::seconds(offset);
            session
                .insert_wallet(&Wallet {
                    id: id.into(),
                    owner_id: "u1".into(),
                    name: id.into(),
                    public_address: "addr".into(),
                    network: "bitcoin".into(),
                    force_testnet: false,
                    validated: true,
                    created_at: stamp,
                    updated_at: stamp,
                })
                .await
                .unwrap();
        }

        let ids: Vec<String> = session
            .fetch_wallets_of("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, ["w-early", "w-late"]);
    }

    #[tokio::test]
    async fn concurrent_patches_of_disjoint_fields_both_land() {
        let pool = pool(2);
        let stamp = now_stamp();
        let mut setup = pool.acquire().await.unwrap();
        setup.insert_subject(&subject("u1")).await.unwrap();
        setup
            .insert_wallet(&Wallet {
                id: "w1".into(),
                owner_id: "u1".into(),
                name: "old".into(),
                public_address: "addr".into(),
                network: "bitcoin".into(),
                force_testnet: false,
                validated: true,
                created_at: stamp,
                updated_at: stamp,
            })
            .await
            .unwrap();
        setup.commit().await.unwrap();

        let mut renamer = pool.acquire().await.unwrap();
        let mut toggler = pool.acquire().await.unwrap();
        let rename = WalletPatch {
            name: Some("renamed".into()),
            ..Default::default()
        };
        let toggle = WalletPatch {
            force_testnet: Some(true),
            ..Default::default()
        };
        renamer
            .update_wallet("w1", &rename, next_stamp(stamp))
            .await
            .unwrap();
        toggler
            .update_wallet("w1", &toggle, next_stamp(stamp))
            .await
            .unwrap();
        renamer.commit().await.unwrap();
        toggler.commit().await.unwrap();

        let mut reader = pool.acquire().await.unwrap();
        let wallet = reader.fetch_wallet("w1").await.unwrap().unwrap();
        assert_eq!(wallet.name, "renamed");
        assert!(wallet.force_testnet);
        assert!(wallet.updated_at > stamp);
    }
}
