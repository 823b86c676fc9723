//! One exclusive database session per logical operation.
//!
//! Lifecycle:
//! - `new` (idle) → `open` (acquires a session from the pool) → `finish`/`close` (closed)
//! - `finish(Ok)` commits then closes; a failed commit is `Fatal(CommitFailure)`,
//!   except a uniqueness clash found at commit, which stays `Conflict`.
//! - `finish(Err)` and `close` roll back then close.
//! - Dropping an open scope (e.g. the request future was cancelled) drops the
//!   session without committing, which rolls back and returns the connection.
//!
//! A scope is never shared between requests.
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{AppError, FatalReason, IllegalStateReason, InvalidReason};
use crate::repos::entities::{
    EntityKind, NewWallet, Patch, Subject, SubjectPatch, SubjectRow, Wallet, fresh_id,
    next_stamp, now_stamp,
};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::session::{Session, SessionPool};

/// Result of `find` / `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Subject(Subject),
    Resource(Wallet),
}

impl Found {
    pub fn into_subject(self) -> Option<Subject> {
        match self {
            Found::Subject(subject) => Some(subject),
            Found::Resource(_) => None,
        }
    }

    pub fn into_wallet(self) -> Option<Wallet> {
        match self {
            Found::Resource(wallet) => Some(wallet),
            Found::Subject(_) => None,
        }
    }
}

/// Selector for `find`: exactly one of the two ids must be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lookup<'a> {
    pub subject_id: Option<&'a str>,
    pub resource_id: Option<&'a str>,
}

impl<'a> Lookup<'a> {
    pub fn subject(id: &'a str) -> Self {
        Self {
            subject_id: Some(id),
            resource_id: None,
        }
    }

    pub fn resource(id: &'a str) -> Self {
        Self {
            subject_id: None,
            resource_id: Some(id),
        }
    }

    fn selector(self) -> Result<Selector<'a>, AppError> {
        match (self.subject_id, self.resource_id) {
            (Some(id), None) => Ok(Selector::Subject(id)),
            (None, Some(id)) => Ok(Selector::Resource(id)),
            _ => Err(AppError::InvalidArgument(InvalidReason::AmbiguousSelector)),
        }
    }
}

enum Selector<'a> {
    Subject(&'a str),
    Resource(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Idle,
    Open,
    Closed,
}

pub struct ResourceSessionScope {
    pool: Arc<dyn SessionPool>,
    session: Option<Box<dyn Session>>,
    state: ScopeState,
}

impl std::fmt::Debug for ResourceSessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSessionScope")
            .field("backend", &self.pool.backend_name())
            .field("state", &self.state)
            .finish()
    }
}

impl ResourceSessionScope {
    pub fn new(pool: Arc<dyn SessionPool>) -> Self {
        Self {
            pool,
            session: None,
            state: ScopeState::Idle,
        }
    }

    /// Shorthand for `new` + `open`.
    pub async fn begin(pool: &Arc<dyn SessionPool>) -> Result<Self, AppError> {
        let mut scope = Self::new(pool.clone());
        scope.open().await?;
        Ok(scope)
    }

    pub fn is_open(&self) -> bool {
        self.state == ScopeState::Open
    }

    pub async fn open(&mut self) -> Result<(), AppError> {
        match self.state {
            ScopeState::Idle => {}
            ScopeState::Open => {
                return Err(AppError::IllegalState(IllegalStateReason::ScopeAlreadyOpen));
            }
            ScopeState::Closed => {
                return Err(AppError::IllegalState(IllegalStateReason::ScopeClosed));
            }
        }

        let session = self.pool.acquire().await?;
        self.session = Some(session);
        self.state = ScopeState::Open;
        debug!(backend = self.pool.backend_name(), "session scope opened");
        Ok(())
    }

    fn session(&mut self) -> Result<&mut (dyn Session + 'static), AppError> {
        self.session
            .as_deref_mut()
            .ok_or(AppError::IllegalState(IllegalStateReason::ScopeNotOpen))
    }

    pub async fn find(
        &mut self,
        kind: EntityKind,
        lookup: Lookup<'_>,
    ) -> Result<Option<Found>, AppError> {
        let session = self.session()?;
        let selector = lookup.selector()?;

        let found = match (kind, selector) {
            (EntityKind::Subject, Selector::Subject(id)) => {
                load_subject(session, id).await?.map(Found::Subject)
            }
            (EntityKind::Subject, Selector::Resource(id)) => {
                match session.fetch_wallet(id).await? {
                    Some(wallet) => load_subject(session, &wallet.owner_id)
                        .await?
                        .map(Found::Subject),
                    None => None,
                }
            }
            (EntityKind::Resource, Selector::Resource(id)) => {
                session.fetch_wallet(id).await?.map(Found::Resource)
            }
            (EntityKind::Resource, Selector::Subject(id)) => session
                .fetch_wallets_of(id)
                .await?
                .into_iter()
                .next()
                .map(Found::Resource),
        };

        Ok(found)
    }

    pub async fn find_subject(&mut self, id: &str) -> Result<Option<Subject>, AppError> {
        let found = self.find(EntityKind::Subject, Lookup::subject(id)).await?;
        Ok(found.and_then(Found::into_subject))
    }

    pub async fn find_wallet(&mut self, id: &str) -> Result<Option<Wallet>, AppError> {
        let found = self.find(EntityKind::Resource, Lookup::resource(id)).await?;
        Ok(found.and_then(Found::into_wallet))
    }

    /// Like `find_subject`, but absence is `NotFound(Subject)`.
    pub async fn require_subject(&mut self, id: &str) -> Result<Subject, AppError> {
        self.find_subject(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Subject))
    }

    /// Insert a subject with no wallets. An existing id is `Conflict(Subject)`.
    pub async fn register(&mut self, id: &str, name: Option<String>) -> Result<Subject, AppError> {
        let session = self.session()?;

        if session.fetch_subject(id).await?.is_some() {
            return Err(AppError::Conflict(EntityKind::Subject));
        }

        let stamp = now_stamp();
        let row = SubjectRow {
            id: id.to_string(),
            name,
            created_at: stamp,
            updated_at: stamp,
        };
        session.insert_subject(&row).await?;
        debug!(subject_id = %row.id, "subject registered");

        Ok(Subject::from_parts(row, Vec::new()))
    }

    /// Add a wallet to an existing subject and return the subject as it now reads.
    pub async fn create(&mut self, new: NewWallet) -> Result<Subject, AppError> {
        let session = self.session()?;

        let owner = session
            .fetch_subject(&new.owner_id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Subject))?;

        let stamp = now_stamp();
        let wallet = Wallet {
            id: fresh_id(),
            owner_id: owner.id.clone(),
            name: new.name,
            public_address: new.public_address,
            network: new.network,
            force_testnet: new.force_testnet,
            validated: new.validated,
            created_at: stamp,
            updated_at: stamp,
        };
        session.insert_wallet(&wallet).await?;

        session
            .update_subject(
                &owner.id,
                &SubjectPatch::default(),
                next_stamp(owner.updated_at),
            )
            .await?
            .ok_or(AppError::NotFound(EntityKind::Subject))?;

        debug!(subject_id = %owner.id, wallet_id = %wallet.id, "wallet created");

        load_subject(session, &owner.id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Subject))
    }

    /// Apply the fields set in `patch` to the row `id` of the patch's own kind.
    pub async fn update(&mut self, id: &str, patch: Patch) -> Result<Found, AppError> {
        let session = self.session()?;
        let kind = patch.kind();

        match patch {
            Patch::Subject(patch) => {
                let current = session
                    .fetch_subject(id)
                    .await?
                    .ok_or(AppError::NotFound(kind))?;
                let row = session
                    .update_subject(id, &patch, next_stamp(current.updated_at))
                    .await?
                    .ok_or(AppError::NotFound(kind))?;
                let wallets = session.fetch_wallets_of(id).await?;

                Ok(Found::Subject(Subject::from_parts(row, wallets)))
            }
            Patch::Resource(patch) => {
                if patch.is_empty() || patch.has_blank_field() {
                    return Err(AppError::InvalidArgument(InvalidReason::MalformedUpdate));
                }
                let current = session
                    .fetch_wallet(id)
                    .await?
                    .ok_or(AppError::NotFound(kind))?;
                let wallet = session
                    .update_wallet(id, &patch, next_stamp(current.updated_at))
                    .await?
                    .ok_or(AppError::NotFound(kind))?;
                debug!(wallet_id = %wallet.id, "wallet updated");

                Ok(Found::Resource(wallet))
            }
        }
    }

    /// Commit on `Ok`, roll back on `Err`; the scope is closed either way.
    pub async fn finish<T>(mut self, outcome: Result<T, AppError>) -> Result<T, AppError> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "operation failed inside session scope");
                self.close().await;
                Err(err)
            }
        }
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        let session = self
            .session
            .take()
            .ok_or(AppError::IllegalState(IllegalStateReason::ScopeNotOpen))?;
        self.state = ScopeState::Closed;

        match session.commit().await {
            Ok(()) => {
                debug!("session scope committed and closed");
                Ok(())
            }
            Err(RepoError::Conflict(kind)) => {
                warn!(?kind, "commit lost a uniqueness race; session scope closed");
                Err(AppError::Conflict(kind))
            }
            Err(e) => {
                error!(error = ?e, "commit failed; session scope closed");
                Err(AppError::Fatal(FatalReason::CommitFailure))
            }
        }
    }

    /// Roll back anything uncommitted and release the session. Safe to call repeatedly.
    pub async fn close(&mut self) {
        self.state = ScopeState::Closed;

        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.rollback().await {
            warn!(error = ?e, "rollback failed; connection released anyway");
        }
        debug!("session scope rolled back and closed");
    }
}

impl Drop for ResourceSessionScope {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            warn!("session scope dropped while open; uncommitted work discarded");
        }
    }
}

async fn load_subject(session: &mut dyn Session, id: &str) -> RepoResult<Option<Subject>> {
    let Some(row) = session.fetch_subject(id).await? else {
        return Ok(None);
    };
    let wallets = session.fetch_wallets_of(&row.id).await?;
    Ok(Some(Subject::from_parts(row, wallets)))
}
