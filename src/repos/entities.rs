/*
 * Responsibility
 * - subjects / wallets の行型と、scope が返す view 型
 * - partial update 用の patch 型 (None = 触らない)
 */
use std::fmt;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Which table a lookup, update or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Subject,
    Resource,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Subject => write!(f, "user"),
            EntityKind::Resource => write!(f, "wallet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SubjectRow {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Wallet {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub public_address: String,
    pub network: String,
    pub force_testnet: bool,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subject together with the wallets recorded against it, loaded inside one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub wallets: Vec<Wallet>,
}

impl Subject {
    pub fn from_parts(row: SubjectRow, wallets: Vec<Wallet>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            wallets,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewWallet {
    pub owner_id: String,
    pub name: String,
    pub public_address: String,
    pub network: String,
    pub force_testnet: bool,
    pub validated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WalletPatch {
    pub name: Option<String>,
    pub public_address: Option<String>,
    pub network: Option<String>,
    pub force_testnet: Option<bool>,
    pub validated: Option<bool>,
}

impl WalletPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.public_address.is_none()
            && self.network.is_none()
            && self.force_testnet.is_none()
            && self.validated.is_none()
    }

    /// An explicitly set string must carry something.
    pub fn has_blank_field(&self) -> bool {
        [&self.name, &self.public_address, &self.network]
            .into_iter()
            .flatten()
            .any(|s| s.trim().is_empty())
    }

    pub fn apply_to(&self, wallet: &mut Wallet) {
        if let Some(name) = &self.name {
            wallet.name = name.clone();
        }
        if let Some(address) = &self.public_address {
            wallet.public_address = address.clone();
        }
        if let Some(network) = &self.network {
            wallet.network = network.clone();
        }
        if let Some(force_testnet) = self.force_testnet {
            wallet.force_testnet = force_testnet;
        }
        if let Some(validated) = self.validated {
            wallet.validated = validated;
        }
    }
}

/// Kind-tagged patch handed to `ResourceSessionScope::update`.
#[derive(Debug, Clone)]
pub enum Patch {
    Subject(SubjectPatch),
    Resource(WalletPatch),
}

impl Patch {
    pub fn kind(&self) -> EntityKind {
        match self {
            Patch::Subject(_) => EntityKind::Subject,
            Patch::Resource(_) => EntityKind::Resource,
        }
    }
}

pub fn fresh_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current time at the precision Postgres `timestamptz` keeps.
pub fn now_stamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A stamp strictly after `prior`, even when the clock has not moved.
pub fn next_stamp(prior: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_stamp();
    if now > prior {
        now
    } else {
        prior + TimeDelta::microseconds(1)
    }
}
