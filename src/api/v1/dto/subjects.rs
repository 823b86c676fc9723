/*
 * Responsibility
 * - Subjects (users) の request/response DTO
 * - id は body では受けない (token の sub がそのまま id)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repos::entities::Subject;

const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub struct RegisterSubjectRequest {
    pub name: Option<String>,
}

impl RegisterSubjectRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(name) = &self.name
            && (name.trim().is_empty() || name.chars().count() > MAX_NAME_LEN)
        {
            return Err("name must be 1..=64 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SubjectResponse {
    pub user_id: String,
    pub name: Option<String>,
    pub wallet_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subject> for SubjectResponse {
    fn from(s: Subject) -> Self {
        Self {
            user_id: s.id,
            name: s.name,
            wallet_count: s.wallets.len(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}
