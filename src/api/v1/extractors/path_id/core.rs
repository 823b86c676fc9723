/*
 * Responsibility
 *  - Path の String を「意味付き ID 型」として受ける
 *  - 形の壊れた ID は DB に届く前に 400 (MALFORMED_REQUEST) にする
 * 置かないもの
 *  - Wallet などの具体リソース名 (types.rs)
 *  - 存在確認や所有者確認 (scope / ownership の責務)
 */
use std::marker::PhantomData;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::error::{AppError, InvalidReason};
use crate::state::AppState;

const MAX_ID_LEN: usize = 64;

pub struct PathId<T> {
    pub id: String,
    _marker: PhantomData<T>,
}

impl<T> PathId<T> {
    fn new(id: String) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl<T> FromRequestParts<AppState> for PathId<T>
where
    T: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::InvalidArgument(InvalidReason::MalformedRequest))?;

        if !is_well_formed(&raw) {
            return Err(AppError::InvalidArgument(InvalidReason::MalformedRequest));
        }
        Ok(Self::new(raw))
    }
}

impl<T> std::fmt::Debug for PathId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathId").field("id", &self.id).finish()
    }
}
