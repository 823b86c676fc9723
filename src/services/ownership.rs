//! Ownership check between a loaded subject and a wallet.
//!
//! A wallet that exists but belongs to someone else is reported exactly like
//! a wallet that does not exist (`NotFound(Resource)`), so callers cannot
//! probe for other users' wallet ids.

use crate::error::AppError;
use crate::repos::entities::{EntityKind, Subject, Wallet};

/// True when `wallet` is recorded on the subject's loaded wallet list.
pub fn owns(subject: &Subject, wallet: &Wallet) -> bool {
    subject.wallets.iter().any(|owned| owned.id == wallet.id)
}

/// Resolve a lookup result into a wallet the subject may access.
pub fn require_owned(subject: &Subject, wallet: Option<Wallet>) -> Result<Wallet, AppError> {
    match wallet {
        Some(wallet) if owns(subject, &wallet) => Ok(wallet),
        Some(wallet) => {
            tracing::warn!(
                subject_id = %subject.id,
                wallet_id = %wallet.id,
                "wallet is not associated with subject"
            );
            Err(AppError::NotFound(EntityKind::Resource))
        }
        None => Err(AppError::NotFound(EntityKind::Resource)),
    }
}
