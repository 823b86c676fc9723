/*
 * Responsibility
 * - wallet 作成/更新前の外部検証 (broadcaster の wallets/status)
 * - handler からは WalletValidator trait 越しにだけ使う
 */
pub mod broadcaster;
pub mod client;

pub use broadcaster::BroadcasterClient;
pub use client::{WalletValidator, ensure_verified};
