/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - pool: request ごとに ResourceSessionScope を開くための SessionPool
 *   - auth: session token の検証器
 *   - wallet_check: wallet の外部検証 client
 * - Clone 前提で持つ (内部は Arc で cheap)
 */
use std::sync::Arc;

use crate::repos::session::SessionPool;
use crate::services::auth::TokenValidator;
use crate::services::wallet_check::WalletValidator;

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<dyn SessionPool>,
    pub auth: Arc<TokenValidator>,
    pub wallet_check: Arc<dyn WalletValidator>,
}

impl AppState {
    pub fn new(
        pool: Arc<dyn SessionPool>,
        auth: Arc<TokenValidator>,
        wallet_check: Arc<dyn WalletValidator>,
    ) -> Self {
        Self {
            pool,
            auth,
            wallet_check,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool", &self.pool.backend_name())
            .field("auth", &self.auth)
            .field("wallet_check", &self.wallet_check.backend_name())
            .finish()
    }
}
