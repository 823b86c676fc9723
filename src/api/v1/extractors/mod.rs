/*
 * Responsibility
 * - handler 引数になる extractor の公開インターフェース
 */
pub mod auth_ctx;
pub mod json;
pub mod path_id;

pub use auth_ctx::{AuthCtx, AuthCtxExtractor};
pub use json::ApiJson;
pub use path_id::WalletId;
