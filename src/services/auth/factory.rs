/// Factory: build `TokenValidator` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::TokenValidator;

pub fn build_token_validator(config: &Config) -> Arc<TokenValidator> {
    let validator = TokenValidator::new(&config.token_key, config.token_leeway_seconds);
    tracing::debug!(?validator, "session token validator ready");

    Arc::new(validator)
}
