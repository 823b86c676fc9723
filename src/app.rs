/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (SessionPool, TokenValidator, WalletValidator) → Router 組み立て
 * - Middleware の適用 (外 → 内: http → cors → allowlist → auth::access)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{self, v1::handlers::health::health};
use crate::config::{Config, StorageBackend};
use crate::middleware::{self, allowlist::RouteAllowlist};
use crate::repos::{
    memory::MemorySessionPool,
    pg::{PgPoolSettings, PgSessionPool},
    session::SessionPool,
};
use crate::services::{auth::build_token_validator, wallet_check::BroadcasterClient};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,wallets_service=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: crash the whole process so we notice immediately
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let allowlist = Arc::new(RouteAllowlist::compile(api::v1::ROUTE_TABLE)?);
    tracing::info!(routes = ?allowlist.templates().collect::<Vec<_>>(), "route allowlist compiled");

    let app = build_router(state, allowlist);
    let app = middleware::cors::apply(app, &config);
    let app = middleware::http::apply(app, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_pool(config: &Config) -> Result<Arc<dyn SessionPool>> {
    match &config.storage {
        StorageBackend::Postgres { url } => {
            let settings = PgPoolSettings {
                max_connections: config.db_pool_size,
                acquire_timeout: config.db_pool_timeout,
                max_lifetime: config.db_pool_recycle,
            };
            let pool = PgSessionPool::connect(url, &settings).await?;
            pool.bootstrap().await?;
            tracing::info!(max_connections = settings.max_connections, "postgres pool ready");
            Ok(Arc::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage (lost on restart)");
            Ok(Arc::new(MemorySessionPool::new(
                config.db_pool_size as usize,
                config.db_pool_timeout,
            )))
        }
    }
}

async fn build_state(config: &Config) -> Result<AppState> {
    let pool = build_pool(config).await?;
    let auth = build_token_validator(config);
    let wallet_check = Arc::new(BroadcasterClient::new(
        &config.wallet_validator_url,
        config.wallet_validator_timeout,
    )?);

    Ok(AppState::new(pool, auth, wallet_check))
}

/// Application routes behind the allowlist gate (outermost here, so it also
/// covers paths no route matches).
pub fn build_router(state: AppState, allowlist: Arc<RouteAllowlist>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    middleware::allowlist::apply(router, allowlist)
}
