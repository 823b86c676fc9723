/*
 * Responsibility
 * - /wallets 系 handler
 * - 1 request = 1 ResourceSessionScope (finish で commit / rollback)
 * - 他人の wallet は「存在しない」と同じ 404 にする (ownership::require_owned)
 * - 外部検証 (wallet_check) は scope を開く前に行う (接続を握ったまま外に出ない)
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::wallets::{CreateWalletRequest, UpdateWalletRequest, WalletResponse, WalletsResponse},
        extractors::{ApiJson, AuthCtxExtractor, WalletId},
        handlers::malformed,
    },
    error::{AppError, InvalidReason},
    repos::{
        entities::{NewWallet, Patch, Wallet},
        scope::ResourceSessionScope,
    },
    services::{ownership::require_owned, wallet_check::ensure_verified},
    state::AppState,
};

/// Load the caller and the wallet, and fail unless the caller owns it.
async fn owned_wallet(
    scope: &mut ResourceSessionScope,
    subject_id: &str,
    wallet_id: &str,
) -> Result<Wallet, AppError> {
    let subject = scope.require_subject(subject_id).await?;
    let wallet = scope.find_wallet(wallet_id).await?;
    require_owned(&subject, wallet)
}

pub async fn list_wallets(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
) -> Result<Json<WalletsResponse>, AppError> {
    let mut scope = ResourceSessionScope::begin(&state.pool).await?;
    let outcome = scope.require_subject(&auth.subject_id).await;
    let subject = scope.finish(outcome).await?;

    Ok(Json(subject.into()))
}

pub async fn create_wallet(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    ApiJson(req): ApiJson<CreateWalletRequest>,
) -> Result<(StatusCode, Json<WalletsResponse>), AppError> {
    req.validate().map_err(malformed)?;

    // Unknown callers stop here; their token is never forwarded.
    let mut scope = ResourceSessionScope::begin(&state.pool).await?;
    let outcome = scope.require_subject(&auth.subject_id).await;
    scope.finish(outcome).await?;

    ensure_verified(
        state.wallet_check.as_ref(),
        &req.public_address,
        &req.network,
        auth.bearer(),
    )
    .await?;

    let new_wallet = NewWallet {
        owner_id: auth.subject_id.clone(),
        name: req.wallet_name,
        public_address: req.public_address,
        network: req.network,
        force_testnet: req.force_testnet,
        validated: true,
    };

    let mut scope = ResourceSessionScope::begin(&state.pool).await?;
    let outcome = scope.create(new_wallet).await;
    let subject = scope.finish(outcome).await?;

    Ok((StatusCode::CREATED, Json(subject.into())))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    wallet_id: WalletId,
) -> Result<Json<WalletResponse>, AppError> {
    let mut scope = ResourceSessionScope::begin(&state.pool).await?;
    let outcome = owned_wallet(&mut scope, &auth.subject_id, wallet_id.as_str()).await;
    let wallet = scope.finish(outcome).await?;

    Ok(Json(wallet.into()))
}

pub async fn update_wallet(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    wallet_id: WalletId,
    ApiJson(req): ApiJson<UpdateWalletRequest>,
) -> Result<Json<WalletResponse>, AppError> {
    req.validate().map_err(malformed)?;

    let revalidate = req.needs_revalidation();
    let mut patch = req.into_patch();
    if patch.is_empty() || patch.has_blank_field() {
        return Err(AppError::InvalidArgument(InvalidReason::MalformedUpdate));
    }

    if revalidate {
        // Read the current pair in its own scope, then check without holding a session.
        let mut scope = ResourceSessionScope::begin(&state.pool).await?;
        let outcome = owned_wallet(&mut scope, &auth.subject_id, wallet_id.as_str()).await;
        let current = scope.finish(outcome).await?;

        let address = patch
            .public_address
            .take()
            .unwrap_or(current.public_address);
        let network = patch.network.take().unwrap_or(current.network);
        ensure_verified(state.wallet_check.as_ref(), &address, &network, auth.bearer()).await?;

        // Persist exactly the pair that was checked.
        patch.public_address = Some(address);
        patch.network = Some(network);
        patch.validated = Some(true);
    }

    let mut scope = ResourceSessionScope::begin(&state.pool).await?;
    let outcome: Result<Wallet, AppError> = async {
        let wallet = owned_wallet(&mut scope, &auth.subject_id, wallet_id.as_str()).await?;
        scope
            .update(&wallet.id, Patch::Resource(patch))
            .await?
            .into_wallet()
            .ok_or(AppError::Internal)
    }
    .await;
    let wallet = scope.finish(outcome).await?;

    tracing::info!(wallet_id = %wallet.id, revalidated = revalidate, "wallet updated");
    Ok(Json(wallet.into()))
}
