/*
 * Responsibility
 * - Wallets の request/response DTO
 * - validate() は形式チェックのみ (存在・所有者・外部検証は handler/scope 側)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repos::entities::{Subject, Wallet, WalletPatch};

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_ADDRESS_LEN: usize = 128;
pub const MAX_NETWORK_LEN: usize = 32;

fn default_network() -> String {
    "bitcoin".to_string()
}

fn check_text(value: &str, max: usize, blank: &'static str, long: &'static str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err(blank);
    }
    if value.chars().count() > max {
        return Err(long);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub public_address: String,
    pub wallet_name: String,
    #[serde(default)]
    pub force_testnet: bool,
    #[serde(default = "default_network")]
    pub network: String,
}

impl CreateWalletRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        check_text(
            &self.wallet_name,
            MAX_NAME_LEN,
            "wallet_name is required",
            "wallet_name must be <= 64 chars",
        )?;
        check_text(
            &self.public_address,
            MAX_ADDRESS_LEN,
            "public_address is required",
            "public_address must be <= 128 chars",
        )?;
        check_text(
            &self.network,
            MAX_NETWORK_LEN,
            "network is required",
            "network must be <= 32 chars",
        )?;
        Ok(())
    }
}

/// Every field is optional; at least one must be present.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWalletRequest {
    pub name: Option<String>,
    pub public_address: Option<String>,
    pub network: Option<String>,
    pub force_testnet: Option<bool>,
}

impl UpdateWalletRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(name) = &self.name
            && name.chars().count() > MAX_NAME_LEN
        {
            return Err("name must be <= 64 chars");
        }
        if let Some(address) = &self.public_address
            && address.chars().count() > MAX_ADDRESS_LEN
        {
            return Err("public_address must be <= 128 chars");
        }
        if let Some(network) = &self.network
            && network.chars().count() > MAX_NETWORK_LEN
        {
            return Err("network must be <= 32 chars");
        }
        Ok(())
    }

    /// Address or network changed, so the wallet must be checked again.
    pub fn needs_revalidation(&self) -> bool {
        self.public_address.is_some() || self.network.is_some()
    }

    pub fn into_patch(self) -> WalletPatch {
        WalletPatch {
            name: self.name,
            public_address: self.public_address,
            network: self.network,
            force_testnet: self.force_testnet,
            validated: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub wallet_id: String,
    pub wallet_name: String,
    pub public_address: String,
    pub network: String,
    pub force_testnet: bool,
    pub blockchain_validated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(w: Wallet) -> Self {
        Self {
            wallet_id: w.id,
            wallet_name: w.name,
            public_address: w.public_address,
            network: w.network,
            force_testnet: w.force_testnet,
            blockchain_validated: w.validated,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletsResponse {
    pub user_id: String,
    pub user_wallets: Vec<WalletResponse>,
}

impl From<Subject> for WalletsResponse {
    fn from(subject: Subject) -> Self {
        Self {
            user_id: subject.id,
            user_wallets: subject.wallets.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_network_and_testnet() {
        let req: CreateWalletRequest =
            serde_json::from_str(r#"{"public_address":"bc1qaddr","wallet_name":"main"}"#).unwrap();

        assert_eq!(req.network, "bitcoin");
        assert!(!req.force_testnet);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_rejects_blank_and_oversized_fields() {
        let blank = CreateWalletRequest {
            public_address: "bc1qaddr".into(),
            wallet_name: "  ".into(),
            force_testnet: false,
            network: default_network(),
        };
        assert!(blank.validate().is_err());

        let long = CreateWalletRequest {
            public_address: "x".repeat(MAX_ADDRESS_LEN + 1),
            wallet_name: "main".into(),
            force_testnet: false,
            network: default_network(),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn update_patch_never_sets_validated_from_the_client() {
        let req: UpdateWalletRequest =
            serde_json::from_str(r#"{"name":"cold","validated_by_blockchain":true}"#).unwrap();

        assert!(!req.needs_revalidation());
        let patch = req.into_patch();
        assert_eq!(patch.name.as_deref(), Some("cold"));
        assert!(patch.validated.is_none());
    }

    #[test]
    fn address_or_network_change_needs_revalidation() {
        let req = UpdateWalletRequest {
            network: Some("testnet".into()),
            ..Default::default()
        };
        assert!(req.needs_revalidation());
    }
}
