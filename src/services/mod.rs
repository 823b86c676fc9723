pub mod auth;
pub mod ownership;
pub mod wallet_check;
