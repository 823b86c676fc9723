pub mod subjects;
pub mod wallets;
