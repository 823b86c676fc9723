/*
 * Responsibility
 * - v1 の公開ポイント (routes() と ROUTE_TABLE の re-export)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{ROUTE_TABLE, routes};
