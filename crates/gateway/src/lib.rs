//! Token-storage gateway: receives calendar access tokens from the connect
//! flow and keeps one per user and provider.

pub mod identity;
#[cfg(feature = "metrics")]
pub mod metrics_routes;
pub mod server;
pub mod token_routes;
pub mod token_store;

pub use {
    identity::CallerIdentity,
    server::{AppState, build_gateway_app, open_store, start_gateway},
    token_store::{NewToken, TokenRecord, TokenStore},
};
