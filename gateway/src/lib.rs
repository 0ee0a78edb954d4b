pub mod auth;
pub mod rewrite;
pub mod server;
pub mod store;

pub use auth::RequestVerifier;
pub use server::{AppState, GatewayServer};
