pub mod error;
pub mod types;
pub mod config;
pub mod security;

pub use error::{GatewayError, RejectReason, Result};
pub use types::*;
pub use config::*;

/// Maximum allowed distance between a request's timestamp and server time.
pub const TIMESTAMP_TOLERANCE_MS: i64 = 60_000;

/// How long a claimed nonce stays claimed.
pub const NONCE_TTL_SECS: u64 = 60;

/// How long a bootstrapped device secret lives.
pub const SECRET_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Path of the authenticated rewrite endpoint.
pub const REWRITE_PATH: &str = "/api/rewrite";
