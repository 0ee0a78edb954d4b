//! Persistent state behind request verification
//!
//! Two independent stores: device secrets (one-year TTL) and consumed
//! nonces (60 second TTL). Both are injected into the verifier as trait
//! objects so the Redis and in-memory backends are interchangeable.

mod memory;
mod redis_store;

use async_trait::async_trait;
use common::GatewayError;
use std::time::Duration;
use thiserror::Error;

pub use memory::{MemoryNonceCache, MemorySecretStore};
pub use redis_store::{RedisNonceCache, RedisSecretStore, RedisStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Store pool error: {0}")]
    Pool(String),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::StorageError(err.to_string())
    }
}

/// Result of trying to consume a nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceClaim {
    Fresh,
    AlreadyClaimed,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the secret bound to `device_id`, if any.
    async fn get(&self, device_id: &str) -> Result<Option<String>, StoreError>;

    /// Binds `secret` to `device_id` for one year unless a secret is already
    /// bound. Returns `true` when this call wrote the record.
    async fn set(&self, device_id: &str, secret: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait NonceCache: Send + Sync {
    /// Atomically marks `(device_id, nonce)` as consumed for 60 seconds.
    async fn claim(&self, device_id: &str, nonce: &str) -> Result<NonceClaim, StoreError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

pub(crate) fn secret_key(device_id: &str) -> String {
    format!("device_secret:{}", device_id)
}

/// The device id length is part of the key so that ids containing `:`
/// cannot collide with another device's nonces.
pub(crate) fn nonce_key(device_id: &str, nonce: &str) -> String {
    format!("nonce:{}:{}:{}", device_id.len(), device_id, nonce)
}
