use super::{nonce_key, secret_key, HealthCheck, NonceCache, NonceClaim, SecretStore, StoreError};
use async_trait::async_trait;
use common::{NONCE_TTL_SECS, SECRET_TTL_SECS};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use log::{info, debug};
use std::sync::Arc;

/// Pooled Redis handle shared by the secret store and the nonce cache.
///
/// Built once at startup with [`RedisStore::connect`] and released with
/// [`RedisStore::close`] on shutdown.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Creates the pool and checks that the server answers.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        let store = Self { pool };
        store.ping().await?;
        info!("Connected to Redis at {}", redis_url);
        Ok(store)
    }

    pub async fn connection(&self) -> Result<Connection, StoreError> {
        Ok(self.pool.get().await?)
    }

    /// Closes the pool. Later calls fail with a pool error.
    pub fn close(&self) {
        self.pool.close();
        info!("Redis pool closed");
    }
}

#[async_trait]
impl HealthCheck for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Backend(format!("Unexpected Redis response: {}", response)))
        }
    }
}

pub struct RedisSecretStore {
    store: Arc<RedisStore>,
}

impl RedisSecretStore {
    pub fn new(store: Arc<RedisStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SecretStore for RedisSecretStore {
    async fn get(&self, device_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.store.connection().await?;

        let secret: Option<String> = redis::cmd("GET")
            .arg(secret_key(device_id))
            .query_async(&mut conn)
            .await?;

        Ok(secret)
    }

    async fn set(&self, device_id: &str, secret: &str) -> Result<bool, StoreError> {
        let mut conn = self.store.connection().await?;

        // NX: an existing secret is never replaced.
        let reply: Option<String> = redis::cmd("SET")
            .arg(secret_key(device_id))
            .arg(secret)
            .arg("NX")
            .arg("EX")
            .arg(SECRET_TTL_SECS)
            .query_async(&mut conn)
            .await?;

        debug!("Secret write for device {} stored={}", device_id, reply.is_some());
        Ok(reply.is_some())
    }
}

pub struct RedisNonceCache {
    store: Arc<RedisStore>,
}

impl RedisNonceCache {
    pub fn new(store: Arc<RedisStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NonceCache for RedisNonceCache {
    async fn claim(&self, device_id: &str, nonce: &str) -> Result<NonceClaim, StoreError> {
        let mut conn = self.store.connection().await?;

        // Single SET NX EX so concurrent duplicates cannot both see a miss.
        let reply: Option<String> = redis::cmd("SET")
            .arg(nonce_key(device_id, nonce))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(NONCE_TTL_SECS)
            .query_async(&mut conn)
            .await?;

        Ok(match reply {
            Some(_) => NonceClaim::Fresh,
            None => NonceClaim::AlreadyClaimed,
        })
    }
}
