//! In-process stores for development runs and tests
//!
//! State lives only as long as the process. Expired entries are dropped
//! lazily on access.

use super::{HealthCheck, NonceCache, NonceClaim, SecretStore, StoreError};
use async_trait::async_trait;
use common::{NONCE_TTL_SECS, SECRET_TTL_SECS};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Device secrets keyed by device id, each with its own expiry.
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, (String, Instant)>>,
    ttl: Duration,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(SECRET_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            secrets: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.secrets.lock().values().filter(|(_, expiry)| *expiry > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, device_id: &str) -> Result<Option<String>, StoreError> {
        let mut secrets = self.secrets.lock();
        let now = Instant::now();

        let expired = match secrets.get(device_id) {
            Some((secret, expiry)) if *expiry > now => return Ok(Some(secret.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            secrets.remove(device_id);
        }
        Ok(None)
    }

    async fn set(&self, device_id: &str, secret: &str) -> Result<bool, StoreError> {
        let mut secrets = self.secrets.lock();
        let now = Instant::now();

        if let Some((_, expiry)) = secrets.get(device_id) {
            if *expiry > now {
                return Ok(false);
            }
        }

        secrets.insert(device_id.to_string(), (secret.to_string(), now + self.ttl));
        Ok(true)
    }
}

#[async_trait]
impl HealthCheck for MemorySecretStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Consumed nonces keyed by `(device_id, nonce)`.
pub struct MemoryNonceCache {
    nonces: Mutex<HashMap<(String, String), Instant>>,
    ttl: Duration,
}

impl MemoryNonceCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(NONCE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored nonces, expired ones included until `cleanup`.
    pub fn len(&self) -> usize {
        self.nonces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired nonce. Meant to run periodically.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.nonces.lock().retain(|_, expiry| *expiry > now);
    }
}

impl Default for MemoryNonceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceCache for MemoryNonceCache {
    async fn claim(&self, device_id: &str, nonce: &str) -> Result<NonceClaim, StoreError> {
        // Check and insert under one lock acquisition. Only this key's
        // expiry is checked; `cleanup` sweeps the rest.
        let mut nonces = self.nonces.lock();
        let now = Instant::now();

        let key = (device_id.to_string(), nonce.to_string());
        if matches!(nonces.get(&key), Some(expiry) if *expiry > now) {
            return Ok(NonceClaim::AlreadyClaimed);
        }

        nonces.insert(key, now + self.ttl);
        Ok(NonceClaim::Fresh)
    }
}

#[async_trait]
impl HealthCheck for MemoryNonceCache {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
