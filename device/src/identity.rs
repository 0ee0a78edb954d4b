//! Persistent device identity
//!
//! The device id and shared secret are generated once and kept in a JSON
//! file so later runs sign with the secret the gateway already holds.

use crate::client::ClientError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub secret: String,
    /// Set once the gateway has accepted a request signed with `secret`.
    #[serde(default)]
    pub registered: bool,
}

impl DeviceIdentity {
    /// Fresh identity: a v4 UUID and 32 random bytes of hex secret.
    pub fn generate() -> Self {
        let secret: [u8; 32] = rand::random();
        Self {
            device_id: Uuid::new_v4().to_string(),
            secret: hex::encode(secret),
            registered: false,
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>, ClientError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Loads the identity at `path`, creating and saving a new one if the
    /// file does not exist.
    pub fn load_or_generate(path: &Path) -> Result<Self, ClientError> {
        if let Some(identity) = Self::load(path)? {
            return Ok(identity);
        }
        let identity = Self::generate();
        identity.save(path)?;
        Ok(identity)
    }
}
