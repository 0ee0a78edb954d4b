//! Signed HTTP client for the rewrite gateway.

use crate::identity::DeviceIdentity;
use chrono::Utc;
use common::security::sign_request;
use common::{
    ApiResponse, RewriteData, RewriteRequest, HEADER_DEVICE_ID, HEADER_DEVICE_SECRET,
    HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP, REWRITE_PATH,
};
use log::{debug, info};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Gateway refused request ({status}): {error}")]
    Refused { status: u16, error: String },
}

/// Auth headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub device_id: String,
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
    pub device_secret: Option<String>,
}

impl SignedHeaders {
    /// Signs `method path` for `identity`. The secret is attached while the
    /// identity is not yet registered with the gateway.
    pub fn sign(identity: &DeviceIdentity, method: &str, path: &str, timestamp_ms: i64, nonce: &str) -> Self {
        let timestamp = timestamp_ms.to_string();
        let signature = sign_request(method, path, &timestamp, nonce, &identity.device_id, &identity.secret);

        Self {
            device_id: identity.device_id.clone(),
            timestamp,
            nonce: nonce.to_string(),
            signature,
            device_secret: if identity.registered { None } else { Some(identity.secret.clone()) },
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (HEADER_DEVICE_ID, self.device_id.clone()),
            (HEADER_TIMESTAMP, self.timestamp.clone()),
            (HEADER_NONCE, self.nonce.clone()),
            (HEADER_SIGNATURE, self.signature.clone()),
        ];
        if let Some(secret) = &self.device_secret {
            pairs.push((HEADER_DEVICE_SECRET, secret.clone()));
        }
        pairs
    }
}

/// 16 random bytes, hex encoded.
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

pub struct RewriteClient {
    http_client: Client,
    server_url: String,
}

impl RewriteClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http_client,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends `text` for rewriting. Marks `identity` registered once the
    /// gateway accepts a request.
    pub async fn rewrite(
        &self,
        identity: &mut DeviceIdentity,
        text: &str,
        translate_to_french: bool,
    ) -> Result<String, ClientError> {
        let headers = SignedHeaders::sign(
            identity,
            "POST",
            REWRITE_PATH,
            Utc::now().timestamp_millis(),
            &generate_nonce(),
        );
        debug!("Signed request with nonce {}", headers.nonce);

        let mut request = self.http_client
            .post(format!("{}{}", self.server_url, REWRITE_PATH))
            .json(&RewriteRequest {
                content: Some(text.to_string()),
                translate_to_french,
            });
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: ApiResponse<RewriteData> = response.json().await?;

        match body {
            ApiResponse { success: true, data: Some(data), .. } => {
                if !identity.registered {
                    info!("Device {} registered with gateway", identity.device_id);
                    identity.registered = true;
                }
                Ok(data.response)
            }
            ApiResponse { error, .. } => Err(ClientError::Refused {
                status: status.as_u16(),
                error: error.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}
