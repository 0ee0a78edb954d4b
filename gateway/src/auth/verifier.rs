//! Signed-request verification
//!
//! Runs a fixed pipeline per request: header completeness, timestamp drift,
//! nonce claim, secret resolution (with first-use bootstrap), and signature
//! recomputation. The first failing step decides the rejection reason.

use crate::store::{NonceCache, NonceClaim, SecretStore, StoreError};
use chrono::Utc;
use common::security::{canonical_string, compute_signature, signatures_match};
use common::{AuthHeaders, Config, RejectReason, RequestEnvelope, Verdict, TIMESTAMP_TOLERANCE_MS};
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Last stage a request reached before it was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    HeadersChecked,
    TimestampChecked,
    NonceClaimed,
    SecretResolved,
    SignatureVerified,
}

#[derive(Debug)]
struct Rejection {
    stage: Stage,
    device_id: Option<String>,
    reason: RejectReason,
}

/// Verifies signed device requests against the injected stores.
///
/// Holds no per-request state, so one instance serves all requests
/// concurrently.
pub struct RequestVerifier {
    secrets: Arc<dyn SecretStore>,
    nonces: Arc<dyn NonceCache>,
    store_timeout: Duration,
    allow_bootstrap: bool,
}

impl RequestVerifier {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        nonces: Arc<dyn NonceCache>,
        store_timeout: Duration,
        allow_bootstrap: bool,
    ) -> Self {
        Self {
            secrets,
            nonces,
            store_timeout,
            allow_bootstrap,
        }
    }

    pub fn from_config(
        secrets: Arc<dyn SecretStore>,
        nonces: Arc<dyn NonceCache>,
        config: &Config,
    ) -> Self {
        Self::new(secrets, nonces, config.store_timeout, config.allow_bootstrap)
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Verifies `envelope` against the current wall clock.
    pub async fn verify(&self, envelope: &RequestEnvelope) -> Verdict {
        self.verify_at(envelope, Utc::now().timestamp_millis()).await
    }

    /// Verifies `envelope` as if the server clock read `now_ms`.
    pub async fn verify_at(&self, envelope: &RequestEnvelope, now_ms: i64) -> Verdict {
        match self.run(envelope, now_ms).await {
            Ok(device_id) => {
                debug!("Accepted {} {} from device {}", envelope.method, envelope.path, device_id);
                Verdict::Accepted(device_id)
            }
            Err(rejection) => {
                warn!(
                    "Rejected {} {} from device {} after {:?}: {}",
                    envelope.method,
                    envelope.path,
                    rejection.device_id.as_deref().unwrap_or("<none>"),
                    rejection.stage,
                    rejection.reason
                );
                Verdict::Rejected(rejection.reason)
            }
        }
    }

    async fn run(&self, envelope: &RequestEnvelope, now_ms: i64) -> Result<String, Rejection> {
        let headers = AuthHeaders::validate(&envelope.headers).map_err(|reason| Rejection {
            stage: Stage::Start,
            device_id: envelope.headers.device_id.clone(),
            reason,
        })?;
        let reject = |stage: Stage, reason: RejectReason| Rejection {
            stage,
            device_id: Some(headers.device_id.clone()),
            reason,
        };

        let drift = now_ms.abs_diff(headers.timestamp_ms);
        if drift > TIMESTAMP_TOLERANCE_MS as u64 {
            debug!("Timestamp drift of {} ms for device {}", drift, headers.device_id);
            return Err(reject(Stage::HeadersChecked, RejectReason::TimestampDrift));
        }

        let claim = self
            .bounded("nonce claim", self.nonces.claim(&headers.device_id, &headers.nonce))
            .await
            .map_err(|reason| reject(Stage::TimestampChecked, reason))?;
        if claim == NonceClaim::AlreadyClaimed {
            return Err(reject(Stage::TimestampChecked, RejectReason::ReplayDetected));
        }

        let secret = self
            .resolve_secret(&headers)
            .await
            .map_err(|reason| reject(Stage::NonceClaimed, reason))?;

        let canonical = canonical_string(
            &envelope.method,
            &envelope.path,
            &headers.timestamp,
            &headers.nonce,
            &headers.device_id,
        );
        let expected = compute_signature(&canonical, &secret);
        if !signatures_match(&expected, &headers.signature) {
            return Err(reject(Stage::SecretResolved, RejectReason::InvalidSignature));
        }

        debug!("Device {} reached {:?}", headers.device_id, Stage::SignatureVerified);
        Ok(headers.device_id)
    }

    /// Looks up the device secret, registering the supplied bootstrap secret
    /// when the device is unknown.
    async fn resolve_secret(&self, headers: &AuthHeaders) -> Result<String, RejectReason> {
        let device_id = headers.device_id.as_str();

        if let Some(secret) = self.bounded("secret lookup", self.secrets.get(device_id)).await? {
            return Ok(secret);
        }

        let bootstrap = match &headers.device_secret {
            Some(secret) if self.allow_bootstrap => secret,
            Some(_) => {
                warn!("Bootstrap disabled, ignoring secret offered by device {}", device_id);
                return Err(RejectReason::UnknownDevice);
            }
            None => return Err(RejectReason::UnknownDevice),
        };

        if self.bounded("secret bootstrap", self.secrets.set(device_id, bootstrap)).await? {
            info!("Registered new device {}", device_id);
            return Ok(bootstrap.clone());
        }

        // Another request registered this device first; its secret wins.
        debug!("Device {} was registered concurrently", device_id);
        self.bounded("secret lookup", self.secrets.get(device_id))
            .await?
            .ok_or(RejectReason::UnknownDevice)
    }

    /// Runs one store call under the store timeout. Failures of any kind
    /// become `StoreUnavailable`.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, RejectReason>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let outcome = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        };

        outcome.map_err(|e| {
            error!("Store {} failed: {}", operation, e);
            RejectReason::StoreUnavailable
        })
    }
}
