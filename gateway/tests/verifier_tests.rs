use async_trait::async_trait;
use chrono::Utc;
use common::security::{canonical_string, compute_signature, sign_request};
use common::{RawAuthHeaders, RejectReason, RequestEnvelope, Verdict, REWRITE_PATH};
use rewrite_gateway::store::{
    MemoryNonceCache, MemorySecretStore, NonceCache, NonceClaim, SecretStore, StoreError,
};
use rewrite_gateway::RequestVerifier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "s3cr3t";

struct Fixture {
    verifier: Arc<RequestVerifier>,
    secrets: Arc<MemorySecretStore>,
}

fn fixture() -> Fixture {
    let secrets = Arc::new(MemorySecretStore::new());
    let nonces = Arc::new(MemoryNonceCache::new());
    let verifier = Arc::new(RequestVerifier::new(
        secrets.clone(),
        nonces,
        Duration::from_secs(1),
        true,
    ));
    Fixture { verifier, secrets }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A correctly signed request; `bootstrap` adds `x-device-secret`.
fn signed(device_id: &str, nonce: &str, timestamp: i64, secret: &str, bootstrap: bool) -> RequestEnvelope {
    let timestamp = timestamp.to_string();
    let signature = sign_request("POST", REWRITE_PATH, &timestamp, nonce, device_id, secret);
    RequestEnvelope::new(
        "POST",
        REWRITE_PATH,
        RawAuthHeaders {
            device_id: Some(device_id.to_string()),
            timestamp: Some(timestamp),
            nonce: Some(nonce.to_string()),
            signature: Some(signature),
            device_secret: if bootstrap { Some(secret.to_string()) } else { None },
        },
    )
}

#[tokio::test]
async fn concrete_scenario_accepts_then_detects_replay() {
    let fx = fixture();
    let t = now_ms().to_string();

    let canonical = canonical_string("POST", "/api/rewrite", &t, "abc123", "dev1");
    assert_eq!(canonical, format!("POST|/api/rewrite|{}|abc123|dev1", t));
    let signature = compute_signature(&canonical, "s3cr3t");

    let envelope = RequestEnvelope::new(
        "POST",
        "/api/rewrite",
        RawAuthHeaders {
            device_id: Some("dev1".to_string()),
            timestamp: Some(t.clone()),
            nonce: Some("abc123".to_string()),
            signature: Some(signature),
            device_secret: Some("s3cr3t".to_string()),
        },
    );

    assert_eq!(fx.verifier.verify(&envelope).await, Verdict::Accepted("dev1".to_string()));
    assert_eq!(
        fx.verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::ReplayDetected)
    );
}

#[tokio::test]
async fn missing_any_required_header_is_rejected() {
    let fx = fixture();
    let clears: [fn(&mut RawAuthHeaders); 4] = [
        |h: &mut RawAuthHeaders| h.device_id = None,
        |h: &mut RawAuthHeaders| h.timestamp = None,
        |h: &mut RawAuthHeaders| h.nonce = None,
        |h: &mut RawAuthHeaders| h.signature = None,
    ];

    for (i, clear) in clears.iter().enumerate() {
        let mut envelope = signed("dev1", &format!("n{}", i), now_ms(), SECRET, true);
        clear(&mut envelope.headers);
        assert_eq!(
            fx.verifier.verify(&envelope).await,
            Verdict::Rejected(RejectReason::MissingHeaders)
        );
    }
}

#[tokio::test]
async fn empty_header_counts_as_missing() {
    let fx = fixture();
    let mut envelope = signed("dev1", "n1", now_ms(), SECRET, true);
    envelope.headers.nonce = Some(String::new());
    assert_eq!(
        fx.verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::MissingHeaders)
    );
}

#[tokio::test]
async fn drift_rejected_in_both_directions_even_when_signed() {
    let fx = fixture();
    let now = now_ms();

    let stale = signed("dev1", "stale", now - 60_001, SECRET, true);
    let future = signed("dev1", "future", now + 120_000, SECRET, true);

    for envelope in [stale, future] {
        assert_eq!(
            fx.verifier.verify_at(&envelope, now).await,
            Verdict::Rejected(RejectReason::TimestampDrift)
        );
    }
    // Drift is checked before any store is touched.
    assert!(fx.secrets.is_empty());
}

#[tokio::test]
async fn early_and_late_clocks_within_tolerance_accepted() {
    let fx = fixture();
    let now = now_ms();

    let early = signed("dev1", "early", now - 59_000, SECRET, true);
    let late = signed("dev1", "late", now + 59_000, SECRET, true);

    assert!(fx.verifier.verify_at(&early, now).await.is_accepted());
    assert!(fx.verifier.verify_at(&late, now).await.is_accepted());
}

#[tokio::test]
async fn replay_rejected_even_after_signature_failure_consumed_nonce() {
    let fx = fixture();
    let now = now_ms();

    let mut forged = signed("dev1", "shared", now, SECRET, true);
    forged.headers.signature = Some("0".repeat(64));
    assert_eq!(
        fx.verifier.verify_at(&forged, now).await,
        Verdict::Rejected(RejectReason::InvalidSignature)
    );

    let honest = signed("dev1", "shared", now, SECRET, true);
    assert_eq!(
        fx.verifier.verify_at(&honest, now).await,
        Verdict::Rejected(RejectReason::ReplayDetected)
    );
}

#[tokio::test]
async fn bootstrap_then_follow_up_without_secret() {
    let fx = fixture();

    let first = signed("dev-new", "n1", now_ms(), SECRET, true);
    assert_eq!(fx.verifier.verify(&first).await, Verdict::Accepted("dev-new".to_string()));
    assert_eq!(fx.secrets.get("dev-new").await.unwrap().as_deref(), Some(SECRET));

    let second = signed("dev-new", "n2", now_ms(), SECRET, false);
    assert_eq!(fx.verifier.verify(&second).await, Verdict::Accepted("dev-new".to_string()));
}

#[tokio::test]
async fn unknown_device_without_bootstrap_secret() {
    let fx = fixture();
    let envelope = signed("stranger", "n1", now_ms(), SECRET, false);
    assert_eq!(
        fx.verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::UnknownDevice)
    );
}

#[tokio::test]
async fn second_bootstrap_cannot_replace_stored_secret() {
    let fx = fixture();

    let first = signed("dev1", "n1", now_ms(), "original", true);
    assert!(fx.verifier.verify(&first).await.is_accepted());

    // A different secret signed consistently is still checked against the stored one.
    let hijack = signed("dev1", "n2", now_ms(), "attacker", true);
    assert_eq!(
        fx.verifier.verify(&hijack).await,
        Verdict::Rejected(RejectReason::InvalidSignature)
    );
    assert_eq!(fx.secrets.get("dev1").await.unwrap().as_deref(), Some("original"));
}

#[tokio::test]
async fn changing_any_signed_field_invalidates_signature() {
    let fx = fixture();
    let now = now_ms();

    // Register the devices so every failure below is a signature failure.
    fx.secrets.set("dev1", SECRET).await.unwrap();
    fx.secrets.set("dev2", SECRET).await.unwrap();

    let mut method = signed("dev1", "m", now, SECRET, false);
    method.method = "PUT".to_string();

    let mut path = signed("dev1", "p", now, SECRET, false);
    path.path = "/api/rewrite/".to_string();

    let mut timestamp = signed("dev1", "t", now, SECRET, false);
    timestamp.headers.timestamp = Some((now + 1).to_string());

    let mut nonce = signed("dev1", "original-nonce", now, SECRET, false);
    nonce.headers.nonce = Some("other-nonce".to_string());

    let mut device = signed("dev1", "d", now, SECRET, false);
    device.headers.device_id = Some("dev2".to_string());

    for envelope in [method, path, timestamp, nonce, device] {
        assert_eq!(
            fx.verifier.verify_at(&envelope, now).await,
            Verdict::Rejected(RejectReason::InvalidSignature)
        );
    }
}

#[tokio::test]
async fn uppercase_signature_does_not_match() {
    let fx = fixture();
    let mut envelope = signed("dev1", "n1", now_ms(), SECRET, true);
    envelope.headers.signature = envelope.headers.signature.map(|s| s.to_uppercase());
    assert_eq!(
        fx.verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::InvalidSignature)
    );
}

#[tokio::test]
async fn concurrent_duplicates_only_one_accepted() {
    let fx = fixture();
    fx.secrets.set("dev1", SECRET).await.unwrap();
    let envelope = signed("dev1", "race", now_ms(), SECRET, false);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let verifier = fx.verifier.clone();
        let envelope = envelope.clone();
        handles.push(tokio::spawn(async move { verifier.verify(&envelope).await }));
    }

    let mut accepted = 0;
    let mut replays = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Verdict::Accepted(_) => accepted += 1,
            Verdict::Rejected(RejectReason::ReplayDetected) => replays += 1,
            other => panic!("unexpected verdict {:?}", other),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(replays, 7);
}

/// A secret store where another request always registers the device between
/// this request's lookup and its write.
struct LostBootstrapRace {
    winner: &'static str,
    reads: AtomicUsize,
}

impl LostBootstrapRace {
    fn new(winner: &'static str) -> Self {
        Self { winner, reads: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl SecretStore for LostBootstrapRace {
    async fn get(&self, _device_id: &str) -> Result<Option<String>, StoreError> {
        match self.reads.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(None),
            _ => Ok(Some(self.winner.to_string())),
        }
    }

    async fn set(&self, _device_id: &str, _secret: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

fn racing_verifier(winner: &'static str) -> RequestVerifier {
    RequestVerifier::new(
        Arc::new(LostBootstrapRace::new(winner)),
        Arc::new(MemoryNonceCache::new()),
        Duration::from_secs(1),
        true,
    )
}

#[tokio::test]
async fn lost_bootstrap_race_verifies_against_stored_secret() {
    let envelope = signed("dev1", "n1", now_ms(), "winner", true);
    assert_eq!(
        racing_verifier("winner").verify(&envelope).await,
        Verdict::Accepted("dev1".to_string())
    );
}

#[tokio::test]
async fn lost_bootstrap_race_rejects_losing_secret() {
    let envelope = signed("dev1", "n1", now_ms(), "loser", true);
    assert_eq!(
        racing_verifier("winner").verify(&envelope).await,
        Verdict::Rejected(RejectReason::InvalidSignature)
    );
}

struct FailingStore;

#[async_trait]
impl SecretStore for FailingStore {
    async fn get(&self, _device_id: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _device_id: &str, _secret: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

#[async_trait]
impl NonceCache for FailingStore {
    async fn claim(&self, _device_id: &str, _nonce: &str) -> Result<NonceClaim, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

struct SlowNonceCache;

#[async_trait]
impl NonceCache for SlowNonceCache {
    async fn claim(&self, _device_id: &str, _nonce: &str) -> Result<NonceClaim, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(NonceClaim::Fresh)
    }
}

#[tokio::test]
async fn nonce_store_failure_fails_closed() {
    let verifier = RequestVerifier::new(
        Arc::new(MemorySecretStore::new()),
        Arc::new(FailingStore),
        Duration::from_secs(1),
        true,
    );
    let envelope = signed("dev1", "n1", now_ms(), SECRET, true);
    assert_eq!(
        verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::StoreUnavailable)
    );
}

#[tokio::test]
async fn secret_store_failure_fails_closed() {
    let verifier = RequestVerifier::new(
        Arc::new(FailingStore),
        Arc::new(MemoryNonceCache::new()),
        Duration::from_secs(1),
        true,
    );
    let envelope = signed("dev1", "n1", now_ms(), SECRET, true);
    assert_eq!(
        verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::StoreUnavailable)
    );
}

#[tokio::test]
async fn store_timeout_fails_closed() {
    let verifier = RequestVerifier::new(
        Arc::new(MemorySecretStore::new()),
        Arc::new(SlowNonceCache),
        Duration::from_millis(50),
        true,
    );
    let envelope = signed("dev1", "n1", now_ms(), SECRET, true);
    assert_eq!(
        verifier.verify(&envelope).await,
        Verdict::Rejected(RejectReason::StoreUnavailable)
    );
}
