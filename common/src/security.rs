//! Request signing shared by the gateway and the device client.
//!
//! A signature is the lowercase hex SHA-256 of the canonical string with the
//! device secret appended. Existing clients sign this way, so the digest
//! construction is fixed.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const SIGNING_DELIMITER: &str = "|";

/// `method|path|timestamp|nonce|device_id`, every field verbatim.
pub fn canonical_string(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: &str,
    device_id: &str,
) -> String {
    [method, path, timestamp, nonce, device_id].join(SIGNING_DELIMITER)
}

pub fn compute_signature(canonical: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn sign_request(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: &str,
    device_id: &str,
    secret: &str,
) -> String {
    compute_signature(&canonical_string(method, path, timestamp, nonce, device_id), secret)
}

/// Exact string comparison that does not short-circuit on the first
/// differing byte.
pub fn signatures_match(expected: &str, supplied: &str) -> bool {
    let expected = expected.as_bytes();
    let supplied = supplied.as_bytes();
    expected.len() == supplied.len() && bool::from(expected.ct_eq(supplied))
}
