use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use crate::error::RejectReason;

pub const HEADER_DEVICE_ID: &str = "x-device-id";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
pub const HEADER_NONCE: &str = "x-nonce";
pub const HEADER_SIGNATURE: &str = "x-signature";
pub const HEADER_DEVICE_SECRET: &str = "x-device-secret";

/// Auth headers exactly as they arrived, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuthHeaders {
    pub device_id: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub device_secret: Option<String>,
}

impl RawAuthHeaders {
    /// Collects the auth headers from `(name, value)` pairs. Names match
    /// case-insensitively; the first occurrence of a name wins.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut raw = Self::default();
        for (name, value) in pairs {
            let slot = match name.to_ascii_lowercase().as_str() {
                HEADER_DEVICE_ID => &mut raw.device_id,
                HEADER_TIMESTAMP => &mut raw.timestamp,
                HEADER_NONCE => &mut raw.nonce,
                HEADER_SIGNATURE => &mut raw.signature,
                HEADER_DEVICE_SECRET => &mut raw.device_secret,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        raw
    }
}

/// Validated auth headers. Values are kept verbatim because they feed the
/// canonical signing string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub device_id: String,
    /// The `x-timestamp` value as sent.
    pub timestamp: String,
    /// `timestamp` parsed as epoch milliseconds.
    pub timestamp_ms: i64,
    pub nonce: String,
    pub signature: String,
    pub device_secret: Option<String>,
}

impl AuthHeaders {
    /// All four required headers must be present and non-empty, and the
    /// timestamp must be a decimal integer.
    pub fn validate(raw: &RawAuthHeaders) -> Result<Self, RejectReason> {
        let device_id = required(&raw.device_id)?;
        let timestamp = required(&raw.timestamp)?;
        let nonce = required(&raw.nonce)?;
        let signature = required(&raw.signature)?;

        let timestamp_ms = timestamp
            .parse::<i64>()
            .map_err(|_| RejectReason::MissingHeaders)?;

        Ok(Self {
            device_id,
            timestamp,
            timestamp_ms,
            nonce,
            signature,
            device_secret: raw.device_secret.clone().filter(|s| !s.is_empty()),
        })
    }
}

fn required(value: &Option<String>) -> Result<String, RejectReason> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(RejectReason::MissingHeaders),
    }
}

/// Everything the verifier needs from one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub method: String,
    pub path: String,
    pub headers: RawAuthHeaders,
}

impl RequestEnvelope {
    pub fn new(method: impl Into<String>, path: impl Into<String>, headers: RawAuthHeaders) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers,
        }
    }
}

/// Outcome of verifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(String),
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// Body of `POST /api/rewrite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRequest {
    #[serde(default)]
    pub content: Option<String>,
    /// Any JSON value; `null`, `false`, `0` and `""` mean English.
    #[serde(default, rename = "translateToFrench", deserialize_with = "truthy")]
    pub translate_to_french: bool,
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteData {
    pub response: String,
}

/// Envelope for every JSON answer the gateway gives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}
