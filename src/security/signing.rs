//! HMAC-SHA256 signing of outbound webhook bodies.
//!
//! The partner verifies `sha256=hex(HMAC(secret, "{timestamp}.{raw_body}"))`,
//! so `raw_body` must be the exact string that goes on the wire.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Timestamp and signature header values for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Unix seconds.
    pub timestamp: i64,
    /// `"sha256=" + lowercase hex digest`.
    pub signature: String,
}

/// Sign `raw_body`. `timestamp` defaults to the current unix time.
pub fn sign(
    secret: &str,
    raw_body: &str,
    timestamp: Option<i64>,
) -> Result<SignedRequest, InvalidLength> {
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body.as_bytes());

    Ok(SignedRequest {
        timestamp,
        signature: format!("sha256={}", hex::encode(mac.finalize().into_bytes())),
    })
}

/// Check a `sha256=<hex>` header against `secret` in constant time.
pub fn verify(secret: &str, raw_body: &str, timestamp: i64, signature_header: &str) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{timestamp}.{raw_body}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}
