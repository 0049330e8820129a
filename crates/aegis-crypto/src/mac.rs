//! HMAC-SHA256 tags and constant-time comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use aegis_contracts::error::{AegisError, AegisResult};

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `data` under `key`.
pub fn generate_hmac(key: &[u8], data: &[u8]) -> AegisResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AegisError::cryptographic(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex-encoded tag. Malformed hex is a mismatch, not an error.
pub fn verify_hmac(key: &[u8], data: &[u8], tag: &str) -> bool {
    let Ok(expected) = hex::decode(tag) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

/// Byte equality that does not short-circuit on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
