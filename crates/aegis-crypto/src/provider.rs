//! Ed25519-backed `ResultSigner`.
//!
//! A signature covers only aggregated, non-sensitive fields of a
//! `VerificationResult`:
//!
//! ```text
//! verified, trust_score, risk_level, recommendation, timestamp,
//! SHA-256(warnings), SHA-256(details), nonce, signed_at
//! ```
//!
//! The payload is serialized as compact JSON in that fixed field order,
//! prefixed with a domain tag and hashed with SHA-256. The digest is signed.
//! `signed_at` is part of the payload, so editing it invalidates the signature.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use aegis_contracts::{
    decision::Decision,
    error::{AegisError, AegisResult},
    result::{Recommendation, RiskLevel, Signature, VerificationResult},
};
use aegis_core::traits::ResultSigner;

use crate::{
    mac::{self, constant_time_eq},
    sealing::{self, KEY_LEN},
};

pub const ALGORITHM: &str = "ed25519";

const SIGNING_DOMAIN: &[u8] = b"aegis/verification-result/v1\0";
const NONCE_BYTES: usize = 16;
/// Tolerated clock skew for signatures dated slightly in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 5;

#[derive(Serialize)]
struct SigningPayload<'a> {
    verified: bool,
    trust_score: f64,
    risk_level: RiskLevel,
    recommendation: Recommendation,
    timestamp: &'a DateTime<Utc>,
    warnings_hash: String,
    details_hash: String,
    nonce: &'a str,
    signed_at: &'a DateTime<Utc>,
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn json_digest<T: Serialize + ?Sized>(value: &T, what: &str) -> AegisResult<String> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| AegisError::cryptographic(format!("failed to encode {what}: {e}")))?;
    Ok(sha256_hex(&bytes))
}

fn signing_digest(
    result: &VerificationResult,
    nonce: &str,
    signed_at: &DateTime<Utc>,
) -> AegisResult<[u8; 32]> {
    let payload = SigningPayload {
        verified: result.verified,
        trust_score: result.trust_score,
        risk_level: result.risk_level,
        recommendation: result.recommendation,
        timestamp: &result.timestamp,
        warnings_hash: json_digest(&result.warnings, "warnings")?,
        details_hash: json_digest(&result.details, "details")?,
        nonce,
        signed_at,
    };
    let canonical = serde_json::to_vec(&payload)
        .map_err(|e| AegisError::cryptographic(format!("failed to encode signing payload: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(SIGNING_DOMAIN);
    hasher.update(&canonical);
    Ok(hasher.finalize().into())
}

/// Signs and verifies results with a local Ed25519 key.
///
/// The key never leaves the process. Secondary keys for MACs and local
/// encryption are derived from it with HKDF, one per purpose.
pub struct CryptographicProvider {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    fingerprint: String,
    max_signature_age: Duration,
}

impl fmt::Debug for CryptographicProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptographicProvider")
            .field("algorithm", &ALGORITHM)
            .field("fingerprint", &self.fingerprint)
            .field("max_signature_age_secs", &self.max_signature_age.num_seconds())
            .finish_non_exhaustive()
    }
}

impl CryptographicProvider {
    /// Generate a fresh key from the OS random source.
    pub fn generate(max_signature_age_secs: u64) -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng), max_signature_age_secs)
    }

    /// Rebuild a provider from a persisted 32-byte secret key.
    pub fn from_bytes(secret: &[u8; 32], max_signature_age_secs: u64) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret), max_signature_age_secs)
    }

    fn from_signing_key(signing_key: SigningKey, max_signature_age_secs: u64) -> Self {
        let verifying_key = signing_key.verifying_key();
        let fingerprint = sha256_hex(verifying_key.as_bytes());
        let secs = i64::try_from(max_signature_age_secs).unwrap_or(i64::MAX);
        Self {
            signing_key,
            verifying_key,
            fingerprint,
            max_signature_age: Duration::try_seconds(secs).unwrap_or(Duration::MAX),
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Derive a purpose-bound 32-byte key from the signing secret.
    pub fn derive_key(&self, purpose: &str) -> AegisResult<[u8; KEY_LEN]> {
        sealing::derive_key(
            self.signing_key.as_bytes(),
            b"aegis/derived-key/v1",
            purpose.as_bytes(),
        )
    }

    pub fn generate_hmac(&self, data: &[u8]) -> AegisResult<String> {
        mac::generate_hmac(&self.derive_key("hmac")?, data)
    }

    pub fn verify_hmac(&self, data: &[u8], tag: &str) -> bool {
        match self.derive_key("hmac") {
            Ok(key) => mac::verify_hmac(&key, data, tag),
            Err(_) => false,
        }
    }

    /// Seal data for local storage under a key derived from this provider.
    pub fn encrypt_data(&self, plaintext: &[u8]) -> AegisResult<Vec<u8>> {
        sealing::encrypt_data(&self.derive_key("local-storage")?, plaintext)
    }

    pub fn decrypt_data(&self, sealed: &[u8]) -> AegisResult<Vec<u8>> {
        sealing::decrypt_data(&self.derive_key("local-storage")?, sealed)
    }

    pub(crate) fn sign_at(
        &self,
        result: &VerificationResult,
        nonce: &str,
        signed_at: DateTime<Utc>,
    ) -> AegisResult<Signature> {
        let digest = signing_digest(result, nonce, &signed_at)?;
        let signature = self.signing_key.sign(&digest);
        Ok(Signature {
            algorithm: ALGORITHM.to_string(),
            value: hex::encode(signature.to_bytes()),
            public_key_fingerprint: self.fingerprint.clone(),
            signed_at,
        })
    }

    fn check_signature(
        &self,
        result: &VerificationResult,
        nonce: &str,
        signature: &Signature,
    ) -> Result<(), &'static str> {
        if signature.algorithm != ALGORITHM {
            return Err("algorithm mismatch");
        }
        if !constant_time_eq(
            signature.public_key_fingerprint.as_bytes(),
            self.fingerprint.as_bytes(),
        ) {
            return Err("unknown signing key");
        }

        let age = Utc::now().signed_duration_since(signature.signed_at);
        if age > self.max_signature_age {
            return Err("signature expired");
        }
        if age < -Duration::seconds(MAX_CLOCK_SKEW_SECS) {
            return Err("signature dated in the future");
        }

        let bytes = hex::decode(&signature.value).map_err(|_| "signature is not hex")?;
        let sig = Ed25519Signature::from_slice(&bytes).map_err(|_| "signature has wrong length")?;
        let digest = signing_digest(result, nonce, &signature.signed_at)
            .map_err(|_| "payload could not be encoded")?;
        self.verifying_key
            .verify_strict(&digest, &sig)
            .map_err(|_| "signature does not match")
    }
}

impl ResultSigner for CryptographicProvider {
    fn algorithm(&self) -> &str {
        ALGORITHM
    }

    fn generate_nonce(&self) -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn digest(&self, data: &[u8]) -> String {
        sha256_hex(data)
    }

    fn hash_decision(&self, decision: &Decision) -> String {
        let timeframe = decision.timeframe.as_deref().unwrap_or("");
        sha256_hex(format!("{}|{}|{}", decision.action, decision.asset, timeframe).as_bytes())
    }

    fn sign_result(&self, result: &VerificationResult, nonce: &str) -> AegisResult<Signature> {
        self.sign_at(result, nonce, Utc::now())
    }

    fn verify_signature(
        &self,
        result: &VerificationResult,
        nonce: &str,
        signature: &Signature,
    ) -> bool {
        match self.check_signature(result, nonce, signature) {
            Ok(()) => {
                debug!(fingerprint = %self.fingerprint, "signature verified");
                true
            }
            Err(reason) => {
                warn!(reason, "signature rejected");
                false
            }
        }
    }
}
