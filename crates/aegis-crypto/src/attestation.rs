//! Default attestation generator.
//!
//! This is a SHA-256 digest over a result's public aggregate fields. It is
//! not a zero-knowledge proof and says so in its scheme identifier. A real
//! proof system can replace it behind `AttestationGenerator`.

use sha2::{Digest, Sha256};

use aegis_contracts::{
    error::AegisResult,
    result::{Attestation, VerificationResult},
};
use aegis_core::traits::AttestationGenerator;

use crate::mac::constant_time_eq;

pub const DIGEST_SCHEME: &str = "sha256-digest";

const DOMAIN: &[u8] = b"aegis/attestation/v1";

/// Commits to `verified`, trust score, risk level, recommendation, and timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestAttestationGenerator;

impl DigestAttestationGenerator {
    fn public_inputs(result: &VerificationResult) -> Vec<String> {
        vec![
            result.verified.to_string(),
            format!("{:.2}", result.trust_score),
            result.risk_level.as_str().to_string(),
            result.recommendation.as_str().to_string(),
            result.timestamp.to_rfc3339(),
        ]
    }

    fn payload(inputs: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        for input in inputs {
            hasher.update((input.len() as u64).to_le_bytes());
            hasher.update(input.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// True if `attestation` was produced by this scheme for `result`.
    pub fn verify(&self, result: &VerificationResult, attestation: &Attestation) -> bool {
        if attestation.scheme != DIGEST_SCHEME {
            return false;
        }
        let inputs = Self::public_inputs(result);
        inputs == attestation.public_inputs
            && constant_time_eq(Self::payload(&inputs).as_bytes(), attestation.payload.as_bytes())
    }
}

impl AttestationGenerator for DigestAttestationGenerator {
    fn attest(&self, result: &VerificationResult) -> AegisResult<Attestation> {
        let public_inputs = Self::public_inputs(result);
        Ok(Attestation {
            scheme: DIGEST_SCHEME.to_string(),
            payload: Self::payload(&public_inputs),
            public_inputs,
        })
    }
}
