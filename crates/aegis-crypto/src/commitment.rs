//! Hiding hash commitments.
//!
//! `commit(value)` returns `SHA-256(domain || blinding || value)` together with
//! the random 32-byte blinding factor needed to open it later. Without the
//! blinding factor the commitment reveals nothing about low-entropy values
//! such as trust scores.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::mac::constant_time_eq;

const DOMAIN: &[u8] = b"aegis/commitment/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Hex digest to publish.
    pub commitment: String,
    /// Hex blinding factor. Keep private until the commitment is opened.
    pub blinding: String,
}

fn digest(blinding: &[u8], value: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    hasher.update(blinding);
    hasher.update(value);
    hasher.finalize().into()
}

pub fn generate_commitment(value: &[u8]) -> Commitment {
    let mut blinding = [0u8; 32];
    OsRng.fill_bytes(&mut blinding);
    Commitment {
        commitment: hex::encode(digest(&blinding, value)),
        blinding: hex::encode(blinding),
    }
}

pub fn verify_commitment(commitment: &str, value: &[u8], blinding: &str) -> bool {
    let (Ok(expected), Ok(blinding)) = (hex::decode(commitment), hex::decode(blinding)) else {
        return false;
    };
    constant_time_eq(&digest(&blinding, value), &expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_with_value_and_blinding() {
        let c = generate_commitment(b"87.5");
        assert!(verify_commitment(&c.commitment, b"87.5", &c.blinding));
        assert!(!verify_commitment(&c.commitment, b"87.6", &c.blinding));
    }

    #[test]
    fn same_value_commits_differently() {
        let a = generate_commitment(b"approved");
        let b = generate_commitment(b"approved");
        assert_ne!(a.commitment, b.commitment);
        assert!(!verify_commitment(&a.commitment, b"approved", &b.blinding));
    }
}
