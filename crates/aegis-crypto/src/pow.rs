//! Hash-based proof of work used for local rate limiting.
//!
//! A proof for `(challenge, difficulty)` is a counter whose
//! `SHA-256(challenge ":" counter)` hex digest starts with `difficulty` zeros.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use aegis_contracts::error::{AegisError, AegisResult};

/// Highest accepted difficulty, in leading hex zeros.
pub const MAX_DIFFICULTY: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub counter: u64,
    /// Hex digest that satisfied the difficulty.
    pub hash: String,
}

fn pow_hash(challenge: &str, counter: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(b":");
    hasher.update(counter.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn meets(hash: &str, difficulty: u32) -> bool {
    hash.bytes().take(difficulty as usize).filter(|b| *b == b'0').count() == difficulty as usize
}

pub fn generate_proof_of_work(challenge: &str, difficulty: u32) -> AegisResult<ProofOfWork> {
    if difficulty > MAX_DIFFICULTY {
        return Err(AegisError::cryptographic(format!(
            "proof-of-work difficulty {difficulty} exceeds the maximum of {MAX_DIFFICULTY}"
        )));
    }
    (0..u64::MAX)
        .map(|counter| (counter, pow_hash(challenge, counter)))
        .find(|(_, hash)| meets(hash, difficulty))
        .map(|(counter, hash)| ProofOfWork { counter, hash })
        .ok_or_else(|| AegisError::cryptographic("proof-of-work search exhausted"))
}

pub fn verify_proof_of_work(challenge: &str, difficulty: u32, proof: &ProofOfWork) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }
    let hash = pow_hash(challenge, proof.counter);
    hash == proof.hash && meets(&hash, difficulty)
}
