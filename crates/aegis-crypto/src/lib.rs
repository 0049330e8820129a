//! # aegis-crypto
//!
//! Cryptographic primitives for the Aegis verification engine.
//!
//! - `CryptographicProvider`: Ed25519 result signing and verification with a
//!   maximum signature age, plus HKDF-derived keys for MACs and local storage
//! - `mac`: HMAC-SHA256 and constant-time comparison
//! - `sealing`: HKDF-SHA256 and ChaCha20-Poly1305 for data kept on disk
//! - `pow`: hash proof of work for local rate limiting
//! - `commitment`: hiding hash commitments with a random blinding factor
//! - `DigestAttestationGenerator`: the default `AttestationGenerator`

pub mod attestation;
pub mod commitment;
pub mod mac;
pub mod pow;
pub mod provider;
pub mod sealing;

pub use attestation::{DigestAttestationGenerator, DIGEST_SCHEME};
pub use commitment::{generate_commitment, verify_commitment, Commitment};
pub use mac::{constant_time_eq, generate_hmac, verify_hmac};
pub use pow::{generate_proof_of_work, verify_proof_of_work, ProofOfWork};
pub use provider::{CryptographicProvider, ALGORITHM};
pub use sealing::{decrypt_data, derive_key, encrypt_data};
