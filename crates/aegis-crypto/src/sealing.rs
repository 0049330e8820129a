//! Key derivation and authenticated encryption for data kept on local disk.
//!
//! Sealed blobs are `nonce (12 bytes) || ciphertext || tag (16 bytes)` under
//! ChaCha20-Poly1305. A fresh random nonce is drawn for every call.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use aegis_contracts::error::{AegisError, AegisResult};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// HKDF-SHA256 expansion of `master` into a 32-byte key bound to `info`.
pub fn derive_key(master: &[u8], salt: &[u8], info: &[u8]) -> AegisResult<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master);
    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| AegisError::cryptographic(format!("key derivation failed: {e}")))?;
    Ok(okm)
}

pub fn encrypt_data(key: &[u8; KEY_LEN], plaintext: &[u8]) -> AegisResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| AegisError::cryptographic("encryption failed"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a blob produced by `encrypt_data`. Any tampering fails authentication.
pub fn decrypt_data(key: &[u8; KEY_LEN], sealed: &[u8]) -> AegisResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(AegisError::cryptographic("sealed data is truncated"));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AegisError::cryptographic("decryption failed: authentication tag mismatch"))
}
