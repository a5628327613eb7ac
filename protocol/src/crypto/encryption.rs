//! # Record Sealing (AES-256-GCM)
//!
//! Delivered records travel sealed under keys derived from a per-session
//! secret. Every record gets its own key, `H(session_key, index)`, and each
//! key seals exactly one message, so the nonce is fixed at zero and the
//! ciphertext is fully determined by `(session_key, index, plaintext, aad)`.
//! That determinism is what lets a third party re-open a disputed record
//! from the released secret alone.
//!
//! Never reuse a record key for a second plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

use crate::config::{AES_NONCE_LENGTH, CONTEXT_RECORD_KEY, SESSION_KEY_LENGTH};
use crate::crypto::hash::domain_separated_hash_multi;

/// Sealing failures. They carry no detail about the cause.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("sealing failed")]
    SealFailed,

    #[error("opening failed -- wrong key, wrong context or corrupted ciphertext")]
    OpenFailed,
}

/// The single-use key for record `index` in a session.
pub fn derive_record_key(session_key: &[u8; SESSION_KEY_LENGTH], index: u64) -> [u8; 32] {
    domain_separated_hash_multi(CONTEXT_RECORD_KEY, &[session_key, &index.to_le_bytes()])
}

/// Seal `plaintext` under a single-use `key`, authenticating `aad`.
pub fn seal(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::SealFailed)?;
    let nonce_bytes = [0u8; AES_NONCE_LENGTH];
    cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::SealFailed)
}

/// Open a ciphertext produced by [`seal`] with the same key and `aad`.
pub fn open(key: &[u8; 32], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::OpenFailed)?;
    let nonce_bytes = [0u8; AES_NONCE_LENGTH];
    cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::OpenFailed)
}
