//! # Seller Signatures and the Keyword VRF
//!
//! Ed25519 signs every response and secret a seller releases. A claim is
//! only attributable to a seller because of these signatures.
//!
//! The same primitive doubles as a verifiable random function for keyword
//! lookups: Ed25519 signing is deterministic (RFC 8032), so the signature
//! over a framed `(key_name, value)` is a proof, and its SHA-256 is the
//! pseudo-random output that indexes the public keyword table. Verification
//! uses `verify_strict`, which rejects non-canonical signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::CryptoRngCore;

use crate::config::CONTEXT_VRF_INPUT;
use crate::crypto::hash::{domain_separated_hash_multi, length_prefixed, sha256_array};

/// Generate a fresh signing key.
pub fn generate_signing_key<R: CryptoRngCore + ?Sized>(rng: &mut R) -> SigningKey {
    SigningKey::generate(rng)
}

/// Public key bytes for `key`.
pub fn verifying_key_bytes(key: &SigningKey) -> [u8; 32] {
    key.verifying_key().to_bytes()
}

/// Sign `message`. Returns the 64 signature bytes.
pub fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    key.sign(message).to_bytes().to_vec()
}

/// Check `signature` over `message` under the raw public key.
///
/// Malformed keys and signatures simply fail.
pub fn verify(verifying_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(verifying_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify_strict(message, &signature).is_ok()
}

fn vrf_input(key_name: &str, value: &str) -> [u8; 32] {
    domain_separated_hash_multi(
        CONTEXT_VRF_INPUT,
        &[
            &length_prefixed(key_name.as_bytes()),
            &length_prefixed(value.as_bytes()),
        ],
    )
}

/// VRF proof for `value` in column `key_name`.
pub fn vrf_prove(key: &SigningKey, key_name: &str, value: &str) -> Vec<u8> {
    sign(key, &vrf_input(key_name, value))
}

/// VRF output carried by a proof.
pub fn vrf_output(proof: &[u8]) -> [u8; 32] {
    sha256_array(proof)
}

/// Verify a VRF proof and return its output.
pub fn vrf_verify(
    verifying_key: &[u8; 32],
    key_name: &str,
    value: &str,
    proof: &[u8],
) -> Option<[u8; 32]> {
    verify(verifying_key, &vrf_input(key_name, value), proof).then(|| vrf_output(proof))
}
