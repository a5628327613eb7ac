//! # Cryptographic Primitives
//!
//! The reference engine's building blocks, each a thin wrapper over an
//! audited crate:
//!
//! - **BLAKE3** for commitments, digests and the Merkle tree.
//! - **AES-256-GCM** for sealing delivered records.
//! - **Pedersen over BN254** for the verifiable key commitment.
//! - **Ed25519** for seller signatures and the keyword VRF.
//! - **X25519** for the OT negotiation (used directly by the engine).

pub mod commitment;
pub mod encryption;
pub mod hash;
pub mod signing;

pub use commitment::{commit, verify_commitment, Commitment, PedersenParams};
pub use encryption::{derive_record_key, open, seal, EncryptionError};
pub use hash::{
    blake3_hash, domain_separated_hash, domain_separated_hash_multi, merkle_proof, merkle_root,
    verify_merkle_proof, MerkleProof,
};
pub use signing::{sign, verify, vrf_prove, vrf_verify};
