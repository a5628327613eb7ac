//! # Hashing Utilities
//!
//! BLAKE3 is the protocol hash: record commitments, session tags, digests
//! and the Merkle tree over record commitments all use it, always behind a
//! domain-separation context from [`crate::config`]. SHA-256 appears only
//! where a fixed, widely known construction is wanted (the VRF output).
//!
//! ## Merkle tree
//!
//! A plain binary tree over 32-byte leaves. Odd levels duplicate their last
//! node and a single leaf is paired with itself, so the root is always the
//! output of a hash. [`merkle_proof`] and [`verify_merkle_proof`] follow the
//! exact same shape, which is what lets a third party check one record
//! commitment against the root published in a bulletin.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Plain BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 over several parts fed in sequence, without concatenating.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// BLAKE3 in `derive_key` mode under `context`.
///
/// Hashes under different contexts never collide, whatever the data.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    domain_separated_hash_multi(context, &[data])
}

/// [`domain_separated_hash`] over several parts fed in sequence.
///
/// Parts are not length-prefixed. Callers mixing variable-length parts
/// must frame them (see [`length_prefixed`]).
pub fn domain_separated_hash_multi(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Frame `data` as `len (u64 LE) || data`.
pub fn length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(data);
    out
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    blake3_hash_multi(&[left.as_slice(), right.as_slice()])
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    level
        .chunks(2)
        .map(|chunk| {
            let left = &chunk[0];
            // Odd level: the last node is paired with itself.
            let right = chunk.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Merkle root over `leaves`. All zeros for an empty tree.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = next_level(leaves);
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Inclusion proof for one leaf: its index and the sibling at every level,
/// bottom up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub index: u64,
    pub siblings: Vec<[u8; 32]>,
}

/// Build the inclusion proof for `leaves[index]`.
pub fn merkle_proof(leaves: &[[u8; 32]], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }
    let mut level = leaves.to_vec();
    let mut position = index;
    let mut siblings = Vec::new();
    loop {
        let sibling = level.get(position ^ 1).copied().unwrap_or(level[position]);
        siblings.push(sibling);
        level = next_level(&level);
        position /= 2;
        if level.len() == 1 {
            break;
        }
    }
    Some(MerkleProof {
        index: index as u64,
        siblings,
    })
}

/// Check that `leaf` sits at `proof.index` under `root`.
pub fn verify_merkle_proof(root: &[u8; 32], leaf: &[u8; 32], proof: &MerkleProof) -> bool {
    let mut node = *leaf;
    let mut position = proof.index;
    for sibling in &proof.siblings {
        node = if position % 2 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        };
        position /= 2;
    }
    position == 0 && node == *root
}
