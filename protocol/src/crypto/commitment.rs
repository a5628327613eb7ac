//! # Pedersen Commitments over BN254
//!
//! ```text
//! C = v * G + r * H      (on BN254/G1)
//! ```
//!
//! Used by the verifiable-commitment swap variant: the seller commits to a
//! field element `v` in its response and later opens it with `(v, r)`. The
//! session key is derived from `v`, so the buyer (or a notary) can check
//! that the released key is exactly the committed one.
//!
//! `G` and `H` come from the one-time engine setup and must have no known
//! discrete-log relation.

use std::ops::Mul;

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use ark_std::rand::Rng;

/// Generators for the commitment scheme.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PedersenParams {
    /// Value generator.
    pub g: G1Affine,
    /// Blinding generator.
    pub h: G1Affine,
}

/// A commitment point.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Commitment {
    pub point: G1Affine,
}

impl PedersenParams {
    /// Draw fresh random generators.
    pub fn setup<R: Rng>(rng: &mut R) -> Self {
        let g = G1Projective::rand(rng).into_affine();
        let h = G1Projective::rand(rng).into_affine();
        debug_assert!(!g.is_zero() && !h.is_zero());
        Self { g, h }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buf = Vec::new();
        self.serialize_compressed(&mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SerializationError> {
        Self::deserialize_compressed(data)
    }
}

/// `C = value * G + blinding * H`.
pub fn commit(params: &PedersenParams, value: Fr, blinding: Fr) -> Commitment {
    let point = (params.g.mul(value) + params.h.mul(blinding)).into_affine();
    Commitment { point }
}

/// Whether `commitment` opens to `(value, blinding)`.
pub fn verify_commitment(
    params: &PedersenParams,
    commitment: &Commitment,
    value: Fr,
    blinding: Fr,
) -> bool {
    commit(params, value, blinding) == *commitment
}

impl Commitment {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buf = Vec::new();
        self.serialize_compressed(&mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SerializationError> {
        Self::deserialize_compressed(data)
    }
}

/// Compressed encoding of a scalar.
pub fn scalar_to_bytes(value: &Fr) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::new();
    value.serialize_compressed(&mut buf)?;
    Ok(buf)
}

pub fn scalar_from_bytes(data: &[u8]) -> Result<Fr, SerializationError> {
    Fr::deserialize_compressed(data)
}
