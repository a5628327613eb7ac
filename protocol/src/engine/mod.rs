//! # Proof Engine Contract
//!
//! The session layer never touches commitments, proofs or keys. It drives a
//! [`ProofEngine`]: one method per logical step, each taking an opaque
//! [`ResourceId`] plus artifact paths, each either producing its output
//! artifact or failing.
//!
//! Variants are data, not code: the engine learns which protocol shape a
//! session follows from the [`VariantKind`] it was created with, and the
//! session layer decides which steps a variant may call at all.
//!
//! Engines are shared behind `Arc<dyn ProofEngine>` and must be `Send +
//! Sync`. Calls on one resource are always serialized by its owning session;
//! calls on different resources may arrive concurrently.

pub mod reference;

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::VariantKind;
use crate::types::{DataMode, Identity, Query};

/// Opaque handle to an engine-side resource (published data or session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(u64);

impl ResourceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failures reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The resource id is unknown, or was already freed.
    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),

    /// Published data is missing, inconsistent, or of the wrong mode.
    #[error("invalid published data: {0}")]
    InvalidData(String),

    /// The call is not acceptable in the resource's current state, or its
    /// arguments are out of bounds.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A peer artifact failed a cryptographic check.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Reading or writing an artifact failed.
    #[error("artifact i/o failed: {0}")]
    Io(#[from] io::Error),

    /// An artifact could not be decoded.
    #[error("malformed artifact: {0}")]
    Malformed(String),
}

/// The call contract between sessions and an engine.
pub trait ProofEngine: Send + Sync {
    /// Open the seller's view of a published dataset.
    fn new_seller_data(&self, mode: DataMode, publish_dir: &Path)
        -> Result<ResourceId, EngineError>;

    /// Open the buyer's view: the bulletin plus the public directory.
    fn new_buyer_data(
        &self,
        mode: DataMode,
        bulletin: &Path,
        public_dir: &Path,
    ) -> Result<ResourceId, EngineError>;

    fn free_data(&self, data: ResourceId) -> Result<(), EngineError>;

    fn new_seller_session(
        &self,
        variant: VariantKind,
        data: ResourceId,
        seller: &Identity,
        buyer: &Identity,
    ) -> Result<ResourceId, EngineError>;

    fn new_buyer_session(
        &self,
        variant: VariantKind,
        data: ResourceId,
        seller: &Identity,
        buyer: &Identity,
        query: &Query,
    ) -> Result<ResourceId, EngineError>;

    fn free_session(&self, session: ResourceId) -> Result<(), EngineError>;

    /// Start this side's negotiation half.
    fn get_nego_request(&self, session: ResourceId, output: &Path) -> Result<(), EngineError>;

    /// Answer the peer's negotiation request.
    fn on_nego_request(
        &self,
        session: ResourceId,
        input: &Path,
        output: &Path,
    ) -> Result<(), EngineError>;

    /// Finish this side's negotiation half with the peer's answer.
    fn on_nego_response(&self, session: ResourceId, input: &Path) -> Result<(), EngineError>;

    /// Buyer: encode the demand into a request.
    fn get_request(&self, session: ResourceId, output: &Path) -> Result<(), EngineError>;

    /// Seller: answer a request.
    fn on_request(&self, session: ResourceId, input: &Path, output: &Path)
        -> Result<(), EngineError>;

    /// Buyer: verify a response and issue a receipt.
    fn on_response(
        &self,
        session: ResourceId,
        input: &Path,
        output: &Path,
    ) -> Result<(), EngineError>;

    /// Seller: verify a receipt and release the secret.
    fn on_receipt(&self, session: ResourceId, input: &Path, output: &Path)
        -> Result<(), EngineError>;

    /// Buyer: verify the secret. Keyword variants write resolved positions
    /// to `positions`.
    fn on_secret(
        &self,
        session: ResourceId,
        input: &Path,
        positions: Option<&Path>,
    ) -> Result<(), EngineError>;

    /// Buyer: write a dispute claim for a rejected secret.
    fn generate_claim(&self, session: ResourceId, output: &Path) -> Result<(), EngineError>;

    /// Buyer: write the demanded plaintext.
    fn decrypt(&self, session: ResourceId, output: &Path) -> Result<(), EngineError>;
}
