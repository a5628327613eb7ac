//! Claims and their adjudication.
//!
//! A claim bundles the seller-signed response and secret with the buyer's
//! accusation. Everything in it is checkable against the public bulletin,
//! so any third party holding the bulletin and engine parameters can judge
//! it with [`adjudicate`]. Nothing the buyer asserts is taken on trust.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::crypto::{verify_merkle_proof, MerkleProof};
use crate::engine::reference::bulletin::{hex32, Bulletin};
use crate::engine::reference::messages::{split_salted, SignedResponse, SignedSecret};
use crate::engine::reference::params::EngineParams;
use crate::engine::reference::publish::record_commitment;
use crate::engine::EngineError;
use crate::session::VariantKind;

/// What the buyer says went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Accusation {
    /// The released secret does not open the committed key.
    OpeningMismatch,
    /// A delivered record does not match its published commitment.
    RecordMismatch {
        index: u64,
        #[serde(with = "hex32")]
        commitment: [u8; 32],
        proof: MerkleProof,
    },
    /// Something failed that the seller's signatures do not cover.
    Unattributable { reason: String },
}

/// A dispute claim, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub variant: VariantKind,
    #[serde(with = "hex32")]
    pub tag: [u8; 32],
    #[serde(with = "hex32")]
    pub merkle_root: [u8; 32],
    pub response: SignedResponse,
    pub secret: Option<SignedSecret>,
    pub accusation: Accusation,
}

impl Claim {
    pub fn to_json(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec_pretty(self).map_err(|e| EngineError::Malformed(e.to_string()))
    }

    /// Parse a claim. Claims from variants without a dispute path are
    /// rejected.
    pub fn from_json(bytes: &[u8]) -> Result<Self, NotaryError> {
        let claim: Claim =
            serde_json::from_slice(bytes).map_err(|e| NotaryError::Malformed(e.to_string()))?;
        if !claim.variant.capabilities().claim {
            return Err(NotaryError::NotDisputable(claim.variant));
        }
        Ok(claim)
    }
}

/// Outcome of adjudicating a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    /// The seller misbehaved.
    Upheld { reason: String },
    /// The claim proves nothing against the seller.
    Dismissed { reason: String },
}

impl Verdict {
    pub fn is_upheld(&self) -> bool {
        matches!(self, Verdict::Upheld { .. })
    }

    fn upheld(reason: impl Into<String>) -> Self {
        Verdict::Upheld {
            reason: reason.into(),
        }
    }

    fn dismissed(reason: impl Into<String>) -> Self {
        Verdict::Dismissed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("malformed claim: {0}")]
    Malformed(String),

    #[error("claim was made against a different dataset")]
    BulletinMismatch,

    #[error("{0} sessions have no dispute path")]
    NotDisputable(VariantKind),
}

/// Judge a serialized claim against the dataset's bulletin.
pub fn adjudicate(
    bulletin: &Bulletin,
    params: &EngineParams,
    claim: &[u8],
) -> Result<Verdict, NotaryError> {
    let claim = Claim::from_json(claim)?;
    if claim.merkle_root != bulletin.merkle_root {
        return Err(NotaryError::BulletinMismatch);
    }
    let verdict = judge(bulletin, params, &claim);
    info!(
        claim = %claim.id,
        variant = %claim.variant,
        upheld = verdict.is_upheld(),
        "claim adjudicated"
    );
    Ok(verdict)
}

fn judge(bulletin: &Bulletin, params: &EngineParams, claim: &Claim) -> Verdict {
    let response = &claim.response;
    let Ok(digest) = response.verify(&bulletin.seller_key) else {
        return Verdict::dismissed("response is not signed by the seller");
    };
    if response.body.tag != claim.tag {
        return Verdict::dismissed("response belongs to another session");
    }
    let Some(secret) = &claim.secret else {
        return Verdict::dismissed("no seller-signed secret to judge");
    };
    if secret.verify(&bulletin.seller_key).is_err() {
        return Verdict::dismissed("secret is not signed by the seller");
    }
    if secret.body.tag != claim.tag || secret.body.response_digest != digest {
        return Verdict::dismissed("secret does not belong to the response");
    }

    let key = match secret
        .body
        .opening
        .session_key(&response.body.key_commitment, &claim.tag, params.pedersen())
    {
        Ok(key) => key,
        Err(_) => return Verdict::upheld("secret does not open the committed key"),
    };

    match &claim.accusation {
        Accusation::OpeningMismatch => Verdict::dismissed("secret opens the committed key"),
        Accusation::Unattributable { reason } => {
            Verdict::dismissed(format!("not attributable to the seller: {reason}"))
        }
        Accusation::RecordMismatch {
            index,
            commitment,
            proof,
        } => {
            if proof.index != *index
                || !verify_merkle_proof(&bulletin.merkle_root, commitment, proof)
            {
                return Verdict::dismissed("commitment is not in the published tree");
            }
            let Some(entry) = response.body.entry(*index) else {
                return Verdict::dismissed(format!("response holds no entry {index}"));
            };
            let Ok(opened) = entry.open(&key, &claim.tag) else {
                return Verdict::upheld(format!(
                    "entry {index} does not decrypt under the released key"
                ));
            };
            match split_salted(&opened) {
                Some((salt, record)) if record_commitment(*index, &salt, record) == *commitment => {
                    Verdict::dismissed(format!("record {index} matches its commitment"))
                }
                _ => Verdict::upheld(format!("record {index} does not match its commitment")),
            }
        }
    }
}
