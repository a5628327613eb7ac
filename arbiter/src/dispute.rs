//! # Disputes over delivery sessions
//!
//! A buyer whose `OnSecret` failed can take the claim artifact to an
//! arbiter. The dispute records who is involved, which session it is about
//! and content hashes of the evidence both sides submitted.
//!
//! ## Evidence Model
//!
//! Evidence is kept as a BLAKE3 hash of the submitted bytes. The claim
//! itself is also retained verbatim because the notary needs it to rule;
//! counter-evidence from the seller is only hashed.
//!
//! ## Resolution Flow
//!
//! 1. The buyer opens a dispute with a claim artifact.
//! 2. The seller may respond with counter-evidence.
//! 3. The arbiter runs [`adjudicate`](Dispute::adjudicate) against the
//!    dataset's bulletin, or records a verdict reached elsewhere.
//! 4. The dispute moves to `ResolvedForBuyer` or `ResolvedForSeller`.

use chrono::{DateTime, Utc};
use pod_protocol::engine::reference::{adjudicate, Bulletin, Claim, NotaryError, Verdict};
use pod_protocol::{EngineParams, VariantKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during dispute operations.
#[derive(Debug, Error)]
pub enum DisputeError {
    /// The dispute is not in a state that allows this operation.
    #[error("invalid state: dispute is {current}, expected {expected}")]
    InvalidState {
        current: DisputeStatus,
        expected: &'static str,
    },

    /// The caller may not perform this operation.
    #[error("unauthorized: {party} may not {operation} this dispute")]
    Unauthorized {
        party: String,
        operation: &'static str,
    },

    /// The claim artifact could not be parsed or judged.
    #[error("claim rejected: {0}")]
    Claim(#[from] NotaryError),

    /// The dispute has already been resolved.
    #[error("dispute already resolved")]
    AlreadyResolved,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The current status of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Filed by the buyer, no answer from the seller yet.
    Open,
    /// The seller submitted counter-evidence.
    Responded,
    /// The notary upheld the claim.
    ResolvedForBuyer,
    /// The notary dismissed the claim.
    ResolvedForSeller,
    /// The buyer dropped the dispute before a ruling.
    Withdrawn,
}

impl DisputeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DisputeStatus::Open | DisputeStatus::Responded)
    }

    fn is_resolved(self) -> bool {
        matches!(
            self,
            DisputeStatus::ResolvedForBuyer | DisputeStatus::ResolvedForSeller
        )
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisputeStatus::Open => write!(f, "Open"),
            DisputeStatus::Responded => write!(f, "Responded"),
            DisputeStatus::ResolvedForBuyer => write!(f, "ResolvedForBuyer"),
            DisputeStatus::ResolvedForSeller => write!(f, "ResolvedForSeller"),
            DisputeStatus::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

/// A piece of evidence, recorded by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// The party that submitted it.
    pub submitted_by: String,
    /// BLAKE3 hash of the submitted bytes, hex-encoded.
    pub data_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl Evidence {
    fn new(party: &str, data: &[u8]) -> Self {
        Self {
            submitted_by: party.to_string(),
            data_hash: blake3::hash(data).to_hex().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// A dispute over one delivery session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    /// The claim's own identifier.
    pub claim_id: Uuid,
    pub variant: VariantKind,
    /// Session tag the claim is bound to, hex-encoded.
    pub session_tag: String,
    pub buyer: String,
    pub seller: String,
    /// The buyer's claim, hashed.
    pub evidence: Evidence,
    pub counter_evidence: Option<Evidence>,
    pub status: DisputeStatus,
    /// The notary's ruling, once there is one.
    pub verdict: Option<Verdict>,
    pub created_at: DateTime<Utc>,
    /// Set when the dispute reaches a terminal status.
    pub closed_at: Option<DateTime<Utc>>,
    claim: Vec<u8>,
}

impl Dispute {
    /// Opens a dispute from a buyer's claim artifact.
    ///
    /// The claim is parsed up front so a dispute is never filed over bytes
    /// the notary could not read.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::Claim`] if `claim` is not a well-formed claim
    /// or comes from a variant without a dispute path.
    pub fn open(buyer: String, seller: String, claim: Vec<u8>) -> Result<Self, DisputeError> {
        let parsed = Claim::from_json(&claim)?;
        let dispute = Self {
            id: Uuid::new_v4(),
            claim_id: parsed.id,
            variant: parsed.variant,
            session_tag: hex::encode(parsed.tag),
            evidence: Evidence::new(&buyer, &claim),
            buyer,
            seller,
            counter_evidence: None,
            status: DisputeStatus::Open,
            verdict: None,
            created_at: Utc::now(),
            closed_at: None,
            claim,
        };
        info!(
            dispute = %dispute.id,
            claim = %dispute.claim_id,
            variant = %dispute.variant,
            "dispute opened"
        );
        Ok(dispute)
    }

    /// The claim artifact the dispute was opened with.
    pub fn claim(&self) -> &[u8] {
        &self.claim
    }

    /// Attaches the seller's counter-evidence. Only one response is taken.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::Unauthorized`] if `party` is not the seller.
    /// Returns [`DisputeError::InvalidState`] unless the dispute is `Open`.
    pub fn respond(&mut self, party: &str, counter_evidence: &[u8]) -> Result<(), DisputeError> {
        if party != self.seller {
            return Err(DisputeError::Unauthorized {
                party: party.to_string(),
                operation: "respond to",
            });
        }
        self.require(&[DisputeStatus::Open], "Open")?;

        self.counter_evidence = Some(Evidence::new(party, counter_evidence));
        self.status = DisputeStatus::Responded;
        debug!(dispute = %self.id, "seller responded");
        Ok(())
    }

    /// Runs the notary over the claim and records its ruling.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::AlreadyResolved`] or
    /// [`DisputeError::InvalidState`] for a closed dispute, and
    /// [`DisputeError::Claim`] if the claim was made against a different
    /// dataset than `bulletin`.
    pub fn adjudicate(
        &mut self,
        bulletin: &Bulletin,
        params: &EngineParams,
    ) -> Result<DisputeStatus, DisputeError> {
        self.require_unresolved()?;
        let verdict = adjudicate(bulletin, params, &self.claim)?;
        self.record_verdict(verdict)
    }

    /// Records a verdict reached outside this process.
    pub fn record_verdict(&mut self, verdict: Verdict) -> Result<DisputeStatus, DisputeError> {
        self.require_unresolved()?;
        self.status = if verdict.is_upheld() {
            DisputeStatus::ResolvedForBuyer
        } else {
            DisputeStatus::ResolvedForSeller
        };
        self.closed_at = Some(Utc::now());
        info!(dispute = %self.id, status = %self.status, "dispute resolved");
        self.verdict = Some(verdict);
        Ok(self.status)
    }

    /// Withdraws the dispute. Only the buyer can, and only before a ruling.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::Unauthorized`] if `caller` is not the buyer.
    /// Returns [`DisputeError::InvalidState`] if the dispute is closed.
    pub fn withdraw(&mut self, caller: &str) -> Result<(), DisputeError> {
        if caller != self.buyer {
            return Err(DisputeError::Unauthorized {
                party: caller.to_string(),
                operation: "withdraw",
            });
        }
        self.require(&[DisputeStatus::Open, DisputeStatus::Responded], "Open or Responded")?;

        self.status = DisputeStatus::Withdrawn;
        self.closed_at = Some(Utc::now());
        debug!(dispute = %self.id, "dispute withdrawn");
        Ok(())
    }

    fn require_unresolved(&self) -> Result<(), DisputeError> {
        if self.status.is_resolved() {
            return Err(DisputeError::AlreadyResolved);
        }
        self.require(&[DisputeStatus::Open, DisputeStatus::Responded], "Open or Responded")
    }

    fn require(
        &self,
        allowed: &[DisputeStatus],
        expected: &'static str,
    ) -> Result<(), DisputeError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(DisputeError::InvalidState {
                current: self.status,
                expected,
            })
        }
    }
}
