//! Buyer transcript: request, verify, acknowledge, open.
//!
//! A rejected secret is remembered together with what the buyer can prove
//! about it, so a claim can be written afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CONTEXT_DEMAND_COMMITMENT;
use crate::crypto::signing::vrf_verify;
use crate::crypto::{domain_separated_hash_multi, merkle_proof};
use crate::engine::reference::messages::{
    encode, read_artifact, split_salted, write_artifact, KeyCommitment, MessageKind, Positions,
    Receipt, Request, RequestQuery, SignedResponse, SignedSecret,
};
use crate::engine::reference::notary::{Accusation, Claim};
use crate::engine::reference::params::EngineParams;
use crate::engine::reference::publish::record_commitment;
use crate::engine::reference::SessionContext;
use crate::engine::EngineError;
use crate::types::{DataMode, KeywordSet, Query, RangeSet};

struct VerifiedResponse {
    signed: SignedResponse,
    digest: [u8; 32],
}

struct Rejection {
    secret: Option<SignedSecret>,
    accusation: Accusation,
}

enum Opened {
    Records(BTreeMap<u64, Vec<u8>>),
    Keywords(Vec<Positions>),
}

pub(crate) struct BuyerTranscript {
    pub(crate) ctx: SessionContext,
    params: Arc<EngineParams>,
    query: Query,
    demand_nonce: [u8; 32],
    request: Option<Request>,
    response: Option<VerifiedResponse>,
    opened: Option<Opened>,
    rejection: Option<Rejection>,
}

fn rejected(reason: impl Into<String>) -> EngineError {
    EngineError::Rejected(reason.into())
}

fn to_request_query(
    ranges: Option<&RangeSet>,
    keywords: Option<&KeywordSet>,
) -> Option<RequestQuery> {
    match (ranges, keywords) {
        (Some(r), _) => Some(RequestQuery::Ranges(r.ranges().to_vec())),
        (None, Some(k)) => Some(RequestQuery::Keywords {
            key_name: k.key_name().to_owned(),
            values: k.values().to_vec(),
        }),
        (None, None) => None,
    }
}

/// Failure while checking a secret: the error to report and what it proves.
type SecretFailure = (EngineError, Accusation);

fn unattributable(reason: &str) -> SecretFailure {
    (
        EngineError::VerificationFailed(reason.to_owned()),
        Accusation::Unattributable {
            reason: reason.to_owned(),
        },
    )
}

impl BuyerTranscript {
    pub fn new(ctx: SessionContext, params: Arc<EngineParams>, query: Query) -> Self {
        let mut demand_nonce = [0u8; 32];
        OsRng.fill_bytes(&mut demand_nonce);
        Self {
            ctx,
            params,
            query,
            demand_nonce,
            request: None,
            response: None,
            opened: None,
            rejection: None,
        }
    }

    fn requested(&self) -> Result<RequestQuery, EngineError> {
        to_request_query(self.query.requested_ranges(), self.query.requested_keywords())
            .ok_or_else(|| rejected("empty query"))
    }

    /// Commitment to the real demand inside a phantom request.
    fn demand_commitment(&self) -> Result<[u8; 32], EngineError> {
        let demanded =
            to_request_query(self.query.demanded_ranges(), self.query.demanded_keywords())
                .ok_or_else(|| rejected("empty demand"))?;
        Ok(domain_separated_hash_multi(
            CONTEXT_DEMAND_COMMITMENT,
            &[&self.ctx.tag, &self.demand_nonce, &encode(&demanded)?],
        ))
    }

    fn check_against_bulletin(&self, query: &RequestQuery) -> Result<(), EngineError> {
        let bulletin = &self.ctx.data.bulletin;
        match query {
            RequestQuery::Ranges(ranges) => {
                for range in ranges {
                    match range.end() {
                        Some(end) if end <= bulletin.record_count => {}
                        _ => {
                            return Err(rejected(format!(
                                "range {}+{} is beyond the {} published records",
                                range.start, range.count, bulletin.record_count
                            )))
                        }
                    }
                }
            }
            RequestQuery::Keywords { key_name, .. } => {
                if !bulletin.has_key(key_name) {
                    return Err(rejected(format!("{key_name:?} is not an indexed column")));
                }
            }
        }
        Ok(())
    }

    pub fn get_request(&mut self, output: &Path) -> Result<(), EngineError> {
        if self.request.is_some() {
            return Err(rejected("request already sent"));
        }
        let query = self.requested()?;
        self.check_against_bulletin(&query)?;
        let demand_commitment = if self.query.has_phantoms() {
            Some(self.demand_commitment()?)
        } else {
            None
        };
        let request = Request {
            tag: self.ctx.tag,
            ot_binding: self.ctx.expected_binding()?,
            demand_commitment,
            query,
        };
        write_artifact(output, MessageKind::Request, &request)?;
        self.request = Some(request);
        Ok(())
    }

    fn expected_entries(request: &Request) -> BTreeSet<u64> {
        match &request.query {
            RequestQuery::Ranges(ranges) => ranges.iter().flat_map(|r| r.indices()).collect(),
            RequestQuery::Keywords { values, .. } => (0..values.len() as u64).collect(),
        }
    }

    pub fn on_response(&mut self, input: &Path, output: &Path) -> Result<(), EngineError> {
        let request = self
            .request
            .as_ref()
            .ok_or_else(|| rejected("no request was sent"))?;
        if self.response.is_some() {
            return Err(rejected("response already accepted"));
        }
        let signed: SignedResponse = read_artifact(input, MessageKind::Response)?;
        let digest = signed.verify(&self.ctx.data.bulletin.seller_key)?;
        let body = &signed.body;

        let fail = |reason: &str| Err(EngineError::VerificationFailed(reason.to_owned()));
        if body.tag != self.ctx.tag {
            return fail("response belongs to another session");
        }
        if body.demand_commitment != request.demand_commitment {
            return fail("response does not echo the demand commitment");
        }
        let pedersen = matches!(body.key_commitment, KeyCommitment::Pedersen(_));
        if pedersen != self.ctx.variant.capabilities().verifiable_commitment {
            return fail("key commitment scheme does not fit the variant");
        }
        let served: Vec<u64> = body.entries.iter().map(|e| e.index).collect();
        let expected = Self::expected_entries(request);
        if served.len() != expected.len() || !served.iter().copied().eq(expected.iter().copied()) {
            return fail("response does not cover exactly the requested items");
        }

        let receipt = Receipt::acknowledge(self.ctx.tag, digest);
        write_artifact(output, MessageKind::Receipt, &receipt)?;
        debug!(variant = %self.ctx.variant, entries = served.len(), "response accepted");
        self.response = Some(VerifiedResponse { signed, digest });
        Ok(())
    }

    fn check_secret(
        &self,
        response: &VerifiedResponse,
        secret: &SignedSecret,
    ) -> Result<Opened, SecretFailure> {
        let bulletin = &self.ctx.data.bulletin;
        if secret.verify(&bulletin.seller_key).is_err() {
            return Err(unattributable("secret is not signed by the seller"));
        }
        if secret.body.tag != self.ctx.tag || secret.body.response_digest != response.digest {
            return Err(unattributable("secret belongs to another response"));
        }
        let commitment = &response.signed.body.key_commitment;
        let key = secret
            .body
            .opening
            .session_key(commitment, &self.ctx.tag, self.params.pedersen())
            .map_err(|e| (e, Accusation::OpeningMismatch))?;

        let entries = &response.signed.body.entries;
        match self.query.requested_keywords() {
            None => {
                let commitments = &self.ctx.data.public.commitments;
                let mut records = BTreeMap::new();
                for entry in entries {
                    let index = entry.index;
                    let commitment = usize::try_from(index)
                        .ok()
                        .and_then(|i| commitments.get(i).map(|c| (i, *c)));
                    let Some((slot, commitment)) = commitment else {
                        return Err(unattributable("entry index is out of bounds"));
                    };
                    let accuse = || {
                        merkle_proof(commitments, slot).map(|proof| Accusation::RecordMismatch {
                            index,
                            commitment,
                            proof,
                        })
                    };
                    let failure = |reason: String| {
                        let accusation = accuse().unwrap_or(Accusation::Unattributable {
                            reason: reason.clone(),
                        });
                        (EngineError::VerificationFailed(reason), accusation)
                    };
                    let opened = entry
                        .open(&key, &self.ctx.tag)
                        .map_err(|e| failure(e.to_string()))?;
                    let (salt, record) = split_salted(&opened)
                        .ok_or_else(|| failure(format!("entry {index} is truncated")))?;
                    if record_commitment(index, &salt, record) != commitment {
                        return Err(failure(format!(
                            "record {index} does not match its commitment"
                        )));
                    }
                    records.insert(index, record.to_vec());
                }
                Ok(Opened::Records(records))
            }
            Some(requested) => {
                let key_name = requested.key_name();
                let mut outputs = BTreeMap::new();
                // Positions are not bound to values in the signed response,
                // so keyword failures cannot back a claim.
                for (entry, value) in entries.iter().zip(requested.values()) {
                    let proof = entry
                        .open(&key, &self.ctx.tag)
                        .map_err(|e| unattributable(&e.to_string()))?;
                    let output = vrf_verify(&bulletin.vrf_key, key_name, value, &proof)
                        .ok_or_else(|| {
                            unattributable(&format!("VRF proof for {value:?} is invalid"))
                        })?;
                    outputs.insert(value.as_str(), output);
                }

                let demanded = self
                    .query
                    .demanded_keywords()
                    .ok_or_else(|| unattributable("keyword session without a demand"))?;
                let index = self.ctx.data.public.keyword_index.get(key_name);
                let positions = demanded
                    .values()
                    .iter()
                    .map(|value| Positions {
                        key_name: key_name.to_owned(),
                        value: value.clone(),
                        positions: outputs
                            .get(value.as_str())
                            .and_then(|output| index.and_then(|column| column.get(output)))
                            .cloned()
                            .unwrap_or_default(),
                    })
                    .collect();
                Ok(Opened::Keywords(positions))
            }
        }
    }

    pub fn on_secret(&mut self, input: &Path, positions: Option<&Path>) -> Result<(), EngineError> {
        let response = self
            .response
            .as_ref()
            .ok_or_else(|| rejected("no response was accepted"))?;
        let keyword = self.ctx.variant.capabilities().keyword_query;
        if keyword != positions.is_some() {
            return Err(rejected("positions output is required for keyword sessions only"));
        }

        let secret: SignedSecret = match read_artifact(input, MessageKind::Secret) {
            Ok(secret) => secret,
            Err(err @ EngineError::Malformed(_)) => {
                self.rejection = Some(Rejection {
                    secret: None,
                    accusation: Accusation::Unattributable {
                        reason: err.to_string(),
                    },
                });
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        match self.check_secret(response, &secret) {
            Ok(opened) => {
                if let (Opened::Keywords(found), Some(path)) = (&opened, positions) {
                    let json = serde_json::to_vec_pretty(found)
                        .map_err(|e| rejected(format!("positions: {e}")))?;
                    fs::write(path, json)?;
                }
                self.opened = Some(opened);
                self.rejection = None;
                debug!(variant = %self.ctx.variant, "secret verified");
                Ok(())
            }
            Err((err, accusation)) => {
                warn!(variant = %self.ctx.variant, error = %err, "secret rejected");
                self.rejection = Some(Rejection {
                    secret: Some(secret),
                    accusation,
                });
                Err(err)
            }
        }
    }

    pub fn decrypt(&mut self, output: &Path) -> Result<(), EngineError> {
        let Some(Opened::Records(records)) = &self.opened else {
            return Err(rejected("no verified records to decrypt"));
        };
        let demanded = self
            .query
            .demanded_ranges()
            .ok_or_else(|| rejected("keyword sessions do not decrypt"))?;
        let table = self.ctx.data.mode == DataMode::Table;

        let mut plaintext = Vec::new();
        for index in demanded.ranges().iter().flat_map(|r| r.indices()) {
            let record = records
                .get(&index)
                .ok_or_else(|| rejected(format!("record {index} was not delivered")))?;
            plaintext.extend_from_slice(record);
            if table {
                plaintext.push(b'\n');
            }
        }
        fs::write(output, &plaintext)?;
        debug!(variant = %self.ctx.variant, bytes = plaintext.len(), "demand decrypted");
        Ok(())
    }

    pub fn generate_claim(&mut self, output: &Path) -> Result<(), EngineError> {
        if !self.ctx.variant.capabilities().claim {
            return Err(rejected(format!("{} has no dispute path", self.ctx.variant)));
        }
        let rejection = self
            .rejection
            .as_ref()
            .ok_or_else(|| rejected("no rejected secret to dispute"))?;
        let response = self
            .response
            .as_ref()
            .ok_or_else(|| rejected("no response was accepted"))?;

        let claim = Claim {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            variant: self.ctx.variant,
            tag: self.ctx.tag,
            merkle_root: self.ctx.data.bulletin.merkle_root,
            response: response.signed.clone(),
            secret: rejection.secret.clone(),
            accusation: rejection.accusation.clone(),
        };
        fs::write(output, claim.to_json()?)?;
        debug!(claim = %claim.id, variant = %self.ctx.variant, "claim written");
        Ok(())
    }
}
