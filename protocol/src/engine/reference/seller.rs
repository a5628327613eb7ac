//! Seller transcript: answer one request, release one secret.

use std::path::Path;
use std::sync::Arc;

use ark_ff::UniformRand;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::config::{MAX_KEYWORD_LENGTH, MAX_QUERY_ITEMS, SESSION_KEY_LENGTH};
use crate::crypto::commit;
use crate::crypto::signing::vrf_prove;
use crate::engine::reference::messages::{
    field_key, hash_key_commitment, read_artifact, write_artifact, KeyCommitment, KeyOpening,
    MessageKind, Receipt, Request, RequestQuery, ResponseBody, SealedEntry, SecretBody,
    SignedResponse, SignedSecret,
};
use crate::engine::reference::params::EngineParams;
use crate::engine::reference::publish::PrivateData;
use crate::engine::reference::SessionContext;
use crate::engine::EngineError;
use crate::types::{Range, RangeSet};

struct Pending {
    response_digest: [u8; 32],
    opening: KeyOpening,
}

pub(crate) struct SellerTranscript {
    pub(crate) ctx: SessionContext,
    params: Arc<EngineParams>,
    pending: Option<Pending>,
}

fn rejected(reason: impl Into<String>) -> EngineError {
    EngineError::Rejected(reason.into())
}

impl SellerTranscript {
    pub fn new(ctx: SessionContext, params: Arc<EngineParams>) -> Self {
        Self {
            ctx,
            params,
            pending: None,
        }
    }

    /// Fresh session key, its commitment and the opening released later.
    fn key_material(&self) -> Result<([u8; 32], KeyCommitment, KeyOpening), EngineError> {
        if self.ctx.variant.capabilities().verifiable_commitment {
            let value = ark_bn254::Fr::rand(&mut OsRng);
            let blinding = ark_bn254::Fr::rand(&mut OsRng);
            let point = commit(self.params.pedersen(), value, blinding)
                .to_bytes()
                .map_err(|e| rejected(format!("key commitment: {e}")))?;
            Ok((
                field_key(&value)?,
                KeyCommitment::Pedersen(point),
                KeyOpening::pedersen(&value, &blinding)?,
            ))
        } else {
            let mut key = [0u8; SESSION_KEY_LENGTH];
            OsRng.fill_bytes(&mut key);
            Ok((
                key,
                KeyCommitment::Hash(hash_key_commitment(&self.ctx.tag, &key)),
                KeyOpening::Hash(key),
            ))
        }
    }

    fn seal_ranges(
        &self,
        private: &PrivateData,
        ranges: Vec<Range>,
        key: &[u8; 32],
    ) -> Result<Vec<SealedEntry>, EngineError> {
        let set = RangeSet::new(ranges).map_err(|e| rejected(e.to_string()))?;
        let record_count = private.records.len() as u64;
        set.distinct_indices()
            .into_iter()
            .map(|index| {
                let slot = usize::try_from(index)
                    .ok()
                    .filter(|_| index < record_count)
                    .ok_or_else(|| {
                        rejected(format!("record {index} is beyond the {record_count} published"))
                    })?;
                let payload = [private.salts[slot].as_slice(), &private.records[slot]].concat();
                SealedEntry::seal(key, &self.ctx.tag, index, &payload)
            })
            .collect()
    }

    fn seal_keywords(
        &self,
        private: &PrivateData,
        key_name: &str,
        values: &[String],
        key: &[u8; 32],
    ) -> Result<Vec<SealedEntry>, EngineError> {
        if !self.ctx.data.bulletin.has_key(key_name) {
            return Err(rejected(format!("{key_name:?} is not an indexed column")));
        }
        if values.is_empty() || values.len() > MAX_QUERY_ITEMS {
            return Err(rejected(format!("{} keyword values requested", values.len())));
        }
        let vrf_key = private.vrf_key();
        values
            .iter()
            .zip(0u64..)
            .map(|(value, position)| {
                if value.len() > MAX_KEYWORD_LENGTH {
                    return Err(rejected("keyword value too long"));
                }
                let proof = vrf_prove(&vrf_key, key_name, value);
                SealedEntry::seal(key, &self.ctx.tag, position, &proof)
            })
            .collect()
    }

    pub fn on_request(&mut self, input: &Path, output: &Path) -> Result<(), EngineError> {
        if self.pending.is_some() {
            return Err(rejected("request already answered"));
        }
        let request: Request = read_artifact(input, MessageKind::Request)?;
        if request.tag != self.ctx.tag {
            return Err(rejected("request belongs to another session"));
        }
        if request.ot_binding != self.ctx.expected_binding()? {
            return Err(rejected("request is not bound to this negotiation"));
        }
        let caps = self.ctx.variant.capabilities();
        if request.demand_commitment.is_some() != caps.negotiation {
            return Err(rejected("demand commitment does not fit the variant"));
        }

        let data = Arc::clone(&self.ctx.data);
        let private = data.private()?;
        let (key, key_commitment, opening) = self.key_material()?;
        let entries = match request.query {
            RequestQuery::Ranges(ranges) if !caps.keyword_query => {
                self.seal_ranges(private, ranges, &key)?
            }
            RequestQuery::Keywords { key_name, values } if caps.keyword_query => {
                self.seal_keywords(private, &key_name, &values, &key)?
            }
            _ => return Err(rejected(format!("query kind does not fit {}", self.ctx.variant))),
        };
        let served = entries.len();

        let body = ResponseBody {
            tag: self.ctx.tag,
            key_commitment,
            demand_commitment: request.demand_commitment,
            entries,
        };
        let response = SignedResponse::sign(body, &private.signing_key())?;
        let response_digest = response.body.digest()?;
        write_artifact(output, MessageKind::Response, &response)?;

        debug!(variant = %self.ctx.variant, served, "response sealed");
        self.pending = Some(Pending {
            response_digest,
            opening,
        });
        Ok(())
    }

    pub fn on_receipt(&mut self, input: &Path, output: &Path) -> Result<(), EngineError> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| rejected("no response to acknowledge"))?;
        let receipt: Receipt = read_artifact(input, MessageKind::Receipt)?;
        if receipt.tag != self.ctx.tag || receipt.response_digest != pending.response_digest {
            return Err(EngineError::VerificationFailed(
                "receipt does not acknowledge this response".into(),
            ));
        }
        if !receipt.is_well_formed() {
            return Err(EngineError::VerificationFailed(
                "receipt acknowledgement is invalid".into(),
            ));
        }

        let body = SecretBody {
            tag: self.ctx.tag,
            response_digest: pending.response_digest,
            opening: pending.opening.clone(),
        };
        let private = self.ctx.data.private()?;
        let secret = SignedSecret::sign(body, &private.signing_key())?;
        write_artifact(output, MessageKind::Secret, &secret)?;
        debug!(variant = %self.ctx.variant, "secret released");
        Ok(())
    }
}
