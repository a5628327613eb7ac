//! # Reference Proof Engine
//!
//! A complete, in-process [`ProofEngine`] built from the primitives in
//! [`crate::crypto`]:
//!
//! - Records are salted and committed with BLAKE3; the commitments form a
//!   Merkle tree whose root is announced in the [`Bulletin`].
//! - A response seals every served record under a fresh session key and
//!   commits to that key (hash commitment, or Pedersen for the
//!   verifiable-commitment swap). Responses and secrets are signed by the
//!   seller with Ed25519.
//! - The secret is the commitment opening. A buyer checks it, opens the
//!   records and compares them with the published commitments.
//! - Keyword variants deliver Ed25519-based VRF proofs instead of records;
//!   the VRF outputs index the published keyword table.
//! - OT variants run an X25519 negotiation first and request a phantom
//!   superset of their real demand.
//!
//! Resources live in concurrent maps keyed by [`ResourceId`]; each session
//! sits behind its own mutex, so independent sessions never contend.

pub mod bulletin;
pub(crate) mod buyer;
pub mod messages;
pub(crate) mod negotiation;
pub mod notary;
pub mod params;
pub mod publish;
pub(crate) mod seller;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::CONTEXT_SESSION_TAG;
use crate::crypto::domain_separated_hash_multi;
use crate::crypto::hash::length_prefixed;
use crate::engine::{EngineError, ProofEngine, ResourceId};
use crate::session::VariantKind;
use crate::types::{DataMode, Identity, Query};

use self::buyer::BuyerTranscript;
use self::messages::{read_artifact, write_artifact, MessageKind, NegoMessage};
use self::negotiation::NegoState;
use self::publish::PublishedData;
use self::seller::SellerTranscript;

pub use bulletin::Bulletin;
pub use notary::{adjudicate, Accusation, Claim, NotaryError, Verdict};
pub use params::EngineParams;
pub use publish::{publish, publish_with_rng, PublishError, PublishOptions};

/// Tag binding a session to its variant, both parties and the dataset.
pub(crate) fn session_tag(
    variant: VariantKind,
    seller: &Identity,
    buyer: &Identity,
    merkle_root: &[u8; 32],
) -> [u8; 32] {
    domain_separated_hash_multi(
        CONTEXT_SESSION_TAG,
        &[
            &length_prefixed(variant.name().as_bytes()),
            &length_prefixed(seller.as_bytes()),
            &length_prefixed(buyer.as_bytes()),
            merkle_root,
        ],
    )
}

/// State both transcript kinds share.
pub(crate) struct SessionContext {
    pub variant: VariantKind,
    pub tag: [u8; 32],
    pub data: Arc<PublishedData>,
    pub nego: NegoState,
    pub is_seller: bool,
}

impl SessionContext {
    fn new(
        variant: VariantKind,
        data: Arc<PublishedData>,
        seller: &Identity,
        buyer: &Identity,
        is_seller: bool,
    ) -> Result<Self, EngineError> {
        if variant.id_width(data.mode) != Some(seller.width())
            || variant.id_width(data.mode) != Some(buyer.width())
        {
            return Err(EngineError::Rejected(format!(
                "identities do not fit {variant} over {} data",
                data.mode
            )));
        }
        let tag = session_tag(variant, seller, buyer, &data.bulletin.merkle_root);
        Ok(Self {
            variant,
            tag,
            data,
            nego: NegoState::default(),
            is_seller,
        })
    }

    fn ensure_negotiated_variant(&self) -> Result<(), EngineError> {
        if !self.variant.capabilities().negotiation {
            return Err(EngineError::Rejected(format!(
                "{} does not negotiate",
                self.variant
            )));
        }
        Ok(())
    }

    /// Binding the request must carry, if the variant negotiates.
    pub fn expected_binding(&self) -> Result<Option<[u8; 32]>, EngineError> {
        if !self.variant.capabilities().negotiation {
            return Ok(None);
        }
        self.nego.binding(&self.tag, self.is_seller).map(Some)
    }

    fn get_nego_request(&mut self, output: &Path) -> Result<(), EngineError> {
        self.ensure_negotiated_variant()?;
        let initiation = self.nego.initiate(self.tag)?;
        write_artifact(output, MessageKind::NegoRequest, &initiation.message)?;
        self.nego.record_initiation(initiation);
        Ok(())
    }

    fn on_nego_request(&mut self, input: &Path, output: &Path) -> Result<(), EngineError> {
        self.ensure_negotiated_variant()?;
        let request: NegoMessage = read_artifact(input, MessageKind::NegoRequest)?;
        let answer = self.nego.respond(self.tag, &request)?;
        write_artifact(output, MessageKind::NegoResponse, &answer.message)?;
        self.nego.record_answer(answer);
        Ok(())
    }

    fn on_nego_response(&mut self, input: &Path) -> Result<(), EngineError> {
        self.ensure_negotiated_variant()?;
        let response: NegoMessage = read_artifact(input, MessageKind::NegoResponse)?;
        self.nego.finish(self.tag, &response)
    }
}

enum EngineSession {
    Seller(SellerTranscript),
    Buyer(BuyerTranscript),
}

impl EngineSession {
    fn context(&mut self) -> &mut SessionContext {
        match self {
            EngineSession::Seller(s) => &mut s.ctx,
            EngineSession::Buyer(b) => &mut b.ctx,
        }
    }
}

/// In-process engine over datasets produced by [`publish`].
pub struct ReferenceEngine {
    params: Arc<EngineParams>,
    next_id: AtomicU64,
    data: DashMap<ResourceId, Arc<PublishedData>>,
    sessions: DashMap<ResourceId, Arc<Mutex<EngineSession>>>,
}

impl ReferenceEngine {
    pub fn new(params: EngineParams) -> Self {
        Self {
            params: Arc::new(params),
            next_id: AtomicU64::new(1),
            data: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Datasets plus sessions currently held.
    pub fn live_resources(&self) -> usize {
        self.data.len() + self.sessions.len()
    }

    fn allocate(&self) -> ResourceId {
        ResourceId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn dataset(&self, id: ResourceId) -> Result<Arc<PublishedData>, EngineError> {
        self.data
            .get(&id)
            .map(|d| Arc::clone(d.value()))
            .ok_or(EngineError::UnknownResource(id))
    }

    fn session(&self, id: ResourceId) -> Result<Arc<Mutex<EngineSession>>, EngineError> {
        // Clone out of the map so no shard lock is held while the session runs.
        self.sessions
            .get(&id)
            .map(|s| Arc::clone(s.value()))
            .ok_or(EngineError::UnknownResource(id))
    }

    fn insert_session(&self, session: EngineSession) -> ResourceId {
        let id = self.allocate();
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    fn with_context<T>(
        &self,
        id: ResourceId,
        f: impl FnOnce(&mut SessionContext) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let session = self.session(id)?;
        let mut guard = session.lock();
        f(guard.context())
    }

    fn with_seller<T>(
        &self,
        id: ResourceId,
        f: impl FnOnce(&mut SellerTranscript) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let session = self.session(id)?;
        let mut guard = session.lock();
        match &mut *guard {
            EngineSession::Seller(seller) => f(seller),
            EngineSession::Buyer(_) => Err(EngineError::Rejected(format!(
                "session {id} is a buyer session"
            ))),
        }
    }

    fn with_buyer<T>(
        &self,
        id: ResourceId,
        f: impl FnOnce(&mut BuyerTranscript) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let session = self.session(id)?;
        let mut guard = session.lock();
        match &mut *guard {
            EngineSession::Buyer(buyer) => f(buyer),
            EngineSession::Seller(_) => Err(EngineError::Rejected(format!(
                "session {id} is a seller session"
            ))),
        }
    }
}

impl ProofEngine for ReferenceEngine {
    fn new_seller_data(
        &self,
        mode: DataMode,
        publish_dir: &Path,
    ) -> Result<ResourceId, EngineError> {
        let data = PublishedData::load_seller(mode, publish_dir)?;
        let id = self.allocate();
        self.data.insert(id, Arc::new(data));
        debug!(resource = %id, %mode, "seller data registered");
        Ok(id)
    }

    fn new_buyer_data(
        &self,
        mode: DataMode,
        bulletin: &Path,
        public_dir: &Path,
    ) -> Result<ResourceId, EngineError> {
        let data = PublishedData::load_buyer(mode, bulletin, public_dir)?;
        let id = self.allocate();
        self.data.insert(id, Arc::new(data));
        debug!(resource = %id, %mode, "buyer data registered");
        Ok(id)
    }

    fn free_data(&self, data: ResourceId) -> Result<(), EngineError> {
        self.data
            .remove(&data)
            .map(|_| trace!(resource = %data, "data freed"))
            .ok_or(EngineError::UnknownResource(data))
    }

    fn new_seller_session(
        &self,
        variant: VariantKind,
        data: ResourceId,
        seller: &Identity,
        buyer: &Identity,
    ) -> Result<ResourceId, EngineError> {
        let data = self.dataset(data)?;
        data.private()?;
        let ctx = SessionContext::new(variant, data, seller, buyer, true)?;
        let transcript = SellerTranscript::new(ctx, Arc::clone(&self.params));
        Ok(self.insert_session(EngineSession::Seller(transcript)))
    }

    fn new_buyer_session(
        &self,
        variant: VariantKind,
        data: ResourceId,
        seller: &Identity,
        buyer: &Identity,
        query: &Query,
    ) -> Result<ResourceId, EngineError> {
        if !variant.accepts(query) {
            return Err(EngineError::Rejected(format!(
                "{variant} cannot serve this demand"
            )));
        }
        let data = self.dataset(data)?;
        let ctx = SessionContext::new(variant, data, seller, buyer, false)?;
        let transcript = BuyerTranscript::new(ctx, Arc::clone(&self.params), query.clone());
        Ok(self.insert_session(EngineSession::Buyer(transcript)))
    }

    fn free_session(&self, session: ResourceId) -> Result<(), EngineError> {
        self.sessions
            .remove(&session)
            .map(|_| trace!(resource = %session, "session freed"))
            .ok_or(EngineError::UnknownResource(session))
    }

    fn get_nego_request(&self, session: ResourceId, output: &Path) -> Result<(), EngineError> {
        self.with_context(session, |ctx| ctx.get_nego_request(output))
    }

    fn on_nego_request(
        &self,
        session: ResourceId,
        input: &Path,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.with_context(session, |ctx| ctx.on_nego_request(input, output))
    }

    fn on_nego_response(&self, session: ResourceId, input: &Path) -> Result<(), EngineError> {
        self.with_context(session, |ctx| ctx.on_nego_response(input))
    }

    fn get_request(&self, session: ResourceId, output: &Path) -> Result<(), EngineError> {
        self.with_buyer(session, |buyer| buyer.get_request(output))
    }

    fn on_request(
        &self,
        session: ResourceId,
        input: &Path,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.with_seller(session, |seller| seller.on_request(input, output))
    }

    fn on_response(
        &self,
        session: ResourceId,
        input: &Path,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.with_buyer(session, |buyer| buyer.on_response(input, output))
    }

    fn on_receipt(
        &self,
        session: ResourceId,
        input: &Path,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.with_seller(session, |seller| seller.on_receipt(input, output))
    }

    fn on_secret(
        &self,
        session: ResourceId,
        input: &Path,
        positions: Option<&Path>,
    ) -> Result<(), EngineError> {
        self.with_buyer(session, |buyer| buyer.on_secret(input, positions))
    }

    fn generate_claim(&self, session: ResourceId, output: &Path) -> Result<(), EngineError> {
        self.with_buyer(session, |buyer| buyer.generate_claim(output))
    }

    fn decrypt(&self, session: ResourceId, output: &Path) -> Result<(), EngineError> {
        self.with_buyer(session, |buyer| buyer.decrypt(output))
    }
}
