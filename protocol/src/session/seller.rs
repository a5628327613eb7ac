//! Seller side of a session.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::artifact;
use crate::data::SellerData;
use crate::engine::ProofEngine;
use crate::error::{PodError, StepClass};
use crate::session::variant::{Negotiated, Variant, VariantKind};
use crate::session::{
    check_identities, new_session_handle, Negotiation, Role, SessionCore, SessionState,
};
use crate::types::{DataMode, Identity};

const WHAT: &str = "seller session";

/// The seller's half of one protocol run.
///
/// Answers one request, then releases the secret once the buyer's receipt
/// checks out.
#[derive(Debug)]
pub struct SellerSession<V: Variant> {
    // Field order matters: the engine session is freed before its data.
    core: SessionCore,
    data: SellerData,
    _variant: PhantomData<fn() -> V>,
}

impl<V: Variant> SellerSession<V> {
    /// Open the dataset under `publish_dir` and build a session on it.
    pub fn open(
        engine: Arc<dyn ProofEngine>,
        mode: DataMode,
        publish_dir: impl AsRef<Path>,
        seller: &Identity,
        buyer: &Identity,
    ) -> Result<Self, PodError> {
        let data = SellerData::open(engine, mode, publish_dir)?;
        Self::new(data, seller, buyer)
    }

    /// Build a session on already opened data. The data is released if the
    /// session cannot be built.
    pub fn new(data: SellerData, seller: &Identity, buyer: &Identity) -> Result<Self, PodError> {
        match Self::build(&data, seller, buyer) {
            Ok(core) => Ok(Self {
                core,
                data,
                _variant: PhantomData,
            }),
            Err(err) => {
                if let Err(release_err) = data.close() {
                    warn!(
                        variant = %V::KIND,
                        error = %release_err,
                        "failed to release seller data after construction failure"
                    );
                }
                Err(err)
            }
        }
    }

    fn build(
        data: &SellerData,
        seller: &Identity,
        buyer: &Identity,
    ) -> Result<SessionCore, PodError> {
        check_identities(WHAT, V::KIND, data.mode(), seller, buyer)?;
        let data_id = data.resource()?;
        let handle = new_session_handle(data.handle().engine(), WHAT, |engine| {
            engine.new_seller_session(V::KIND, data_id, seller, buyer)
        })?;
        Ok(SessionCore::new(handle, V::KIND, Role::Seller))
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn variant(&self) -> VariantKind {
        self.core.variant()
    }

    pub fn negotiation(&self) -> Negotiation {
        self.core.negotiation()
    }

    pub fn data(&self) -> &SellerData {
        &self.data
    }

    /// Answer the buyer's request. Moves to `Responded`.
    pub fn on_request(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), PodError> {
        const OP: &str = "on_request";
        let (input, output) = (input.as_ref(), output.as_ref());
        self.core.ensure_request_phase(OP)?;
        artifact::check_input(OP, input)?;
        artifact::check_output(OP, output)?;
        self.core.call(OP, StepClass::Exchange, |engine, id| {
            engine.on_request(id, input, output)
        })?;
        self.core.advance(OP, SessionState::Responded);
        Ok(())
    }

    /// Verify the buyer's receipt and release the secret. Moves to
    /// `Receipted`.
    pub fn on_receipt(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), PodError> {
        const OP: &str = "on_receipt";
        let (input, output) = (input.as_ref(), output.as_ref());
        self.core.ensure_state(OP, &[SessionState::Responded])?;
        artifact::check_input(OP, input)?;
        artifact::check_output(OP, output)?;
        self.core.call(OP, StepClass::Verify, |engine, id| {
            engine.on_receipt(id, input, output)
        })?;
        self.core.advance(OP, SessionState::Receipted);
        Ok(())
    }

    /// Free the engine session, then the data. Reports the first failure.
    pub fn close(mut self) -> Result<(), PodError> {
        let session = self.core.release();
        let data = self.data.handle_mut().release();
        debug!(variant = %V::KIND, role = %Role::Seller, "session closed");
        session.and(data)
    }
}

impl<V: Negotiated> SellerSession<V> {
    /// Start the seller-initiated negotiation half.
    pub fn get_nego_request(&mut self, output: impl AsRef<Path>) -> Result<(), PodError> {
        self.core.get_nego_request(output.as_ref())
    }

    /// Answer the buyer's negotiation request.
    pub fn on_nego_request(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), PodError> {
        self.core.on_nego_request(input.as_ref(), output.as_ref())
    }

    /// Finish the seller-initiated half with the buyer's answer.
    pub fn on_nego_response(&mut self, input: impl AsRef<Path>) -> Result<(), PodError> {
        self.core.on_nego_response(input.as_ref())
    }
}
