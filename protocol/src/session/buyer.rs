//! Buyer side of a session.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::artifact;
use crate::data::BuyerData;
use crate::engine::ProofEngine;
use crate::error::{PodError, StepClass};
use crate::session::variant::{
    Disputable, KeywordLookup, Negotiated, RangeDelivery, Variant, VariantKind,
};
use crate::session::{
    check_identities, new_session_handle, Negotiation, Role, SessionCore, SessionState,
};
use crate::types::{DataMode, Identity, Query};

const WHAT: &str = "buyer session";

/// The buyer's half of one protocol run.
#[derive(Debug)]
pub struct BuyerSession<V: Variant> {
    // Field order matters: the engine session is freed before its data.
    core: SessionCore,
    data: BuyerData,
    query: Query,
    secret_rejected: bool,
    _variant: PhantomData<fn() -> V>,
}

impl<V: Variant> BuyerSession<V> {
    /// Open the dataset described by `bulletin` and build a session on it.
    pub fn open(
        engine: Arc<dyn ProofEngine>,
        mode: DataMode,
        bulletin: impl AsRef<Path>,
        public_dir: impl AsRef<Path>,
        seller: &Identity,
        buyer: &Identity,
        demand: V::Demand,
    ) -> Result<Self, PodError> {
        let data = BuyerData::open(engine, mode, bulletin, public_dir)?;
        Self::new(data, seller, buyer, demand)
    }

    /// Build a session on already opened data. The data is released if the
    /// session cannot be built.
    pub fn new(
        data: BuyerData,
        seller: &Identity,
        buyer: &Identity,
        demand: V::Demand,
    ) -> Result<Self, PodError> {
        let query: Query = demand.into();
        match Self::build(&data, seller, buyer, &query) {
            Ok(core) => Ok(Self {
                core,
                data,
                query,
                secret_rejected: false,
                _variant: PhantomData,
            }),
            Err(err) => {
                if let Err(release_err) = data.close() {
                    warn!(
                        variant = %V::KIND,
                        error = %release_err,
                        "failed to release buyer data after construction failure"
                    );
                }
                Err(err)
            }
        }
    }

    fn build(
        data: &BuyerData,
        seller: &Identity,
        buyer: &Identity,
        query: &Query,
    ) -> Result<SessionCore, PodError> {
        check_identities(WHAT, V::KIND, data.mode(), seller, buyer)?;
        if !V::KIND.accepts(query) {
            return Err(PodError::construction(
                WHAT,
                format!("{} cannot serve this demand shape", V::KIND),
            ));
        }
        let data_id = data.resource()?;
        let handle = new_session_handle(data.handle().engine(), WHAT, |engine| {
            engine.new_buyer_session(V::KIND, data_id, seller, buyer, query)
        })?;
        Ok(SessionCore::new(handle, V::KIND, Role::Buyer))
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

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn data(&self) -> &BuyerData {
        &self.data
    }

    /// Whether the last secret offered to this session failed verification.
    pub fn secret_rejected(&self) -> bool {
        self.secret_rejected
    }

    /// Write the request for this session's demand. Moves to `Requested`.
    pub fn get_request(&mut self, output: impl AsRef<Path>) -> Result<(), PodError> {
        const OP: &str = "get_request";
        let output = output.as_ref();
        self.core.ensure_request_phase(OP)?;
        artifact::check_output(OP, output)?;
        self.core.call(OP, StepClass::Exchange, |engine, id| {
            engine.get_request(id, output)
        })?;
        self.core.advance(OP, SessionState::Requested);
        Ok(())
    }

    /// Verify the seller's response and write a receipt for it. Moves to
    /// `Receipted`; on failure the session stays in `Requested`.
    pub fn on_response(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), PodError> {
        const OP: &str = "on_response";
        let (input, output) = (input.as_ref(), output.as_ref());
        self.core.ensure_state(OP, &[SessionState::Requested])?;
        artifact::check_input(OP, input)?;
        artifact::check_output(OP, output)?;
        self.core.call(OP, StepClass::Verify, |engine, id| {
            engine.on_response(id, input, output)
        })?;
        self.core.advance(OP, SessionState::Receipted);
        Ok(())
    }

    fn verify_secret(&mut self, input: &Path, positions: Option<&Path>) -> Result<(), PodError> {
        const OP: &str = "on_secret";
        self.core.ensure_state(OP, &[SessionState::Receipted])?;
        artifact::check_input(OP, input)?;
        if let Some(positions) = positions {
            artifact::check_output(OP, positions)?;
        }
        match self.core.call(OP, StepClass::Verify, |engine, id| {
            engine.on_secret(id, input, positions)
        }) {
            Ok(()) => {
                self.secret_rejected = false;
                self.core.advance(OP, SessionState::Secreted);
                Ok(())
            }
            Err(err @ PodError::Verification { .. }) => {
                self.secret_rejected = true;
                debug!(variant = %V::KIND, "secret rejected, session kept for the dispute path");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Free the engine session, then the data. Reports the first failure.
    pub fn close(mut self) -> Result<(), PodError> {
        let session = self.core.release();
        let data = self.data.handle_mut().release();
        debug!(variant = %V::KIND, role = %Role::Buyer, "session closed");
        session.and(data)
    }
}

impl<V: RangeDelivery> BuyerSession<V> {
    /// Verify the released secret. Moves to `Secreted`.
    ///
    /// A failed check leaves the session in `Receipted`: another secret may
    /// be offered, and disputable variants may generate a claim.
    pub fn on_secret(&mut self, input: impl AsRef<Path>) -> Result<(), PodError> {
        self.verify_secret(input.as_ref(), None)
    }

    /// Write the demanded plaintext, in demand order. Repeatable once the
    /// secret has verified; moves to `Decrypted`.
    pub fn decrypt(&mut self, output: impl AsRef<Path>) -> Result<(), PodError> {
        const OP: &str = "decrypt";
        let output = output.as_ref();
        self.core
            .ensure_state(OP, &[SessionState::Secreted, SessionState::Decrypted])?;
        artifact::check_output(OP, output)?;
        self.core.call(OP, StepClass::Exchange, |engine, id| {
            engine.decrypt(id, output)
        })?;
        self.core.advance(OP, SessionState::Decrypted);
        Ok(())
    }
}

impl<V: KeywordLookup> BuyerSession<V> {
    /// Verify the released secret and write the resolved record positions
    /// of every demanded value. Moves to `Secreted`.
    pub fn on_secret_with_positions(
        &mut self,
        input: impl AsRef<Path>,
        positions: impl AsRef<Path>,
    ) -> Result<(), PodError> {
        self.verify_secret(input.as_ref(), Some(positions.as_ref()))
    }
}

impl<V: Disputable> BuyerSession<V> {
    /// Write a claim against the seller after a rejected secret. Moves to
    /// `Claimed`; may be called again from there.
    pub fn generate_claim(&mut self, output: impl AsRef<Path>) -> Result<(), PodError> {
        const OP: &str = "generate_claim";
        let output = output.as_ref();
        match self.core.state() {
            SessionState::Claimed => {}
            SessionState::Receipted if self.secret_rejected => {}
            state => {
                return Err(PodError::protocol(
                    OP,
                    format!("no rejected secret to dispute (session is {state})"),
                ))
            }
        }
        artifact::check_output(OP, output)?;
        self.core.call(OP, StepClass::Exchange, |engine, id| {
            engine.generate_claim(id, output)
        })?;
        self.core.advance(OP, SessionState::Claimed);
        Ok(())
    }
}

impl<V: Negotiated> BuyerSession<V> {
    /// Start the buyer-initiated negotiation half.
    pub fn get_nego_request(&mut self, output: impl AsRef<Path>) -> Result<(), PodError> {
        self.core.get_nego_request(output.as_ref())
    }

    /// Answer the seller's negotiation request.
    pub fn on_nego_request(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), PodError> {
        self.core.on_nego_request(input.as_ref(), output.as_ref())
    }

    /// Finish the buyer-initiated half with the seller's answer.
    pub fn on_nego_response(&mut self, input: impl AsRef<Path>) -> Result<(), PodError> {
        self.core.on_nego_response(input.as_ref())
    }
}
