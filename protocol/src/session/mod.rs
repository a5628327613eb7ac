//! # Protocol Sessions
//!
//! A session is one protocol run between one seller identity and one buyer
//! identity. It owns its published-data handle plus an engine session
//! resource and walks an explicit state machine:
//!
//! ```text
//! Created -> [Negotiating ->] Requested -> Responded -> Receipted
//!   Receipted -> Secreted -> Decrypted
//!   Receipted -> Claimed
//! ```
//!
//! Every operation checks the current state before the engine is called, so
//! an out-of-order call is a [`PodError::Protocol`] rather than an opaque
//! engine failure. Which operations exist at all is decided at compile time
//! by the variant marker (see [`variant`]).
//!
//! Every step takes `&mut self`, so one session is driven by one caller at
//! a time. `close` consumes the session, so use-after-free does not
//! compile.

pub mod buyer;
pub mod negotiation;
pub mod seller;
pub mod variant;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::artifact;
use crate::engine::{EngineError, ProofEngine, ResourceId};
use crate::error::{PodError, StepClass};
use crate::resource::EngineHandle;
use crate::types::{DataMode, Identity};

pub use buyer::BuyerSession;
pub use negotiation::Negotiation;
pub use seller::SellerSession;
pub use variant::{
    AtomicSwap, AtomicSwapVc, Batch, Capabilities, Complaint, Disputable, KeywordLookup,
    Negotiated, OtBatch, OtComplaint, OtVrfq, RangeDelivery, Variant, VariantKind, Vrfq,
};

/// Where a session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Built, nothing exchanged yet.
    Created,
    /// At least one negotiation step has run.
    Negotiating,
    /// Buyer: the request has been written.
    Requested,
    /// Seller: the response has been written.
    Responded,
    /// Seller: the secret has been released. Buyer: the receipt has been
    /// issued and a secret is awaited.
    Receipted,
    /// Buyer: the secret verified.
    Secreted,
    /// Buyer: a claim has been generated.
    Claimed,
    /// Buyer: plaintext has been written at least once.
    Decrypted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Negotiating => "negotiating",
            SessionState::Requested => "requested",
            SessionState::Responded => "responded",
            SessionState::Receipted => "receipted",
            SessionState::Secreted => "secreted",
            SessionState::Claimed => "claimed",
            SessionState::Decrypted => "decrypted",
        };
        f.write_str(name)
    }
}

/// Which side of the exchange a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Seller,
    Buyer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Seller => write!(f, "seller"),
            Role::Buyer => write!(f, "buyer"),
        }
    }
}

/// Reject identities whose width does not match what `variant` expects over
/// `mode`, and modes the variant cannot run over.
pub(crate) fn check_identities(
    what: &'static str,
    variant: VariantKind,
    mode: DataMode,
    seller: &Identity,
    buyer: &Identity,
) -> Result<(), PodError> {
    let expected = variant.id_width(mode).ok_or_else(|| {
        PodError::construction(what, format!("variant {variant} does not run over {mode} data"))
    })?;
    for (party, id) in [("seller", seller), ("buyer", buyer)] {
        if id.width() != expected {
            return Err(PodError::construction(
                what,
                format!(
                    "{party} identity is {}, {variant} over {mode} data requires {expected}",
                    id.width()
                ),
            ));
        }
    }
    Ok(())
}

/// State shared by both session roles: the engine session resource, the
/// state machine and negotiation progress.
#[derive(Debug)]
pub(crate) struct SessionCore {
    handle: EngineHandle,
    variant: VariantKind,
    role: Role,
    state: SessionState,
    negotiation: Negotiation,
}

impl SessionCore {
    pub(crate) fn new(handle: EngineHandle, variant: VariantKind, role: Role) -> Self {
        debug!(%variant, %role, resource = ?handle.id("new").ok(), "session created");
        Self {
            handle,
            variant,
            role,
            state: SessionState::Created,
            negotiation: Negotiation::default(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn negotiation(&self) -> Negotiation {
        self.negotiation
    }

    pub(crate) fn variant(&self) -> VariantKind {
        self.variant
    }

    pub(crate) fn ensure_state(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), PodError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(PodError::protocol(
            operation,
            format!(
                "{} {} session is {}, expected one of {:?}",
                self.variant, self.role, self.state, allowed
            ),
        ))
    }

    /// The request phase opens from `Created`, or, for negotiated variants,
    /// once both negotiation halves are done.
    pub(crate) fn ensure_request_phase(&self, operation: &'static str) -> Result<(), PodError> {
        if self.variant.capabilities().negotiation {
            self.ensure_state(operation, &[SessionState::Negotiating])
                .map_err(|_| {
                    PodError::protocol(
                        operation,
                        format!(
                            "{} requires negotiation before the request phase (session is {})",
                            self.variant, self.state
                        ),
                    )
                })?;
            self.negotiation.check_complete(operation)
        } else {
            self.ensure_state(operation, &[SessionState::Created])
        }
    }

    pub(crate) fn advance(&mut self, operation: &'static str, to: SessionState) {
        if self.state != to {
            debug!(
                variant = %self.variant,
                role = %self.role,
                operation,
                from = %self.state,
                to = %to,
                "session state transition"
            );
            self.state = to;
        }
    }

    /// Run one engine call against this session's resource.
    pub(crate) fn call<F>(
        &self,
        operation: &'static str,
        step: StepClass,
        f: F,
    ) -> Result<(), PodError>
    where
        F: FnOnce(&dyn ProofEngine, ResourceId) -> Result<(), EngineError>,
    {
        let id = self.handle.id(operation)?;
        f(self.handle.engine().as_ref(), id).map_err(|e| {
            let err = PodError::from_engine(operation, step, e);
            warn!(
                variant = %self.variant,
                role = %self.role,
                state = %self.state,
                operation,
                error = %err,
                "engine step failed"
            );
            err
        })
    }

    fn ensure_negotiation_phase(&self, operation: &'static str) -> Result<(), PodError> {
        if !self.variant.capabilities().negotiation {
            return Err(PodError::protocol(
                operation,
                format!("{} does not negotiate", self.variant),
            ));
        }
        self.ensure_state(
            operation,
            &[SessionState::Created, SessionState::Negotiating],
        )
    }

    pub(crate) fn get_nego_request(&mut self, output: &Path) -> Result<(), PodError> {
        const OP: &str = "get_nego_request";
        self.ensure_negotiation_phase(OP)?;
        self.negotiation.check_can_initiate(OP)?;
        artifact::check_output(OP, output)?;
        self.call(OP, StepClass::Exchange, |engine, id| {
            engine.get_nego_request(id, output)
        })?;
        self.negotiation.mark_request_sent();
        self.advance(OP, SessionState::Negotiating);
        Ok(())
    }

    pub(crate) fn on_nego_request(&mut self, input: &Path, output: &Path) -> Result<(), PodError> {
        const OP: &str = "on_nego_request";
        self.ensure_negotiation_phase(OP)?;
        self.negotiation.check_can_respond(OP)?;
        artifact::check_input(OP, input)?;
        artifact::check_output(OP, output)?;
        self.call(OP, StepClass::Exchange, |engine, id| {
            engine.on_nego_request(id, input, output)
        })?;
        self.negotiation.mark_peer_negotiated();
        self.advance(OP, SessionState::Negotiating);
        Ok(())
    }

    pub(crate) fn on_nego_response(&mut self, input: &Path) -> Result<(), PodError> {
        const OP: &str = "on_nego_response";
        self.ensure_negotiation_phase(OP)?;
        self.negotiation.check_can_finish(OP)?;
        artifact::check_input(OP, input)?;
        self.call(OP, StepClass::Exchange, |engine, id| {
            engine.on_nego_response(id, input)
        })?;
        self.negotiation.mark_self_negotiated();
        debug!(
            variant = %self.variant,
            role = %self.role,
            complete = self.negotiation.is_complete(),
            "own negotiation half finished"
        );
        Ok(())
    }

    pub(crate) fn release(&mut self) -> Result<(), PodError> {
        self.handle.release()
    }
}

/// Owned engine handle for a fresh session, or the construction error.
pub(crate) fn new_session_handle(
    engine: &Arc<dyn ProofEngine>,
    what: &'static str,
    create: impl FnOnce(&dyn ProofEngine) -> Result<ResourceId, EngineError>,
) -> Result<EngineHandle, PodError> {
    let id = create(engine.as_ref())
        .map_err(|e| PodError::from_engine("new_session", StepClass::Construct(what), e))?;
    Ok(EngineHandle::new(
        Arc::clone(engine),
        id,
        crate::resource::ResourceKind::Session,
    ))
}
