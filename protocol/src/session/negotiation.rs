//! Negotiation bookkeeping.
//!
//! The OT handshake is mutual: each side initiates once (`get_nego_request`
//! then `on_nego_response`) and responds once (`on_nego_request`). The two
//! halves complete independently and in either order. The request phase
//! opens only when both are done; the engine is never trusted to enforce it.

use crate::error::PodError;

/// Progress of one side's negotiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Negotiation {
    request_sent: bool,
    self_negotiated: bool,
    peer_negotiated: bool,
}

impl Negotiation {
    /// Whether this side has sent its negotiation request.
    pub fn request_sent(&self) -> bool {
        self.request_sent
    }

    /// Whether this side's own initiated exchange has completed.
    pub fn self_negotiated(&self) -> bool {
        self.self_negotiated
    }

    /// Whether this side has answered the peer's request.
    pub fn peer_negotiated(&self) -> bool {
        self.peer_negotiated
    }

    pub fn is_complete(&self) -> bool {
        self.self_negotiated && self.peer_negotiated
    }

    pub(crate) fn check_can_initiate(&self, operation: &'static str) -> Result<(), PodError> {
        if self.request_sent {
            return Err(PodError::protocol(
                operation,
                "negotiation request already sent",
            ));
        }
        Ok(())
    }

    pub(crate) fn check_can_respond(&self, operation: &'static str) -> Result<(), PodError> {
        if self.peer_negotiated {
            return Err(PodError::protocol(
                operation,
                "peer negotiation request already answered",
            ));
        }
        Ok(())
    }

    pub(crate) fn check_can_finish(&self, operation: &'static str) -> Result<(), PodError> {
        if !self.request_sent {
            return Err(PodError::protocol(
                operation,
                "no negotiation request was sent",
            ));
        }
        if self.self_negotiated {
            return Err(PodError::protocol(
                operation,
                "negotiation response already consumed",
            ));
        }
        Ok(())
    }

    pub(crate) fn check_complete(&self, operation: &'static str) -> Result<(), PodError> {
        if !self.is_complete() {
            return Err(PodError::protocol(
                operation,
                format!(
                    "negotiation incomplete (self_negotiated={}, peer_negotiated={})",
                    self.self_negotiated, self.peer_negotiated
                ),
            ));
        }
        Ok(())
    }

    pub(crate) fn mark_request_sent(&mut self) {
        self.request_sent = true;
    }

    pub(crate) fn mark_self_negotiated(&mut self) {
        self.self_negotiated = true;
    }

    pub(crate) fn mark_peer_negotiated(&mut self) {
        self.peer_negotiated = true;
    }
}
