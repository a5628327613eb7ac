//! Error types for the PoD session layer.
//!
//! Every session operation that can fail returns a [`PodError`]. The five
//! variants map one-to-one onto the failure classes a caller has to tell
//! apart: bad paths, failed construction, rejected calls, failed
//! verification, and dead resources.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Coarse classification of a [`PodError`], for callers that only need to
/// branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Construction,
    Protocol,
    Verification,
    Resource,
}

/// Errors returned by data handles and sessions.
#[derive(Debug, Error)]
pub enum PodError {
    /// An artifact path failed a local precondition. Raised before the
    /// engine is called; nothing happened.
    #[error("{operation}: artifact {path:?} is not usable: {source}")]
    Io {
        /// The session operation that checked the path.
        operation: &'static str,
        /// The offending path.
        path: PathBuf,
        /// What went wrong with it.
        #[source]
        source: io::Error,
    },

    /// A data handle or session could not be built. No resource is left
    /// alive behind this error.
    #[error("failed to construct {what}: {reason}")]
    Construction {
        /// The thing being built (`"seller data"`, `"buyer session"`, ...).
        what: &'static str,
        /// Why it failed.
        reason: String,
    },

    /// The call was out of order, or the engine rejected it.
    #[error("{operation} rejected: {reason}")]
    Protocol {
        /// The session operation that was rejected.
        operation: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A cryptographic check on a peer artifact failed. The session does
    /// not advance but stays usable.
    #[error("{operation} verification failed: {reason}")]
    Verification {
        /// The verifying step.
        operation: &'static str,
        /// What did not verify.
        reason: String,
    },

    /// The underlying engine resource is gone or was already released.
    #[error("{operation} on invalid resource: {reason}")]
    Resource {
        /// The operation attempted on the resource.
        operation: &'static str,
        /// Which resource, and what state it was in.
        reason: String,
    },
}

impl PodError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PodError::Io { .. } => ErrorKind::Io,
            PodError::Construction { .. } => ErrorKind::Construction,
            PodError::Protocol { .. } => ErrorKind::Protocol,
            PodError::Verification { .. } => ErrorKind::Verification,
            PodError::Resource { .. } => ErrorKind::Resource,
        }
    }

    /// The operation (or construction target) the error was raised in.
    pub fn operation(&self) -> &'static str {
        match self {
            PodError::Io { operation, .. }
            | PodError::Protocol { operation, .. }
            | PodError::Verification { operation, .. }
            | PodError::Resource { operation, .. } => operation,
            PodError::Construction { what, .. } => what,
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PodError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn construction(what: &'static str, reason: impl Into<String>) -> Self {
        PodError::Construction {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(operation: &'static str, reason: impl Into<String>) -> Self {
        PodError::Protocol {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn resource(operation: &'static str, reason: impl Into<String>) -> Self {
        PodError::Resource {
            operation,
            reason: reason.into(),
        }
    }

    /// Classify an engine failure raised by `operation`.
    ///
    /// An unknown resource is always a [`PodError::Resource`]. Everything
    /// else depends on the kind of step that failed.
    pub(crate) fn from_engine(operation: &'static str, step: StepClass, err: EngineError) -> Self {
        let reason = err.to_string();
        match (step, err) {
            (_, EngineError::UnknownResource(_)) => PodError::Resource { operation, reason },
            (StepClass::Construct(what), _) => PodError::Construction { what, reason },
            (_, EngineError::VerificationFailed(_))
            | (StepClass::Verify, EngineError::Malformed(_)) => {
                PodError::Verification { operation, reason }
            }
            _ => PodError::Protocol { operation, reason },
        }
    }
}

/// What kind of step an engine call belongs to. Drives how engine errors
/// are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepClass {
    /// Building a data handle or session; carries the target's name.
    Construct(&'static str),
    /// Producing or consuming an artifact without verifying the peer.
    Exchange,
    /// Checking a peer artifact (`on_response`, `on_receipt`, `on_secret`).
    Verify,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResourceId;

    #[test]
    fn kind_matches_variant() {
        let err = PodError::protocol("get_request", "out of order");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.operation(), "get_request");

        let err = PodError::io(
            "on_request",
            "/nope",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/nope"));
    }

    #[test]
    fn unknown_resource_is_always_a_resource_error() {
        let steps = [
            StepClass::Construct("seller session"),
            StepClass::Exchange,
            StepClass::Verify,
        ];
        for step in steps {
            let err = PodError::from_engine(
                "free",
                step,
                EngineError::UnknownResource(ResourceId::new(7)),
            );
            assert_eq!(err.kind(), ErrorKind::Resource);
        }
    }

    #[test]
    fn construction_failures_keep_the_target_name() {
        let err = PodError::from_engine(
            "new_seller_data",
            StepClass::Construct("seller data"),
            EngineError::InvalidData("digest mismatch".into()),
        );
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert_eq!(err.operation(), "seller data");
    }

    #[test]
    fn malformed_input_at_a_verifying_step_is_a_verification_failure() {
        let verify = PodError::from_engine(
            "on_secret",
            StepClass::Verify,
            EngineError::Malformed("truncated".into()),
        );
        assert_eq!(verify.kind(), ErrorKind::Verification);

        let exchange = PodError::from_engine(
            "on_request",
            StepClass::Exchange,
            EngineError::Malformed("truncated".into()),
        );
        assert_eq!(exchange.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn rejection_is_a_protocol_error() {
        let err = PodError::from_engine(
            "get_request",
            StepClass::Exchange,
            EngineError::Rejected("range past end of data".into()),
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("range past end of data"));
    }
}
