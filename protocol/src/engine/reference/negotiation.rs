//! X25519 negotiation for the OT variants.
//!
//! Each side runs one Diffie-Hellman exchange it initiated and answers one
//! the peer initiated. The two resulting secrets feed a binding value that
//! every later request must carry, tying the request phase to this
//! negotiation.

use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::config::{CONTEXT_NEGOTIATION, CONTEXT_OT_BINDING};
use crate::crypto::{domain_separated_hash, domain_separated_hash_multi};
use crate::engine::reference::messages::NegoMessage;
use crate::engine::EngineError;

/// Engine-side negotiation secrets of one session.
#[derive(Default)]
pub(crate) struct NegoState {
    pending: Option<EphemeralSecret>,
    initiated: Option<[u8; 32]>,
    responded: Option<[u8; 32]>,
}

fn shared(secret: EphemeralSecret, peer: [u8; 32]) -> Result<[u8; 32], EngineError> {
    let dh = secret.diffie_hellman(&PublicKey::from(peer));
    if !dh.was_contributory() {
        return Err(EngineError::VerificationFailed(
            "negotiation public key is degenerate".into(),
        ));
    }
    Ok(domain_separated_hash(CONTEXT_NEGOTIATION, dh.as_bytes()))
}

fn check_tag(message: &NegoMessage, tag: &[u8; 32]) -> Result<(), EngineError> {
    if message.tag != *tag {
        return Err(EngineError::Rejected(
            "negotiation message belongs to another session".into(),
        ));
    }
    Ok(())
}

/// This side's opening message, not yet recorded.
pub(crate) struct Initiation {
    pub message: NegoMessage,
    secret: EphemeralSecret,
}

/// An answer to the peer, not yet recorded.
pub(crate) struct Answer {
    pub message: NegoMessage,
    shared: [u8; 32],
}

impl NegoState {
    /// Start this side's exchange. Nothing is recorded until
    /// [`NegoState::record_initiation`], so a step whose artifact could not
    /// be written can be retried.
    pub fn initiate(&self, tag: [u8; 32]) -> Result<Initiation, EngineError> {
        if self.pending.is_some() || self.initiated.is_some() {
            return Err(EngineError::Rejected("negotiation already initiated".into()));
        }
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret).to_bytes();
        Ok(Initiation {
            message: NegoMessage { tag, public_key },
            secret,
        })
    }

    pub fn record_initiation(&mut self, initiation: Initiation) {
        self.pending = Some(initiation.secret);
    }

    /// Answer the peer's exchange. Recorded by [`NegoState::record_answer`].
    pub fn respond(&self, tag: [u8; 32], request: &NegoMessage) -> Result<Answer, EngineError> {
        check_tag(request, &tag)?;
        if self.responded.is_some() {
            return Err(EngineError::Rejected("peer negotiation already answered".into()));
        }
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret).to_bytes();
        Ok(Answer {
            shared: shared(secret, request.public_key)?,
            message: NegoMessage { tag, public_key },
        })
    }

    pub fn record_answer(&mut self, answer: Answer) {
        self.responded = Some(answer.shared);
    }

    /// Finish this side's exchange.
    pub fn finish(&mut self, tag: [u8; 32], response: &NegoMessage) -> Result<(), EngineError> {
        check_tag(response, &tag)?;
        let secret = self
            .pending
            .take()
            .ok_or_else(|| EngineError::Rejected("no negotiation pending".into()))?;
        self.initiated = Some(shared(secret, response.public_key)?);
        Ok(())
    }

    /// Binding for the request phase, once both exchanges are done.
    /// `is_seller` orders the two secrets the same way on both sides.
    pub fn binding(&self, tag: &[u8; 32], is_seller: bool) -> Result<[u8; 32], EngineError> {
        let (Some(initiated), Some(responded)) = (self.initiated, self.responded) else {
            return Err(EngineError::Rejected("negotiation is not complete".into()));
        };
        let (seller_half, buyer_half) = if is_seller {
            (initiated, responded)
        } else {
            (responded, initiated)
        };
        Ok(domain_separated_hash_multi(
            CONTEXT_OT_BINDING,
            &[tag, &seller_half, &buyer_half],
        ))
    }
}
