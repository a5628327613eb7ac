// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Proof-of-Delivery Arbiter
//!
//! Tracks disputes raised by buyers after a session went wrong. A dispute
//! is anchored on the buyer's claim artifact and ends in a ruling produced
//! by the notary in `pod-protocol`:
//!
//! - **Open**: the buyer files a claim; its BLAKE3 hash is the evidence.
//! - **Responded**: the seller attached counter-evidence.
//! - **ResolvedForBuyer** / **ResolvedForSeller**: the notary ruled.
//! - **Withdrawn**: the buyer dropped the dispute before a ruling.
//!
//! Resolved and withdrawn disputes never change again.

pub mod dispute;

pub use dispute::{Dispute, DisputeError, DisputeStatus, Evidence};
