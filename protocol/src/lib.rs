// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Proof-of-Delivery Protocol
//!
//! A seller publishes a dataset; a buyer demands part of it; the two run a
//! session that ends with the buyer holding exactly the demanded records,
//! or holding a claim a third party can adjudicate.
//!
//! ## Architecture
//!
//! - **types**: Identities, data modes and demands, validated on
//!   construction.
//! - **engine**: The [`ProofEngine`](engine::ProofEngine) contract every
//!   cryptographic step funnels through, plus a complete reference engine.
//! - **resource** / **data**: Owned engine resources. Released exactly
//!   once, on `close()` or on drop.
//! - **session**: The state machine. `SellerSession<V>` and
//!   `BuyerSession<V>` are generic over a variant marker; capability traits
//!   decide which steps exist for which variant.
//! - **crypto**: Hashing, record sealing, commitments and signatures used
//!   by the reference engine.
//! - **artifact**: Path checks run before any engine call.
//! - **config** / **error** / **logging**: Constants, the error taxonomy
//!   and `tracing` setup.
//!
//! ## A session, end to end
//!
//! ```text
//!  Buyer                                  Seller
//!  get_request ─────── request ─────────▶ on_request
//!  on_response ◀────── response ───────── (Responded)
//!  (Receipted) ─────── receipt ─────────▶ on_receipt
//!  on_secret   ◀────── secret ─────────── (Receipted)
//!  decrypt  /  generate_claim
//! ```
//!
//! OT variants run a two-way negotiation before `get_request`.

pub mod artifact;
pub mod config;
pub mod crypto;
pub mod data;
pub mod engine;
pub mod error;
pub mod logging;
pub mod resource;
pub mod session;
pub mod types;

pub use data::{BuyerData, SellerData};
pub use engine::reference::{EngineParams, ReferenceEngine};
pub use engine::{EngineError, ProofEngine, ResourceId};
pub use error::{ErrorKind, PodError};
pub use session::{
    AtomicSwap, AtomicSwapVc, Batch, BuyerSession, Complaint, OtBatch, OtComplaint, OtVrfq,
    Role, SellerSession, SessionState, VariantKind, Vrfq,
};
pub use types::{
    DataMode, IdWidth, Identity, KeywordSet, PhantomKeywords, PhantomRanges, Query, Range,
    RangeSet,
};
