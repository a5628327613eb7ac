//! # Protocol Configuration & Constants
//!
//! Every magic number in the PoD stack lives here: identifier widths, the
//! on-disk layout of a published dataset, cryptographic sizes, and the
//! BLAKE3 domain-separation contexts used by the reference engine.
//!
//! Runtime configuration is *not* global. Engine setup
//! parameters travel as an explicit [`EngineParams`] value and publishing
//! options as [`PublishOptions`]; nothing in this module is mutable.
//!
//! [`EngineParams`]: crate::engine::reference::EngineParams
//! [`PublishOptions`]: crate::engine::reference::PublishOptions

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Major version. Bump when artifacts stop being readable across versions.
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version. Bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

/// The full version string, embedded in every bulletin.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Width of the narrow (32-byte) party identifier.
pub const NARROW_ID_LENGTH: usize = 32;

/// Width of the wide (40-byte) party identifier.
pub const WIDE_ID_LENGTH: usize = 40;

// ---------------------------------------------------------------------------
// Published Dataset Layout
// ---------------------------------------------------------------------------

/// Public summary of a published dataset, handed to every prospective buyer.
pub const BULLETIN_FILE: &str = "bulletin.json";

/// Directory holding the public per-record material.
pub const PUBLIC_DIR: &str = "public";

/// Directory holding the seller-only material. Never leaves the seller.
pub const PRIVATE_DIR: &str = "private";

/// File inside [`PUBLIC_DIR`] with record commitments and the keyword index.
pub const PUBLIC_DATA_FILE: &str = "public.bin";

/// File inside [`PRIVATE_DIR`] with records, salts and seller keys.
pub const PRIVATE_DATA_FILE: &str = "private.bin";

/// File holding the serialized engine setup parameters.
pub const ENGINE_PARAMS_FILE: &str = "engine_params.bin";

/// Default record size for plain-mode publishing, in bytes.
pub const DEFAULT_RECORD_SIZE: u64 = 1024;

/// Column separator for table-mode sources.
pub const TABLE_SEPARATOR: char = ',';

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of items (expanded record indices or keyword values) a
/// single request may address. Keeps response artifacts bounded.
pub const MAX_QUERY_ITEMS: usize = 1 << 20;

/// Maximum length of a single keyword value, in bytes.
pub const MAX_KEYWORD_LENGTH: usize = 4096;

/// Upper bound on any decoded artifact or published data file, in bytes.
pub const MAX_ARTIFACT_SIZE: u64 = 1 << 30;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Per-record salt length. Salts blind record commitments so the public
/// commitment list leaks nothing about low-entropy records.
pub const SALT_LENGTH: usize = 32;

/// Symmetric session key length (AES-256).
pub const SESSION_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Digest length of every hash used in the protocol (BLAKE3 / SHA-256).
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Domain Separation
// ---------------------------------------------------------------------------

/// Session tag binding both identities, the variant and the bulletin.
pub const CONTEXT_SESSION_TAG: &str = "pod 2026 session tag";

/// Record commitment `H(index, salt, record)`.
pub const CONTEXT_RECORD_COMMITMENT: &str = "pod 2026 record commitment";

/// Per-record sealing key derived from the session key.
pub const CONTEXT_RECORD_KEY: &str = "pod 2026 record key";

/// Hash commitment to the session key.
pub const CONTEXT_KEY_COMMITMENT: &str = "pod 2026 key commitment";

/// Session key derived from a Pedersen-committed field element.
pub const CONTEXT_FIELD_KEY: &str = "pod 2026 field key";

/// Digest of a response artifact (what the receipt acknowledges).
pub const CONTEXT_RESPONSE_DIGEST: &str = "pod 2026 response digest";

/// Digest signed by the seller when releasing a secret.
pub const CONTEXT_SECRET_DIGEST: &str = "pod 2026 secret digest";

/// Buyer acknowledgement carried in a receipt.
pub const CONTEXT_RECEIPT_ACK: &str = "pod 2026 receipt ack";

/// Shared secret derived from one direction of the OT negotiation.
pub const CONTEXT_NEGOTIATION: &str = "pod 2026 negotiation";

/// Binding value derived from both negotiated secrets.
pub const CONTEXT_OT_BINDING: &str = "pod 2026 ot binding";

/// Commitment to the real demand hidden inside a phantom set.
pub const CONTEXT_DEMAND_COMMITMENT: &str = "pod 2026 demand commitment";

/// Message prefix signed by the keyword VRF.
pub const CONTEXT_VRF_INPUT: &str = "pod 2026 vrf input";
