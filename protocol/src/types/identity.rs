//! Party identifiers.
//!
//! A session binds exactly one seller and one buyer, each named by an opaque
//! fixed-width byte string. Two widths exist and each variant expects one of
//! them per data mode; widths are never padded or truncated to fit.

use std::fmt;

use crate::config::{NARROW_ID_LENGTH, WIDE_ID_LENGTH};
use crate::error::PodError;

/// The two identifier widths in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdWidth {
    /// 32 bytes.
    Narrow,
    /// 40 bytes.
    Wide,
}

impl IdWidth {
    /// Width in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            IdWidth::Narrow => NARROW_ID_LENGTH,
            IdWidth::Wide => WIDE_ID_LENGTH,
        }
    }

    /// The width matching `len` bytes, if any.
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            NARROW_ID_LENGTH => Some(IdWidth::Narrow),
            WIDE_ID_LENGTH => Some(IdWidth::Wide),
            _ => None,
        }
    }
}

impl fmt::Display for IdWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-byte", self.byte_len())
    }
}

/// A seller or buyer identifier.
///
/// Not checked for uniqueness or format beyond its length.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    bytes: Vec<u8>,
}

impl Identity {
    /// Build an identity from raw bytes. Only 32- and 40-byte values are
    /// accepted.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PodError> {
        match IdWidth::from_len(bytes.len()) {
            Some(_) => Ok(Self {
                bytes: bytes.to_vec(),
            }),
            None => Err(PodError::construction(
                "identity",
                format!(
                    "identifier is {} bytes, expected {} or {}",
                    bytes.len(),
                    NARROW_ID_LENGTH,
                    WIDE_ID_LENGTH
                ),
            )),
        }
    }

    /// Parse a hex-encoded identity.
    pub fn from_hex(s: &str) -> Result<Self, PodError> {
        let bytes = hex::decode(s)
            .map_err(|e| PodError::construction("identity", format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn width(&self) -> IdWidth {
        // Construction guarantees one of the two lengths.
        if self.bytes.len() == WIDE_ID_LENGTH {
            IdWidth::Wide
        } else {
            IdWidth::Narrow
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl From<[u8; NARROW_ID_LENGTH]> for Identity {
    fn from(bytes: [u8; NARROW_ID_LENGTH]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }
}

impl From<[u8; WIDE_ID_LENGTH]> for Identity {
    fn from(bytes: [u8; WIDE_ID_LENGTH]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Identity({}..)", &hex[..8])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
