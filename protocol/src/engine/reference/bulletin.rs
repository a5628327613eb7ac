//! The public bulletin of a published dataset.
//!
//! A bulletin is everything a prospective buyer learns before buying: the
//! shape of the data, the Merkle root of the record commitments, a digest
//! of the public file, and the seller's two public keys. It is plain JSON
//! so it can be posted anywhere.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::types::DataMode;

/// Public summary of a published dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bulletin {
    pub version: String,
    pub mode: DataMode,
    pub record_count: u64,
    pub total_size: u64,
    /// Plain mode: the record size the source was cut at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_size: Option<u64>,
    /// Table mode: the header row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Table mode: the columns indexed for keyword queries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_names: Vec<String>,
    #[serde(with = "hex32")]
    pub merkle_root: [u8; 32],
    #[serde(with = "hex32")]
    pub public_digest: [u8; 32],
    #[serde(with = "hex32")]
    pub seller_key: [u8; 32],
    #[serde(with = "hex32")]
    pub vrf_key: [u8; 32],
}

impl Bulletin {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::InvalidData(format!("bulletin {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidData(format!("bulletin: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn has_key(&self, key_name: &str) -> bool {
        self.key_names.iter().any(|k| k == key_name)
    }
}

pub(crate) mod hex32 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected 32 hex-encoded bytes"))
    }
}
