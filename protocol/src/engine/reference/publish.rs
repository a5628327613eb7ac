//! Dataset publishing.
//!
//! Publishing cuts a source into records, salts and commits to each one,
//! and writes three things under the output directory:
//!
//! ```text
//! <out>/bulletin.json          public summary, posted for buyers
//! <out>/public/public.bin      record commitments and the keyword index
//! <out>/private/private.bin    records, salts and the seller's keys
//! ```
//!
//! Plain sources are cut into fixed-size records. Table sources are
//! comma-separated with a header row; every following non-empty line is one
//! record, and the chosen key columns are indexed under VRF outputs so a
//! buyer learns nothing about values it did not ask for.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{
    BULLETIN_FILE, CONTEXT_RECORD_COMMITMENT, DEFAULT_RECORD_SIZE, PRIVATE_DATA_FILE,
    PRIVATE_DIR, PROTOCOL_VERSION, PUBLIC_DATA_FILE, PUBLIC_DIR, SALT_LENGTH, TABLE_SEPARATOR,
};
use crate::crypto::signing::{generate_signing_key, verifying_key_bytes, vrf_output, vrf_prove};
use crate::crypto::{blake3_hash, domain_separated_hash_multi, merkle_root};
use crate::engine::reference::bulletin::Bulletin;
use crate::engine::reference::messages::{decode, encode};
use crate::engine::EngineError;
use crate::types::DataMode;

/// How to cut and index a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    pub mode: DataMode,
    /// Plain mode only.
    pub record_size: u64,
    /// Table mode only: header names of the columns to index.
    pub key_columns: Vec<String>,
}

impl PublishOptions {
    pub fn plain(record_size: u64) -> Self {
        Self {
            mode: DataMode::Plain,
            record_size,
            key_columns: Vec::new(),
        }
    }

    pub fn table<I, S>(key_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: DataMode::Table,
            record_size: DEFAULT_RECORD_SIZE,
            key_columns: key_columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::plain(DEFAULT_RECORD_SIZE)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source contains no records")]
    EmptySource,

    #[error("record size must be positive")]
    InvalidRecordSize,

    #[error("table source has no header row")]
    MissingHeader,

    #[error("key column {0:?} is not in the header")]
    UnknownKeyColumn(String),

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("encoding failed: {0}")]
    Encode(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PublishError + '_ {
    move |source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Commitments and the keyword index; everything a buyer downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PublicData {
    pub commitments: Vec<[u8; 32]>,
    /// Key column, then VRF output of a value, then the rows holding it.
    pub keyword_index: BTreeMap<String, BTreeMap<[u8; 32], Vec<u64>>>,
}

/// What only the seller keeps.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct PrivateData {
    pub records: Vec<Vec<u8>>,
    pub salts: Vec<[u8; SALT_LENGTH]>,
    pub signing_key: [u8; 32],
    pub vrf_key: [u8; 32],
}

impl PrivateData {
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.signing_key)
    }

    pub fn vrf_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.vrf_key)
    }
}

/// Commitment to record `index`.
pub(crate) fn record_commitment(
    index: u64,
    salt: &[u8; SALT_LENGTH],
    record: &[u8],
) -> [u8; 32] {
    domain_separated_hash_multi(
        CONTEXT_RECORD_COMMITMENT,
        &[&index.to_le_bytes(), salt, record],
    )
}

struct Source {
    records: Vec<Vec<u8>>,
    columns: Vec<String>,
    /// Per key column: the value in each record.
    keys: Vec<(String, Vec<String>)>,
}

fn cut_plain(bytes: &[u8], record_size: u64) -> Result<Source, PublishError> {
    let size = usize::try_from(record_size)
        .ok()
        .filter(|s| *s > 0)
        .ok_or(PublishError::InvalidRecordSize)?;
    Ok(Source {
        records: bytes.chunks(size).map(<[u8]>::to_vec).collect(),
        columns: Vec::new(),
        keys: Vec::new(),
    })
}

fn cut_table(bytes: &[u8], key_columns: &[String]) -> Result<Source, PublishError> {
    let text = std::str::from_utf8(bytes).map_err(|e| PublishError::MalformedRow {
        line: 1,
        reason: format!("not UTF-8: {e}"),
    })?;
    let mut lines = text.lines().enumerate().map(|(n, l)| (n + 1, l.trim_end_matches('\r')));

    let header = match lines.next() {
        Some((_, h)) if !h.trim().is_empty() => h,
        _ => return Err(PublishError::MissingHeader),
    };
    let columns: Vec<String> = header.split(TABLE_SEPARATOR).map(str::to_owned).collect();

    let mut key_positions = Vec::with_capacity(key_columns.len());
    for key in key_columns {
        let position = columns
            .iter()
            .position(|c| c == key)
            .ok_or_else(|| PublishError::UnknownKeyColumn(key.clone()))?;
        key_positions.push(position);
    }

    let mut records = Vec::new();
    let mut keys: Vec<(String, Vec<String>)> =
        key_columns.iter().map(|k| (k.clone(), Vec::new())).collect();
    for (line, row) in lines.filter(|(_, l)| !l.is_empty()) {
        let fields: Vec<&str> = row.split(TABLE_SEPARATOR).collect();
        if fields.len() != columns.len() {
            return Err(PublishError::MalformedRow {
                line,
                reason: format!("{} fields, header has {}", fields.len(), columns.len()),
            });
        }
        for ((_, values), &position) in keys.iter_mut().zip(&key_positions) {
            values.push(fields[position].to_owned());
        }
        records.push(row.as_bytes().to_vec());
    }

    Ok(Source {
        records,
        columns,
        keys,
    })
}

/// Publish `source` under `output_dir` with fresh keys from the OS.
pub fn publish(
    source: &Path,
    output_dir: &Path,
    options: &PublishOptions,
) -> Result<Bulletin, PublishError> {
    publish_with_rng(source, output_dir, options, &mut OsRng)
}

/// [`publish`] with a caller-supplied randomness source.
pub fn publish_with_rng<R: RngCore + CryptoRng>(
    source: &Path,
    output_dir: &Path,
    options: &PublishOptions,
    rng: &mut R,
) -> Result<Bulletin, PublishError> {
    let bytes = fs::read(source).map_err(io_err(source))?;
    let cut = match options.mode {
        DataMode::Plain => cut_plain(&bytes, options.record_size)?,
        DataMode::Table => cut_table(&bytes, &options.key_columns)?,
    };
    if cut.records.is_empty() {
        return Err(PublishError::EmptySource);
    }

    let signing_key = generate_signing_key(rng);
    let vrf_key = generate_signing_key(rng);

    let salts: Vec<[u8; SALT_LENGTH]> = cut
        .records
        .iter()
        .map(|_| {
            let mut salt = [0u8; SALT_LENGTH];
            rng.fill_bytes(&mut salt);
            salt
        })
        .collect();
    let commitments: Vec<[u8; 32]> = cut
        .records
        .iter()
        .zip(&salts)
        .zip(0u64..)
        .map(|((record, salt), i)| record_commitment(i, salt, record))
        .collect();

    let mut keyword_index = BTreeMap::new();
    for (key_name, values) in &cut.keys {
        let mut column: BTreeMap<[u8; 32], Vec<u64>> = BTreeMap::new();
        for (value, row) in values.iter().zip(0u64..) {
            let output = vrf_output(&vrf_prove(&vrf_key, key_name, value));
            column.entry(output).or_default().push(row);
        }
        keyword_index.insert(key_name.clone(), column);
    }

    let public = PublicData {
        commitments,
        keyword_index,
    };
    let private = PrivateData {
        records: cut.records,
        salts,
        signing_key: signing_key.to_bytes(),
        vrf_key: vrf_key.to_bytes(),
    };
    let public_bytes = encode(&public).map_err(|e| PublishError::Encode(e.to_string()))?;
    let private_bytes = encode(&private).map_err(|e| PublishError::Encode(e.to_string()))?;

    let bulletin = Bulletin {
        version: PROTOCOL_VERSION.to_owned(),
        mode: options.mode,
        record_count: public.commitments.len() as u64,
        total_size: bytes.len() as u64,
        record_size: (options.mode == DataMode::Plain).then_some(options.record_size),
        columns: cut.columns,
        key_names: options.key_columns.clone(),
        merkle_root: merkle_root(&public.commitments),
        public_digest: blake3_hash(&public_bytes),
        seller_key: verifying_key_bytes(&signing_key),
        vrf_key: verifying_key_bytes(&vrf_key),
    };

    let public_dir = output_dir.join(PUBLIC_DIR);
    let private_dir = output_dir.join(PRIVATE_DIR);
    for dir in [&public_dir, &private_dir] {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let public_path = public_dir.join(PUBLIC_DATA_FILE);
    fs::write(&public_path, &public_bytes).map_err(io_err(&public_path))?;
    let private_path = private_dir.join(PRIVATE_DATA_FILE);
    fs::write(&private_path, &private_bytes).map_err(io_err(&private_path))?;

    let bulletin_path = output_dir.join(BULLETIN_FILE);
    let json = serde_json::to_string_pretty(&bulletin)
        .map_err(|e| PublishError::Encode(e.to_string()))?;
    fs::write(&bulletin_path, json).map_err(io_err(&bulletin_path))?;

    info!(
        mode = %options.mode,
        records = bulletin.record_count,
        bytes = bulletin.total_size,
        dir = %output_dir.display(),
        "dataset published"
    );
    Ok(bulletin)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A published dataset as held by the engine.
pub(crate) struct PublishedData {
    pub mode: DataMode,
    pub bulletin: Bulletin,
    pub public: PublicData,
    /// Seller side only.
    pub private: Option<PrivateData>,
}

fn invalid(reason: impl Into<String>) -> EngineError {
    EngineError::InvalidData(reason.into())
}

fn load_public(
    mode: DataMode,
    bulletin: &Bulletin,
    public_dir: &Path,
) -> Result<PublicData, EngineError> {
    if bulletin.mode != mode {
        return Err(invalid(format!(
            "dataset was published as {}, opened as {mode}",
            bulletin.mode
        )));
    }
    let bytes = fs::read(public_dir.join(PUBLIC_DATA_FILE))?;
    if blake3_hash(&bytes) != bulletin.public_digest {
        return Err(invalid("public data does not match the bulletin digest"));
    }
    let public: PublicData = decode(&bytes).map_err(|e| invalid(e.to_string()))?;
    if public.commitments.len() as u64 != bulletin.record_count {
        return Err(invalid(format!(
            "{} commitments, bulletin announces {} records",
            public.commitments.len(),
            bulletin.record_count
        )));
    }
    if merkle_root(&public.commitments) != bulletin.merkle_root {
        return Err(invalid("commitments do not match the bulletin root"));
    }
    if bulletin.key_names.iter().any(|k| !public.keyword_index.contains_key(k)) {
        return Err(invalid("keyword index is missing an announced key column"));
    }
    Ok(public)
}

impl PublishedData {
    /// The seller's view: everything under `publish_dir`.
    pub fn load_seller(mode: DataMode, publish_dir: &Path) -> Result<Self, EngineError> {
        let bulletin = Bulletin::load(&publish_dir.join(BULLETIN_FILE))?;
        let public = load_public(mode, &bulletin, &publish_dir.join(PUBLIC_DIR))?;

        let bytes = fs::read(publish_dir.join(PRIVATE_DIR).join(PRIVATE_DATA_FILE))?;
        let private: PrivateData = decode(&bytes).map_err(|e| invalid(e.to_string()))?;
        if private.records.len() != public.commitments.len()
            || private.salts.len() != public.commitments.len()
        {
            return Err(invalid("private data does not match the record count"));
        }
        let consistent = private
            .records
            .iter()
            .zip(&private.salts)
            .zip(&public.commitments)
            .zip(0u64..)
            .all(|(((record, salt), commitment), i)| {
                record_commitment(i, salt, record) == *commitment
            });
        if !consistent {
            return Err(invalid("private records do not match their commitments"));
        }
        if verifying_key_bytes(&private.signing_key()) != bulletin.seller_key
            || verifying_key_bytes(&private.vrf_key()) != bulletin.vrf_key
        {
            return Err(invalid("private keys do not match the bulletin"));
        }

        debug!(records = bulletin.record_count, %mode, "seller data loaded");
        Ok(Self {
            mode,
            bulletin,
            public,
            private: Some(private),
        })
    }

    /// The buyer's view: the bulletin plus the public directory.
    pub fn load_buyer(
        mode: DataMode,
        bulletin_path: &Path,
        public_dir: &Path,
    ) -> Result<Self, EngineError> {
        let bulletin = Bulletin::load(bulletin_path)?;
        let public = load_public(mode, &bulletin, public_dir)?;
        debug!(records = bulletin.record_count, %mode, "buyer data loaded");
        Ok(Self {
            mode,
            bulletin,
            public,
            private: None,
        })
    }

    pub fn private(&self) -> Result<&PrivateData, EngineError> {
        self.private
            .as_ref()
            .ok_or_else(|| EngineError::Rejected("seller operation on buyer data".into()))
    }
}
