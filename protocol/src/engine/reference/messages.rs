//! Reference engine wire formats.
//!
//! Every artifact is a bincode-encoded [`Envelope`] naming its kind, so an
//! artifact handed to the wrong step fails to decode instead of being
//! misread. Claims and positions are JSON because third parties read them.
//!
//! Signed messages split into a body and a signature over a
//! domain-separated digest of the encoded body.

use std::fs;
use std::path::Path;

use ark_bn254::Fr;
use ark_serialize::SerializationError;
use bincode::Options;
use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{
    CONTEXT_FIELD_KEY, CONTEXT_KEY_COMMITMENT, CONTEXT_RECEIPT_ACK, CONTEXT_RESPONSE_DIGEST,
    CONTEXT_SECRET_DIGEST, MAX_ARTIFACT_SIZE, SALT_LENGTH,
};
use crate::crypto::commitment::{scalar_from_bytes, scalar_to_bytes};
use crate::crypto::{
    derive_record_key, domain_separated_hash, domain_separated_hash_multi, open, seal,
    signing, verify_commitment, Commitment, PedersenParams,
};
use crate::engine::EngineError;
use crate::types::Range;

fn codec() -> impl Options {
    bincode::options().with_limit(MAX_ARTIFACT_SIZE)
}

/// Canonical binary encoding used for artifacts and digests.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
    codec()
        .serialize(value)
        .map_err(|e| EngineError::Malformed(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EngineError> {
    codec()
        .deserialize(bytes)
        .map_err(|e| EngineError::Malformed(e.to_string()))
}

/// Which step an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    NegoRequest,
    NegoResponse,
    Request,
    Response,
    Receipt,
    Secret,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: MessageKind,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    kind: MessageKind,
    body: T,
}

pub(crate) fn write_artifact<T: Serialize>(
    path: &Path,
    kind: MessageKind,
    body: &T,
) -> Result<(), EngineError> {
    fs::write(path, encode(&EnvelopeRef { kind, body })?)?;
    Ok(())
}

pub(crate) fn read_artifact<T: DeserializeOwned>(
    path: &Path,
    expected: MessageKind,
) -> Result<T, EngineError> {
    let bytes = fs::read(path)?;
    let envelope: Envelope<T> = decode(&bytes)?;
    if envelope.kind != expected {
        return Err(EngineError::Malformed(format!(
            "expected a {expected:?} artifact, found {:?}",
            envelope.kind
        )));
    }
    Ok(envelope.body)
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

/// One direction of the X25519 exchange. Used for both request and answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegoMessage {
    pub tag: [u8; 32],
    pub public_key: [u8; 32],
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestQuery {
    Ranges(Vec<Range>),
    Keywords { key_name: String, values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub tag: [u8; 32],
    /// Present after negotiation; proves the request belongs to it.
    pub ot_binding: Option<[u8; 32]>,
    /// Present when the query is a phantom superset; commits to the demand.
    pub demand_commitment: Option<[u8; 32]>,
    pub query: RequestQuery,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The seller's commitment to this session's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCommitment {
    /// `H(tag, key)`.
    Hash([u8; 32]),
    /// Compressed Pedersen commitment to a field element.
    Pedersen(Vec<u8>),
}

/// The opening of a [`KeyCommitment`], released as the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOpening {
    Hash([u8; 32]),
    Pedersen { value: Vec<u8>, blinding: Vec<u8> },
}

/// One sealed item: a record (range queries) or a VRF proof (keyword
/// queries, indexed by position in the requested value list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEntry {
    pub index: u64,
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub tag: [u8; 32],
    pub key_commitment: KeyCommitment,
    pub demand_commitment: Option<[u8; 32]>,
    pub entries: Vec<SealedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedResponse {
    pub body: ResponseBody,
    pub signature: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Receipt & Secret
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tag: [u8; 32],
    pub response_digest: [u8; 32],
    pub acknowledgement: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBody {
    pub tag: [u8; 32],
    pub response_digest: [u8; 32],
    pub opening: KeyOpening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSecret {
    pub body: SecretBody,
    pub signature: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Resolved record positions for one demanded keyword value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Positions {
    pub key_name: String,
    pub value: String,
    pub positions: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Digests, signatures and openings
// ---------------------------------------------------------------------------

impl ResponseBody {
    pub fn digest(&self) -> Result<[u8; 32], EngineError> {
        Ok(domain_separated_hash(CONTEXT_RESPONSE_DIGEST, &encode(self)?))
    }

    pub fn entry(&self, index: u64) -> Option<&SealedEntry> {
        self.entries.iter().find(|e| e.index == index)
    }
}

impl SignedResponse {
    pub(crate) fn sign(body: ResponseBody, key: &SigningKey) -> Result<Self, EngineError> {
        let signature = signing::sign(key, &body.digest()?);
        Ok(Self { body, signature })
    }

    /// Check the seller's signature. Returns the response digest.
    pub fn verify(&self, seller_key: &[u8; 32]) -> Result<[u8; 32], EngineError> {
        let digest = self.body.digest()?;
        if !signing::verify(seller_key, &digest, &self.signature) {
            return Err(EngineError::VerificationFailed(
                "response is not signed by the seller".into(),
            ));
        }
        Ok(digest)
    }
}

impl SecretBody {
    pub fn digest(&self) -> Result<[u8; 32], EngineError> {
        Ok(domain_separated_hash(CONTEXT_SECRET_DIGEST, &encode(self)?))
    }
}

impl SignedSecret {
    pub(crate) fn sign(body: SecretBody, key: &SigningKey) -> Result<Self, EngineError> {
        let signature = signing::sign(key, &body.digest()?);
        Ok(Self { body, signature })
    }

    pub fn verify(&self, seller_key: &[u8; 32]) -> Result<(), EngineError> {
        let digest = self.body.digest()?;
        if !signing::verify(seller_key, &digest, &self.signature) {
            return Err(EngineError::VerificationFailed(
                "secret is not signed by the seller".into(),
            ));
        }
        Ok(())
    }
}

impl Receipt {
    pub(crate) fn acknowledge(tag: [u8; 32], response_digest: [u8; 32]) -> Self {
        Self {
            tag,
            response_digest,
            acknowledgement: domain_separated_hash_multi(
                CONTEXT_RECEIPT_ACK,
                &[&tag, &response_digest],
            ),
        }
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        *self == Self::acknowledge(self.tag, self.response_digest)
    }
}

/// Hash commitment to a session key.
pub(crate) fn hash_key_commitment(tag: &[u8; 32], key: &[u8; 32]) -> [u8; 32] {
    domain_separated_hash_multi(CONTEXT_KEY_COMMITMENT, &[tag, key])
}

/// Session key derived from a committed field element.
pub(crate) fn field_key(value: &Fr) -> Result<[u8; 32], EngineError> {
    let bytes = scalar_to_bytes(value).map_err(|e| EngineError::Malformed(e.to_string()))?;
    Ok(domain_separated_hash(CONTEXT_FIELD_KEY, &bytes))
}

impl KeyOpening {
    pub(crate) fn pedersen(value: &Fr, blinding: &Fr) -> Result<Self, EngineError> {
        let encode =
            |s: &Fr| scalar_to_bytes(s).map_err(|e| EngineError::Malformed(e.to_string()));
        Ok(KeyOpening::Pedersen {
            value: encode(value)?,
            blinding: encode(blinding)?,
        })
    }

    /// Check this opening against `commitment` and derive the session key.
    pub fn session_key(
        &self,
        commitment: &KeyCommitment,
        tag: &[u8; 32],
        params: &PedersenParams,
    ) -> Result<[u8; 32], EngineError> {
        let mismatch =
            || EngineError::VerificationFailed("secret does not open the key commitment".into());
        match (self, commitment) {
            (KeyOpening::Hash(key), KeyCommitment::Hash(expected)) => {
                if hash_key_commitment(tag, key) != *expected {
                    return Err(mismatch());
                }
                Ok(*key)
            }
            (KeyOpening::Pedersen { value, blinding }, KeyCommitment::Pedersen(point)) => {
                let malformed = |e: SerializationError| EngineError::Malformed(e.to_string());
                let value = scalar_from_bytes(value).map_err(malformed)?;
                let blinding = scalar_from_bytes(blinding).map_err(malformed)?;
                let point = Commitment::from_bytes(point).map_err(malformed)?;
                if !verify_commitment(params, &point, value, blinding) {
                    return Err(mismatch());
                }
                field_key(&value)
            }
            _ => Err(EngineError::VerificationFailed(
                "secret opening does not match the commitment scheme".into(),
            )),
        }
    }
}

fn entry_aad(tag: &[u8; 32], index: u64) -> Vec<u8> {
    [tag.as_slice(), &index.to_le_bytes()].concat()
}

impl SealedEntry {
    pub(crate) fn seal(
        session_key: &[u8; 32],
        tag: &[u8; 32],
        index: u64,
        plaintext: &[u8],
    ) -> Result<Self, EngineError> {
        let key = derive_record_key(session_key, index);
        let ciphertext = seal(&key, plaintext, &entry_aad(tag, index))
            .map_err(|e| EngineError::Rejected(e.to_string()))?;
        Ok(Self { index, ciphertext })
    }

    pub fn open(&self, session_key: &[u8; 32], tag: &[u8; 32]) -> Result<Vec<u8>, EngineError> {
        let key = derive_record_key(session_key, self.index);
        open(&key, &self.ciphertext, &entry_aad(tag, self.index)).map_err(|_| {
            EngineError::VerificationFailed(format!("entry {} does not open", self.index))
        })
    }
}

/// Split an opened record entry into its salt and record bytes.
pub(crate) fn split_salted(opened: &[u8]) -> Option<([u8; SALT_LENGTH], &[u8])> {
    if opened.len() < SALT_LENGTH {
        return None;
    }
    let (salt, record) = opened.split_at(SALT_LENGTH);
    Some((salt.try_into().ok()?, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commit;
    use ark_ff::UniformRand;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn artifact_kind_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.bin");
        let receipt = Receipt::acknowledge([1; 32], [2; 32]);
        write_artifact(&path, MessageKind::Receipt, &receipt).unwrap();

        let back: Receipt = read_artifact(&path, MessageKind::Receipt).unwrap();
        assert_eq!(back, receipt);
        assert!(back.is_well_formed());

        let err = read_artifact::<Receipt>(&path, MessageKind::Secret).unwrap_err();
        assert!(matches!(err, EngineError::Malformed(_)));
    }

    #[test]
    fn random_bytes_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.bin");
        fs::write(&path, [0xffu8; 48]).unwrap();
        assert!(matches!(
            read_artifact::<SignedSecret>(&path, MessageKind::Secret),
            Err(EngineError::Malformed(_))
        ));
    }

    #[test]
    fn tampered_receipt_is_not_well_formed() {
        let mut receipt = Receipt::acknowledge([1; 32], [2; 32]);
        receipt.response_digest[0] ^= 1;
        assert!(!receipt.is_well_formed());
    }

    #[test]
    fn signed_response_round_trip() {
        let key = signing::generate_signing_key(&mut StdRng::seed_from_u64(3));
        let public = signing::verifying_key_bytes(&key);
        let body = ResponseBody {
            tag: [5; 32],
            key_commitment: KeyCommitment::Hash([6; 32]),
            demand_commitment: None,
            entries: vec![SealedEntry {
                index: 0,
                ciphertext: vec![1, 2, 3],
            }],
        };
        let signed = SignedResponse::sign(body, &key).unwrap();
        let digest = signed.verify(&public).unwrap();
        assert_eq!(digest, signed.body.digest().unwrap());

        let mut forged = signed.clone();
        forged.body.entries[0].ciphertext[0] ^= 1;
        assert!(matches!(
            forged.verify(&public),
            Err(EngineError::VerificationFailed(_))
        ));
    }

    #[test]
    fn hash_opening_checks_commitment() {
        let mut rng = StdRng::seed_from_u64(4);
        let params = PedersenParams::setup(&mut rng);
        let tag = [7; 32];
        let key = [8; 32];
        let commitment = KeyCommitment::Hash(hash_key_commitment(&tag, &key));

        assert_eq!(
            KeyOpening::Hash(key).session_key(&commitment, &tag, &params).unwrap(),
            key
        );
        assert!(KeyOpening::Hash([9; 32])
            .session_key(&commitment, &tag, &params)
            .is_err());
    }

    #[test]
    fn pedersen_opening_checks_commitment() {
        let mut rng = StdRng::seed_from_u64(5);
        let params = PedersenParams::setup(&mut rng);
        let (value, blinding) = (Fr::rand(&mut rng), Fr::rand(&mut rng));
        let point = commit(&params, value, blinding).to_bytes().unwrap();
        let commitment = KeyCommitment::Pedersen(point);
        let tag = [1; 32];

        let opening = KeyOpening::pedersen(&value, &blinding).unwrap();
        assert_eq!(
            opening.session_key(&commitment, &tag, &params).unwrap(),
            field_key(&value).unwrap()
        );

        let wrong = KeyOpening::pedersen(&blinding, &value).unwrap();
        assert!(matches!(
            wrong.session_key(&commitment, &tag, &params),
            Err(EngineError::VerificationFailed(_))
        ));

        assert!(KeyOpening::Hash([0; 32])
            .session_key(&commitment, &tag, &params)
            .is_err());
    }

    #[test]
    fn sealed_entries_bind_tag_and_index() {
        let key = [3; 32];
        let entry = SealedEntry::seal(&key, &[1; 32], 4, b"salted record").unwrap();
        assert_eq!(entry.open(&key, &[1; 32]).unwrap(), b"salted record");
        assert!(entry.open(&key, &[2; 32]).is_err());

        let mut moved = entry.clone();
        moved.index = 5;
        assert!(moved.open(&key, &[1; 32]).is_err());
    }

    #[test]
    fn salted_split() {
        let mut opened = vec![9u8; SALT_LENGTH];
        opened.extend_from_slice(b"row");
        let (salt, record) = split_salted(&opened).unwrap();
        assert_eq!(salt, [9u8; SALT_LENGTH]);
        assert_eq!(record, b"row");
        assert!(split_salted(&[0u8; 3]).is_none());
    }
}
