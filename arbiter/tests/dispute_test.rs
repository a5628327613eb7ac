//! Disputes opened from real session claims.
//!
//! A Complaint session is run against the reference engine, the buyer is
//! handed a secret that does not belong to it, and the resulting claim is
//! carried through the dispute lifecycle.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use pod_arbiter::{Dispute, DisputeError, DisputeStatus};
use pod_protocol::config::{BULLETIN_FILE, PUBLIC_DIR};
use pod_protocol::engine::reference::{publish_with_rng, Bulletin, NotaryError, PublishOptions};
use pod_protocol::{
    BuyerSession, Complaint, DataMode, EngineParams, Identity, ProofEngine, Range, RangeSet,
    ReferenceEngine, SellerSession,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

struct Scenario {
    _dir: TempDir,
    bulletin: Bulletin,
    params: EngineParams,
    claim: Vec<u8>,
}

fn run_session(
    engine: &Arc<dyn ProofEngine>,
    publish_dir: &Path,
    scratch: &Path,
    prefix: &str,
) -> (BuyerSession<Complaint>, std::path::PathBuf) {
    let (s, b) = (Identity::from([1u8; 32]), Identity::from([2u8; 32]));
    let demand = RangeSet::new(vec![Range::new(0, 2)]).unwrap();
    let mut seller = SellerSession::<Complaint>::open(
        engine.clone(),
        DataMode::Plain,
        publish_dir,
        &s,
        &b,
    )
    .unwrap();
    let mut buyer = BuyerSession::<Complaint>::open(
        engine.clone(),
        DataMode::Plain,
        publish_dir.join(BULLETIN_FILE),
        publish_dir.join(PUBLIC_DIR),
        &s,
        &b,
        demand,
    )
    .unwrap();

    let name = |step: &str| scratch.join(format!("{prefix}_{step}"));
    buyer.get_request(name("request")).unwrap();
    seller.on_request(name("request"), name("response")).unwrap();
    buyer.on_response(name("response"), name("receipt")).unwrap();
    seller.on_receipt(name("receipt"), name("secret")).unwrap();
    seller.close().unwrap();
    (buyer, name("secret"))
}

/// A buyer that was handed another session's secret files a claim.
fn misdelivered_secret() -> Scenario {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    fs::write(&source, b"0123456789abcdef").unwrap();
    let publish_dir = dir.path().join("published");
    let bulletin = publish_with_rng(
        &source,
        &publish_dir,
        &PublishOptions::plain(4),
        &mut StdRng::seed_from_u64(42),
    )
    .unwrap();

    let params = EngineParams::setup(&mut StdRng::seed_from_u64(7));
    let engine: Arc<dyn ProofEngine> = Arc::new(ReferenceEngine::new(params.clone()));

    let (buyer_a, secret_a) = run_session(&engine, &publish_dir, dir.path(), "a");
    let (mut buyer_b, _) = run_session(&engine, &publish_dir, dir.path(), "b");
    buyer_a.close().unwrap();

    assert!(buyer_b.on_secret(&secret_a).is_err());
    let claim_path = dir.path().join("claim.json");
    buyer_b.generate_claim(&claim_path).unwrap();
    buyer_b.close().unwrap();

    Scenario {
        claim: fs::read(&claim_path).unwrap(),
        _dir: dir,
        bulletin,
        params,
    }
}

#[test]
fn misdelivered_secret_is_resolved_for_seller() {
    let sc = misdelivered_secret();
    let mut d = Dispute::open("buyer".into(), "seller".into(), sc.claim.clone()).unwrap();
    assert_eq!(d.claim(), sc.claim.as_slice());

    d.respond("seller", b"secret for session b was delivered").unwrap();
    let status = d.adjudicate(&sc.bulletin, &sc.params).unwrap();
    assert_eq!(status, DisputeStatus::ResolvedForSeller);
    assert!(!d.verdict.as_ref().unwrap().is_upheld());
    assert!(d.status.is_terminal());
}

#[test]
fn claim_against_another_dataset_leaves_dispute_open() {
    let sc = misdelivered_secret();
    let mut d = Dispute::open("buyer".into(), "seller".into(), sc.claim).unwrap();

    let mut other = sc.bulletin.clone();
    other.merkle_root = [0; 32];
    let err = d.adjudicate(&other, &sc.params).unwrap_err();
    assert!(matches!(err, DisputeError::Claim(NotaryError::BulletinMismatch)));
    assert_eq!(d.status, DisputeStatus::Open);
    assert!(d.verdict.is_none());

    d.adjudicate(&sc.bulletin, &sc.params).unwrap();
    assert!(matches!(
        d.adjudicate(&sc.bulletin, &sc.params),
        Err(DisputeError::AlreadyResolved)
    ));
}

#[test]
fn withdrawn_dispute_cannot_be_adjudicated() {
    let sc = misdelivered_secret();
    let mut d = Dispute::open("buyer".into(), "seller".into(), sc.claim).unwrap();
    d.withdraw("buyer").unwrap();

    let err = d.adjudicate(&sc.bulletin, &sc.params).unwrap_err();
    assert!(matches!(err, DisputeError::InvalidState { .. }));
    assert_eq!(d.status, DisputeStatus::Withdrawn);
}

#[test]
fn dispute_serializes_with_its_evidence() {
    let sc = misdelivered_secret();
    let d = Dispute::open("buyer".into(), "seller".into(), sc.claim).unwrap();
    let json = serde_json::to_string(&d).unwrap();
    let back: Dispute = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, d.id);
    assert_eq!(back.evidence, d.evidence);
    assert_eq!(back.claim(), d.claim());
}
