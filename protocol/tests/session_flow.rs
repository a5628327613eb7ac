//! Full protocol runs, one per variant family.
//!
//! Every test publishes its own dataset into a scratch directory, runs both
//! sides of a session against one reference engine, and checks what the
//! buyer ends up with.

mod common;

use common::{exchange, narrow, negotiate, read, wide, Fixture, PEOPLE, PLAIN};

use pod_protocol::engine::reference::messages::Positions;
use pod_protocol::{
    AtomicSwap, AtomicSwapVc, Batch, Complaint, KeywordSet, OtBatch, OtComplaint, OtVrfq,
    PhantomKeywords, PhantomRanges, Range, RangeSet, SessionState, Vrfq,
};

fn ranges(pairs: &[(u64, u64)]) -> RangeSet {
    RangeSet::new(pairs.iter().map(|&(s, c)| Range::new(s, c)).collect()).unwrap()
}

fn positions(path: &std::path::Path) -> Vec<Positions> {
    serde_json::from_slice(&read(path)).unwrap()
}

// ---------------------------------------------------------------------------
// Range variants
// ---------------------------------------------------------------------------

#[test]
fn batch_round_trip() {
    let fx = Fixture::plain(PLAIN, 4);
    let (s, b) = (narrow(1), narrow(2));
    let mut seller = fx.seller::<Batch>(&s, &b);
    let mut buyer = fx.buyer::<Batch>(&s, &b, ranges(&[(1, 2)]));

    let secret = exchange(&fx, &mut seller, &mut buyer, "batch");
    assert_eq!(seller.state(), SessionState::Receipted);
    assert_eq!(buyer.state(), SessionState::Receipted);

    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("plain.out")).unwrap();
    assert_eq!(read(&fx.path("plain.out")), b"456789ab");
    assert_eq!(buyer.state(), SessionState::Decrypted);

    // Decrypt is a pure derivation.
    buyer.decrypt(fx.path("again.out")).unwrap();
    assert_eq!(read(&fx.path("again.out")), b"456789ab");

    seller.close().unwrap();
    buyer.close().unwrap();
    assert_eq!(fx.engine.live_resources(), 0);
}

#[test]
fn demand_order_and_overlap_are_preserved() {
    let fx = Fixture::plain(PLAIN, 2);
    let (s, b) = (narrow(1), narrow(2));
    let mut seller = fx.seller::<Batch>(&s, &b);
    let mut buyer = fx.buyer::<Batch>(&s, &b, ranges(&[(3, 1), (0, 2), (1, 1)]));

    let secret = exchange(&fx, &mut seller, &mut buyer, "order");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("out")).unwrap();
    assert_eq!(read(&fx.path("out")), b"67012323");
}

#[test]
fn complaint_round_trip_over_table_data() {
    let fx = Fixture::table(PEOPLE, &["city"]);
    let (s, b) = (wide(1), wide(2));
    let mut seller = fx.seller::<Complaint>(&s, &b);
    let mut buyer = fx.buyer::<Complaint>(&s, &b, ranges(&[(1, 2)]));

    let secret = exchange(&fx, &mut seller, &mut buyer, "complaint");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("rows.out")).unwrap();
    assert_eq!(read(&fx.path("rows.out")), b"2,bob,rome\n3,carol,paris\n");
}

#[test]
fn atomic_swap_round_trip() {
    let fx = Fixture::plain(PLAIN, 3);
    let (s, b) = (wide(1), wide(2));
    let mut seller = fx.seller::<AtomicSwap>(&s, &b);
    let mut buyer = fx.buyer::<AtomicSwap>(&s, &b, ranges(&[(5, 1)]));

    let secret = exchange(&fx, &mut seller, &mut buyer, "swap");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("out")).unwrap();
    assert_eq!(read(&fx.path("out")), b"f");
}

#[test]
fn atomic_swap_with_verifiable_commitment_round_trip() {
    let fx = Fixture::plain(PLAIN, 5);
    let (s, b) = (wide(3), wide(4));
    let mut seller = fx.seller::<AtomicSwapVc>(&s, &b);
    let mut buyer = fx.buyer::<AtomicSwapVc>(&s, &b, ranges(&[(0, 4)]));

    let secret = exchange(&fx, &mut seller, &mut buyer, "swap_vc");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("out")).unwrap();
    assert_eq!(read(&fx.path("out")), PLAIN);
}

#[test]
fn ot_batch_round_trip() {
    let fx = Fixture::plain(PLAIN, 4);
    let (s, b) = (narrow(5), narrow(6));
    let demand = PhantomRanges::new(ranges(&[(2, 1)]), ranges(&[(0, 4)])).unwrap();
    let mut seller = fx.seller::<OtBatch>(&s, &b);
    let mut buyer = fx.buyer::<OtBatch>(&s, &b, demand);

    negotiate(&fx, &mut seller, &mut buyer);
    assert!(seller.negotiation().is_complete());
    assert!(buyer.negotiation().is_complete());
    assert_eq!(buyer.state(), SessionState::Negotiating);

    let secret = exchange(&fx, &mut seller, &mut buyer, "ot_batch");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("out")).unwrap();
    assert_eq!(read(&fx.path("out")), b"89ab");
}

#[test]
fn negotiation_halves_complete_in_either_order() {
    let fx = Fixture::plain(PLAIN, 4);
    let (s, b) = (narrow(5), narrow(6));
    let demand = PhantomRanges::new(ranges(&[(0, 1)]), ranges(&[(0, 2)])).unwrap();
    let mut seller = fx.seller::<OtBatch>(&s, &b);
    let mut buyer = fx.buyer::<OtBatch>(&s, &b, demand);

    // Both sides initiate before either answers.
    seller.get_nego_request(fx.path("s_req")).unwrap();
    buyer.get_nego_request(fx.path("b_req")).unwrap();
    buyer.on_nego_request(fx.path("s_req"), fx.path("b_resp")).unwrap();
    seller.on_nego_request(fx.path("b_req"), fx.path("s_resp")).unwrap();
    seller.on_nego_response(fx.path("b_resp")).unwrap();
    buyer.on_nego_response(fx.path("s_resp")).unwrap();

    let secret = exchange(&fx, &mut seller, &mut buyer, "crossed");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("out")).unwrap();
    assert_eq!(read(&fx.path("out")), b"0123");
}

/// The reference scenario: OT-Complaint over 16 one-byte records, demand
/// `{0,2} {5,3} {10,1}` hidden in the phantom set `{0,14}`.
#[test]
fn ot_complaint_scenario() {
    let fx = Fixture::plain(PLAIN, 1);
    let (s, b) = (wide(7), wide(8));
    let demand = || {
        PhantomRanges::new(ranges(&[(0, 2), (5, 3), (10, 1)]), ranges(&[(0, 14)])).unwrap()
    };

    // Honest run.
    let mut seller = fx.seller::<OtComplaint>(&s, &b);
    let mut buyer = fx.buyer::<OtComplaint>(&s, &b, demand());
    negotiate(&fx, &mut seller, &mut buyer);
    let secret = exchange(&fx, &mut seller, &mut buyer, "honest");
    buyer.on_secret(&secret).unwrap();
    buyer.decrypt(fx.path("scenario.out")).unwrap();

    let expected: Vec<u8> = [&PLAIN[0..2], &PLAIN[5..8], &PLAIN[10..11]].concat();
    assert_eq!(read(&fx.path("scenario.out")), expected);

    // A wrong secret fails, and the claim is still available.
    let mut seller = fx.seller::<OtComplaint>(&s, &b);
    let mut buyer = fx.buyer::<OtComplaint>(&s, &b, demand());
    negotiate(&fx, &mut seller, &mut buyer);
    exchange(&fx, &mut seller, &mut buyer, "disputed");

    std::fs::write(fx.path("wrong_secret"), b"not the secret").unwrap();
    let err = buyer.on_secret(fx.path("wrong_secret")).unwrap_err();
    assert_eq!(err.kind(), pod_protocol::ErrorKind::Verification);
    assert!(buyer.secret_rejected());

    buyer.generate_claim(fx.path("claim.json")).unwrap();
    assert!(!read(&fx.path("claim.json")).is_empty());
    assert_eq!(buyer.state(), SessionState::Claimed);
}

// ---------------------------------------------------------------------------
// Keyword variants
// ---------------------------------------------------------------------------

#[test]
fn vrfq_resolves_positions() {
    let fx = Fixture::table(PEOPLE, &["city", "name"]);
    let (s, b) = (wide(1), wide(2));
    let demand = KeywordSet::new("city", ["paris", "oslo"]).unwrap();
    let mut seller = fx.seller::<Vrfq>(&s, &b);
    let mut buyer = fx.buyer::<Vrfq>(&s, &b, demand);

    let secret = exchange(&fx, &mut seller, &mut buyer, "vrfq");
    buyer
        .on_secret_with_positions(&secret, fx.path("positions.json"))
        .unwrap();
    assert_eq!(buyer.state(), SessionState::Secreted);

    let found = positions(&fx.path("positions.json"));
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].value, "paris");
    assert_eq!(found[0].positions, vec![0, 2]);
    assert_eq!(found[1].value, "oslo");
    assert!(found[1].positions.is_empty());
}

#[test]
fn ot_vrfq_reports_only_demanded_values() {
    let fx = Fixture::table(PEOPLE, &["city"]);
    let (s, b) = (narrow(1), narrow(2));
    let demand = PhantomKeywords::new(
        KeywordSet::new("city", ["rome"]).unwrap(),
        KeywordSet::new("city", ["lima", "rome", "paris"]).unwrap(),
    )
    .unwrap();
    let mut seller = fx.seller::<OtVrfq>(&s, &b);
    let mut buyer = fx.buyer::<OtVrfq>(&s, &b, demand);

    negotiate(&fx, &mut seller, &mut buyer);
    let secret = exchange(&fx, &mut seller, &mut buyer, "ot_vrfq");
    buyer
        .on_secret_with_positions(&secret, fx.path("positions.json"))
        .unwrap();

    let found = positions(&fx.path("positions.json"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key_name, "city");
    assert_eq!(found[0].value, "rome");
    assert_eq!(found[0].positions, vec![1]);
}
