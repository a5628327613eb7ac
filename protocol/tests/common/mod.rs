//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use pod_protocol::config::{BULLETIN_FILE, PUBLIC_DIR};
use pod_protocol::engine::reference::{publish_with_rng, PublishOptions};
use pod_protocol::session::{Negotiated, Variant};
use pod_protocol::{
    BuyerSession, DataMode, EngineParams, Identity, ProofEngine, ReferenceEngine, SellerSession,
};

pub const PLAIN: &[u8] = b"0123456789abcdef";

pub const PEOPLE: &str = "id,name,city\n1,alice,paris\n2,bob,rome\n3,carol,paris\n4,dave,lima\n";

/// A scratch directory, one engine and one published dataset.
pub struct Fixture {
    pub dir: TempDir,
    pub engine: Arc<ReferenceEngine>,
    pub publish_dir: PathBuf,
    pub mode: DataMode,
}

impl Fixture {
    fn publish(source: &[u8], options: PublishOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source");
        fs::write(&source_path, source).unwrap();
        let publish_dir = dir.path().join("published");
        publish_with_rng(
            &source_path,
            &publish_dir,
            &options,
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();

        let params = EngineParams::setup(&mut StdRng::seed_from_u64(7));
        Self {
            dir,
            engine: Arc::new(ReferenceEngine::new(params)),
            publish_dir,
            mode: options.mode,
        }
    }

    pub fn plain(data: &[u8], record_size: u64) -> Self {
        Self::publish(data, PublishOptions::plain(record_size))
    }

    pub fn table(csv: &str, key_columns: &[&str]) -> Self {
        Self::publish(csv.as_bytes(), PublishOptions::table(key_columns.iter().copied()))
    }

    pub fn engine(&self) -> Arc<dyn ProofEngine> {
        self.engine.clone()
    }

    pub fn bulletin(&self) -> PathBuf {
        self.publish_dir.join(BULLETIN_FILE)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.publish_dir.join(PUBLIC_DIR)
    }

    /// Path for an artifact in the scratch directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn seller<V: Variant>(&self, seller: &Identity, buyer: &Identity) -> SellerSession<V> {
        SellerSession::open(self.engine(), self.mode, &self.publish_dir, seller, buyer).unwrap()
    }

    pub fn buyer<V: Variant>(
        &self,
        seller: &Identity,
        buyer: &Identity,
        demand: V::Demand,
    ) -> BuyerSession<V> {
        BuyerSession::open(
            self.engine(),
            self.mode,
            self.bulletin(),
            self.public_dir(),
            seller,
            buyer,
            demand,
        )
        .unwrap()
    }
}

pub fn narrow(byte: u8) -> Identity {
    Identity::from([byte; 32])
}

pub fn wide(byte: u8) -> Identity {
    Identity::from([byte; 40])
}

/// Both negotiation halves, buyer-initiated half first.
pub fn negotiate<V: Negotiated>(
    fx: &Fixture,
    seller: &mut SellerSession<V>,
    buyer: &mut BuyerSession<V>,
) {
    buyer.get_nego_request(fx.path("nego_b_req")).unwrap();
    seller
        .on_nego_request(fx.path("nego_b_req"), fx.path("nego_s_resp"))
        .unwrap();
    buyer.on_nego_response(fx.path("nego_s_resp")).unwrap();

    seller.get_nego_request(fx.path("nego_s_req")).unwrap();
    buyer
        .on_nego_request(fx.path("nego_s_req"), fx.path("nego_b_resp"))
        .unwrap();
    seller.on_nego_response(fx.path("nego_b_resp")).unwrap();
}

/// Request through secret release. Returns the secret artifact path.
pub fn exchange<V: Variant>(
    fx: &Fixture,
    seller: &mut SellerSession<V>,
    buyer: &mut BuyerSession<V>,
    prefix: &str,
) -> PathBuf {
    let name = |step: &str| fx.path(&format!("{prefix}_{step}"));
    buyer.get_request(name("request")).unwrap();
    seller.on_request(name("request"), name("response")).unwrap();
    buyer.on_response(name("response"), name("receipt")).unwrap();
    seller.on_receipt(name("receipt"), name("secret")).unwrap();
    name("secret")
}

pub fn read(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap()
}
