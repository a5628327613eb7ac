//! Published data handles.
//!
//! [`SellerData`] is the seller's view of a dataset it published;
//! [`BuyerData`] is a buyer's view of the same dataset through its bulletin
//! and public directory. Each owns one engine resource and is moved into
//! exactly one session, which releases it when the session closes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::artifact;
use crate::engine::{ProofEngine, ResourceId};
use crate::error::{PodError, StepClass};
use crate::resource::{EngineHandle, ResourceKind};
use crate::types::DataMode;

/// The seller's handle on a published dataset.
#[derive(Debug)]
pub struct SellerData {
    handle: EngineHandle,
    mode: DataMode,
    publish_dir: PathBuf,
}

impl SellerData {
    /// Open the dataset published under `publish_dir`.
    pub fn open(
        engine: Arc<dyn ProofEngine>,
        mode: DataMode,
        publish_dir: impl AsRef<Path>,
    ) -> Result<Self, PodError> {
        const OP: &str = "SellerData::open";
        let publish_dir = publish_dir.as_ref();
        artifact::check_dir(OP, publish_dir)?;

        let id = engine
            .new_seller_data(mode, publish_dir)
            .map_err(|e| PodError::from_engine(OP, StepClass::Construct("seller data"), e))?;
        debug!(resource = %id, %mode, dir = %publish_dir.display(), "seller data opened");

        Ok(Self {
            handle: EngineHandle::new(engine, id, ResourceKind::SellerData),
            mode,
            publish_dir: publish_dir.to_path_buf(),
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn publish_dir(&self) -> &Path {
        &self.publish_dir
    }

    pub fn resource(&self) -> Result<ResourceId, PodError> {
        self.handle.id("SellerData::resource")
    }

    /// Release the dataset without ever building a session on it.
    pub fn close(mut self) -> Result<(), PodError> {
        self.handle.release()
    }

    pub(crate) fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    pub(crate) fn handle_mut(&mut self) -> &mut EngineHandle {
        &mut self.handle
    }
}

/// The buyer's handle on a published dataset.
#[derive(Debug)]
pub struct BuyerData {
    handle: EngineHandle,
    mode: DataMode,
    bulletin: PathBuf,
}

impl BuyerData {
    /// Open the dataset described by `bulletin`, with its public material
    /// under `public_dir`.
    pub fn open(
        engine: Arc<dyn ProofEngine>,
        mode: DataMode,
        bulletin: impl AsRef<Path>,
        public_dir: impl AsRef<Path>,
    ) -> Result<Self, PodError> {
        const OP: &str = "BuyerData::open";
        let (bulletin, public_dir) = (bulletin.as_ref(), public_dir.as_ref());
        artifact::check_input(OP, bulletin)?;
        artifact::check_dir(OP, public_dir)?;

        let id = engine
            .new_buyer_data(mode, bulletin, public_dir)
            .map_err(|e| PodError::from_engine(OP, StepClass::Construct("buyer data"), e))?;
        debug!(resource = %id, %mode, bulletin = %bulletin.display(), "buyer data opened");

        Ok(Self {
            handle: EngineHandle::new(engine, id, ResourceKind::BuyerData),
            mode,
            bulletin: bulletin.to_path_buf(),
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn bulletin(&self) -> &Path {
        &self.bulletin
    }

    pub fn resource(&self) -> Result<ResourceId, PodError> {
        self.handle.id("BuyerData::resource")
    }

    pub fn close(mut self) -> Result<(), PodError> {
        self.handle.release()
    }

    pub(crate) fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    pub(crate) fn handle_mut(&mut self) -> &mut EngineHandle {
        &mut self.handle
    }
}
