//! Owned engine resources.
//!
//! An [`EngineHandle`] owns exactly one engine-side resource. It is released
//! at most once: explicitly through [`EngineHandle::release`], which reports
//! failures, or implicitly on drop, which can only log them. A released
//! handle refuses further use with [`PodError::Resource`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{ProofEngine, ResourceId};
use crate::error::{PodError, StepClass};

/// What kind of engine resource a handle owns. Decides which engine call
/// frees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    SellerData,
    BuyerData,
    Session,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::SellerData => write!(f, "seller data"),
            ResourceKind::BuyerData => write!(f, "buyer data"),
            ResourceKind::Session => write!(f, "session"),
        }
    }
}

/// Sole owner of one engine resource.
pub struct EngineHandle {
    engine: Arc<dyn ProofEngine>,
    id: Option<ResourceId>,
    kind: ResourceKind,
}

impl EngineHandle {
    pub(crate) fn new(engine: Arc<dyn ProofEngine>, id: ResourceId, kind: ResourceKind) -> Self {
        debug!(resource = %id, kind = %kind, "engine resource acquired");
        Self {
            engine,
            id: Some(id),
            kind,
        }
    }

    /// The live resource id, or a `Resource` error once released.
    pub fn id(&self, operation: &'static str) -> Result<ResourceId, PodError> {
        self.id.ok_or_else(|| {
            PodError::resource(operation, format!("{} handle already released", self.kind))
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }

    pub(crate) fn engine(&self) -> &Arc<dyn ProofEngine> {
        &self.engine
    }

    /// Free the resource. A second call is a `Resource` error.
    ///
    /// The handle counts as released even when the engine call fails: the
    /// resource is not retried.
    pub fn release(&mut self) -> Result<(), PodError> {
        const OP: &str = "release";
        let id = self.id(OP)?;
        self.id = None;
        self.free(id)
            .map_err(|e| PodError::from_engine(OP, StepClass::Exchange, e))?;
        debug!(resource = %id, kind = %self.kind, "engine resource released");
        Ok(())
    }

    fn free(&self, id: ResourceId) -> Result<(), crate::engine::EngineError> {
        match self.kind {
            ResourceKind::SellerData | ResourceKind::BuyerData => self.engine.free_data(id),
            ResourceKind::Session => self.engine.free_session(id),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            match self.free(id) {
                Ok(()) => {
                    debug!(resource = %id, kind = %self.kind, "engine resource released on drop")
                }
                Err(e) => warn!(
                    resource = %id,
                    kind = %self.kind,
                    error = %e,
                    "failed to release engine resource on drop"
                ),
            }
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reference::testing;
    use crate::error::ErrorKind;
    use crate::types::DataMode;

    fn seller_data(
        dir: &tempfile::TempDir,
    ) -> (Arc<crate::engine::reference::ReferenceEngine>, ResourceId) {
        let engine = testing::engine(1);
        let publish_dir = testing::publish_plain(dir.path(), b"0123456789", 2);
        let id = engine.new_seller_data(DataMode::Plain, &publish_dir).unwrap();
        (engine, id)
    }

    #[test]
    fn release_twice_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, id) = seller_data(&dir);
        let mut handle = EngineHandle::new(engine.clone(), id, ResourceKind::SellerData);

        handle.release().unwrap();
        assert!(handle.is_released());
        assert_eq!(handle.release().unwrap_err().kind(), ErrorKind::Resource);
        assert_eq!(handle.id("decrypt").unwrap_err().kind(), ErrorKind::Resource);
        assert_eq!(engine.live_resources(), 0);
    }

    #[test]
    fn drop_frees_the_resource() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, id) = seller_data(&dir);
        {
            let _handle = EngineHandle::new(engine.clone(), id, ResourceKind::SellerData);
            assert_eq!(engine.live_resources(), 1);
        }
        assert_eq!(engine.live_resources(), 0);
    }

    #[test]
    fn engine_side_invalidation_surfaces_as_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, id) = seller_data(&dir);
        let mut handle = EngineHandle::new(engine.clone(), id, ResourceKind::SellerData);
        engine.free_data(id).unwrap();

        let err = handle.release().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(handle.is_released());
    }
}
