//! One-time engine setup.
//!
//! Every party that verifies a verifiable-commitment swap must agree on the
//! same Pedersen generators. They are generated once, saved next to the
//! deployment, and loaded into every engine explicitly; there is no global
//! "already initialized" state.

use std::fs;
use std::path::{Path, PathBuf};

use ark_std::rand::Rng;
use tracing::debug;

use crate::config::ENGINE_PARAMS_FILE;
use crate::crypto::PedersenParams;
use crate::engine::EngineError;

/// Setup parameters shared by every engine of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    pedersen: PedersenParams,
}

impl EngineParams {
    /// Generate fresh parameters.
    pub fn setup<R: Rng>(rng: &mut R) -> Self {
        Self {
            pedersen: PedersenParams::setup(rng),
        }
    }

    pub fn pedersen(&self) -> &PedersenParams {
        &self.pedersen
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        self.pedersen
            .to_bytes()
            .map_err(|e| EngineError::InvalidData(format!("engine params: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let pedersen = PedersenParams::from_bytes(bytes)
            .map_err(|e| EngineError::InvalidData(format!("engine params: {e}")))?;
        Ok(Self { pedersen })
    }

    /// Write the parameters into `dir`. Returns the file written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, EngineError> {
        let path = dir.join(ENGINE_PARAMS_FILE);
        fs::write(&path, self.to_bytes()?)?;
        debug!(path = %path.display(), "engine params saved");
        Ok(path)
    }

    /// Read the parameters saved in `dir`.
    pub fn load(dir: &Path) -> Result<Self, EngineError> {
        let path = dir.join(ENGINE_PARAMS_FILE);
        let bytes = fs::read(&path)?;
        let params = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), "engine params loaded");
        Ok(params)
    }
}
