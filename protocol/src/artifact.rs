//! Artifact path preconditions.
//!
//! Every inter-party message travels as a file. These checks are the only
//! ones the session layer owns: they run before any engine call so that a
//! bad path surfaces as [`PodError::Io`] instead of an opaque engine failure.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::error::PodError;

/// An input artifact must exist, be a regular file, and be readable.
pub fn check_input(operation: &'static str, path: &Path) -> Result<(), PodError> {
    let metadata = fs::metadata(path).map_err(|e| PodError::io(operation, path, e))?;
    if !metadata.is_file() {
        return Err(PodError::io(
            operation,
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    File::open(path).map_err(|e| PodError::io(operation, path, e))?;
    Ok(())
}

/// An output artifact's parent directory must exist.
///
/// A bare file name resolves against the working directory.
pub fn check_output(operation: &'static str, path: &Path) -> Result<(), PodError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let metadata = fs::metadata(parent).map_err(|e| PodError::io(operation, parent, e))?;
    if !metadata.is_dir() {
        return Err(PodError::io(
            operation,
            parent,
            io::Error::new(io::ErrorKind::InvalidInput, "parent is not a directory"),
        ));
    }
    Ok(())
}

/// A data directory must exist, be a directory, and be listable.
pub fn check_dir(operation: &'static str, path: &Path) -> Result<(), PodError> {
    let metadata = fs::metadata(path).map_err(|e| PodError::io(operation, path, e))?;
    if !metadata.is_dir() {
        return Err(PodError::io(
            operation,
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    fs::read_dir(path).map_err(|e| PodError::io(operation, path, e))?;
    Ok(())
}
