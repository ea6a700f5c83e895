//! Scratch directory for intermediate optimized images.
//!
//! The directory lives inside the output directory for the duration of one
//! run and is removed when the guard is dropped, on every exit path.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::SetupError;

const SCRATCH_PREFIX: &str = ".images-to-pdf-";

pub struct ScratchDir {
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create a fresh, uniquely named scratch directory under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self, SetupError> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| SetupError::Scratch {
                path: parent.to_path_buf(),
                source,
            })?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(d) => d.path(),
            None => Path::new(""),
        }
    }

    /// Path for the scratch copy of the `index`-th input. The index prefix
    /// keeps inputs that share a file stem apart.
    pub fn item_path(&self, index: usize, stem: &str, extension: &str) -> PathBuf {
        self.path().join(format!("{:05}-{}.{}", index, stem, extension))
    }

    /// Remove the directory now, reporting failure instead of only logging it.
    pub fn close(mut self) -> std::io::Result<()> {
        match self.dir.take() {
            Some(d) => d.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(d) = self.dir.take() {
            let path = d.path().to_path_buf();
            match d.close() {
                Ok(()) => debug!("Cleaned up scratch directory {}", path.display()),
                Err(e) => warn!("Failed to clean up scratch directory {}: {}", path.display(), e),
            }
        }
    }
}
