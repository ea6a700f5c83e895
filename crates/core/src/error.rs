use std::path::PathBuf;

/// Top-level error type. `convert_directory` returns this as the run's single
/// terminal error; per-item failures never reach it.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Nothing to convert: {0}")]
    EmptyInput(#[from] EmptyInputError),

    #[error("Could not write document: {0}")]
    Persist(#[from] PersistError),
}

/// Coarse classification of a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    FatalSetup,
    EmptyInput,
    PersistFailure,
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::Setup(_) => ErrorKind::FatalSetup,
            ConvertError::EmptyInput(_) => ErrorKind::EmptyInput,
            ConvertError::Persist(_) => ErrorKind::PersistFailure,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("input directory does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create scratch directory in {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to find image files: {0}")]
    Discover(#[from] DiscoverError),
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("cannot read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EmptyInputError {
    #[error("no image files found in directory: {}", .0.display())]
    NoImages(PathBuf),

    #[error("all {attempted} images failed optimization")]
    AllItemsFailed { attempted: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("cannot derive page size from an empty batch")]
    EmptyBatch,
}

/// Failure of a single image. Recorded in the batch result and skipped.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("JPEG encoding failed at quality {quality}: {source}")]
    Encode {
        quality: u8,
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("page builder was not started with a page geometry")]
    NotStarted,

    #[error("cannot embed {}: {detail}", path.display())]
    Embed { path: PathBuf, detail: String },

    #[error("failed to save PDF to {}: {detail}", path.display())]
    Save { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
