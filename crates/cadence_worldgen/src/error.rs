//! # World Generation Error Types
//!
//! All errors that can occur while loading settings or generating a world.

use std::path::PathBuf;

use cadence_core::TaskError;
use thiserror::Error;

/// Errors that can occur in world generation.
#[derive(Error, Debug)]
pub enum WorldGenError {
    /// A settings file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A settings file is not valid TOML for the expected shape.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings parsed but describe an impossible world.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for world generation.
pub type WorldGenResult<T> = Result<T, WorldGenError>;

impl From<WorldGenError> for TaskError {
    fn from(error: WorldGenError) -> Self {
        Self::external(error)
    }
}
