//! Error types for ingestion and cache persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating or reading source logs.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The configured source path does not exist.
    #[error("source path not found: {}", path.display())]
    SourceNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A directory in the source tree could not be listed.
    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading, validating or persisting the cached table.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Source discovery failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The source tree holds no file with a configured extension.
    #[error("no data files ({}) found under {}", extensions.join(", "), dir.display())]
    NoDataFiles {
        /// Directory that was scanned.
        dir: PathBuf,
        /// Extensions that were looked for.
        extensions: Vec<String>,
    },

    /// IO error reading or writing an artifact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet encoding or decoding failed.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction or conversion failed.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON serialization of the legacy artifact failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The artifact was readable but does not hold a valid table.
    #[error("invalid cache artifact {}: {reason}", path.display())]
    InvalidArtifact {
        /// Artifact path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
}

impl CacheError {
    /// Creates an invalid-artifact error.
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
