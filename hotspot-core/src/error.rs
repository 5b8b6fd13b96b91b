//! Errors raised by the preparation pipeline and its persistence layer.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::ports::PortError;

#[derive(thiserror::Error, Debug)]
/// Top-level error type for pipeline runs.
pub enum HotspotError {
    /// A data source failed.
    #[error(transparent)]
    Port(#[from] PortError),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A CSV file could not be read or written.
    #[error("CSV error on {path}: {source}")]
    Csv {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },
    /// A JSON file could not be read or written.
    #[error("JSON error on {path}: {source}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// A GeoJSON document could not be built or parsed.
    #[error("GeoJSON error on {path}: {source}")]
    GeoJson {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: Box<geojson::Error>,
    },
    /// Input violates an assumption of the preparer.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HotspotError {
    /// Create an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a CSV error with the path it occurred on.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error with the path it occurred on.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Create a GeoJSON error with the path it occurred on.
    pub fn geojson(path: impl Into<PathBuf>, source: geojson::Error) -> Self {
        Self::GeoJson {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, HotspotError>;
