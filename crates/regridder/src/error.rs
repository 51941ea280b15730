//! Error types for regridding.

use bench_common::BenchError;
use thiserror::Error;

/// Errors that can occur while building, persisting or applying regridders.
#[derive(Error, Debug)]
pub enum RegridError {
    /// Storage/IO error while reading or writing weights files.
    #[error("weights file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Weights file does not start with the expected magic bytes.
    #[error("invalid weights file magic bytes")]
    InvalidMagic,

    /// Weights file was written by an incompatible format version.
    #[error("unsupported weights file version: {0}")]
    UnsupportedVersion(u32),

    /// Weights file body does not match its trailing checksum.
    #[error("weights file checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Weights file ended before all declared content was read.
    #[error("weights file truncated: {0}")]
    Truncated(String),

    /// The (source, target) pair is not a supported regridding direction.
    #[error("unsupported regridding direction: {from} -> {to}")]
    UnsupportedDirection { from: String, to: String },

    /// An input layer does not have the operator's source shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RegridError {
    /// Create an UnsupportedDirection error.
    pub fn unsupported(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::UnsupportedDirection {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}

impl From<RegridError> for BenchError {
    fn from(err: RegridError) -> Self {
        BenchError::Regrid(err.to_string())
    }
}

/// Result type for regridder operations.
pub type Result<T> = std::result::Result<T, RegridError>;
