//! Error types for benchmark comparisons.

use thiserror::Error;

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

/// Primary error type for grid classification and field comparison.
#[derive(Debug, Error)]
pub enum BenchError {
    // === Grid Errors ===
    /// Horizontal shape is not a recognized lat-lon or cubed-sphere grid.
    #[error("unsupported {nlat}x{nlon} grid")]
    UnsupportedGrid { nlat: usize, nlon: usize },

    /// A resolution string could not be parsed into a grid.
    #[error("invalid resolution '{0}'")]
    InvalidResolution(String),

    /// Regridder acquisition or application failed.
    #[error("regridding failed: {0}")]
    Regrid(String),

    // === Variable Errors ===
    /// Missing horizontal axes, bad indices, or ref/dev shape disagreement.
    #[error("dimension error for '{variable}': {message}")]
    Dimension { variable: String, message: String },

    /// Ref and dev declare different units and enforcement is on.
    #[error("units do not match for '{variable}': ref '{ref_units}', dev '{dev_units}'")]
    UnitMismatch {
        variable: String,
        ref_units: String,
        dev_units: String,
    },

    /// Area normalization was required but no area data was available.
    #[error("cannot normalize '{variable}' by area: {message}")]
    NormalizationConfig { variable: String, message: String },

    /// Requested variable is absent from one of the datasets.
    #[error("variable '{variable}' not found in {dataset} dataset")]
    VariableNotFound { variable: String, dataset: String },

    // === Configuration Errors ===
    #[error("configuration error: {0}")]
    Config(String),
}

impl BenchError {
    /// Create a Dimension error.
    pub fn dimension(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dimension {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Create a NormalizationConfig error.
    pub fn normalization(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NormalizationConfig {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Create a VariableNotFound error.
    pub fn not_found(variable: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self::VariableNotFound {
            variable: variable.into(),
            dataset: dataset.into(),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error aborts a whole comparison run rather than a single variable.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            BenchError::UnsupportedGrid { .. }
                | BenchError::InvalidResolution(_)
                | BenchError::Regrid(_)
                | BenchError::Config(_)
        )
    }
}
