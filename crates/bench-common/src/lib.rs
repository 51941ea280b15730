//! Common types shared across the benchmark comparison workspace.

pub mod error;
pub mod field;
pub mod grid;

pub use error::{BenchError, BenchResult};
pub use field::{Dataset, Dim, Field};
pub use grid::{GridDescriptor, GridKind, DEFAULT_MIXED_RESOLUTION, LATLON_RESOLUTIONS};
