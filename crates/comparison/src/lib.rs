//! Compare a reference and a development model output dataset.
//!
//! The [`ComparisonEngine`] puts each requested variable of both datasets on
//! a common grid and slice, computes absolute and fractional differences,
//! and derives display ranges for plotting. Results are streamed to a
//! [`ComparisonSink`] or collected into a [`ComparisonReport`].

pub mod config;
pub mod engine;
pub mod normalize;
pub mod result;
pub mod slicer;
pub mod stats;
pub mod varlist;

pub use config::{ComparisonConfig, SliceKind};
pub use engine::{fractional_difference, zonal_mean, AreaOverrides, ComparisonEngine, VariableArea};
pub use normalize::{normalize, NormalizationPolicy, Normalized};
pub use result::{ComparisonReport, ComparisonResult, ComparisonSink, RunSummary, VariableFailure};
pub use stats::{ComparisonStats, DiffRanges, DisplayRange};
pub use varlist::{common_variables, CommonVariables};
