//! Per-variable comparison output.

use std::sync::Arc;

use bench_common::GridDescriptor;
use ndarray::ArrayD;
use regridder::GridGeometry;

use crate::stats::ComparisonStats;

/// Matched arrays and display statistics for one variable.
///
/// Value arrays are in canonical layout: `(lat, lon)` or `(nf, Ydim, Xdim)`
/// for level slices, `(lev, lat)` for zonal means.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub name: String,
    pub ref_native: ArrayD<f64>,
    pub dev_native: ArrayD<f64>,
    pub ref_on_cmp: ArrayD<f64>,
    pub dev_on_cmp: ArrayD<f64>,
    /// `dev_on_cmp - ref_on_cmp`.
    pub abs_diff: ArrayD<f64>,
    /// `(dev_on_cmp - ref_on_cmp) / ref_on_cmp`, NaN where both are zero.
    pub frac_diff: ArrayD<f64>,
    /// Units of every value array, after any normalization.
    pub units: String,
    /// Extra panel subtitle text, e.g. `", Normalized by Area"`.
    pub subtitle_extra: String,
    /// Human-readable slice description (`"Surface"`, `"500 hPa"`, `"Zonal Mean"`).
    pub layer_label: String,
    pub ref_grid: GridDescriptor,
    pub dev_grid: GridDescriptor,
    pub cmp_grid: GridDescriptor,
    /// Centres, boundaries and seam masks for plotting each grid.
    pub ref_geometry: Arc<GridGeometry>,
    pub dev_geometry: Arc<GridGeometry>,
    pub cmp_geometry: Arc<GridGeometry>,
    /// Either input was regridded onto the comparison grid.
    pub regridded_any: bool,
    pub stats: ComparisonStats,
}

impl ComparisonResult {
    /// Comparison resolution label, e.g. `"4x5"`.
    pub fn cmp_resolution(&self) -> String {
        self.cmp_grid.label()
    }

    /// Panel title for the variable, e.g. `"SpeciesConc_O3, 500 hPa"`.
    pub fn title(&self) -> String {
        if self.layer_label.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.layer_label)
        }
    }
}

/// A variable that could not be compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of a streamed comparison run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ref_grid: GridDescriptor,
    pub dev_grid: GridDescriptor,
    pub cmp_grid: GridDescriptor,
    pub succeeded: usize,
    pub failures: Vec<VariableFailure>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// All results and failures of a comparison run.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub ref_grid: GridDescriptor,
    pub dev_grid: GridDescriptor,
    pub cmp_grid: GridDescriptor,
    pub results: Vec<ComparisonResult>,
    pub failures: Vec<VariableFailure>,
}

impl ComparisonReport {
    pub fn get(&self, name: &str) -> Option<&ComparisonResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Receives comparison results as they are produced.
pub trait ComparisonSink {
    fn accept(&mut self, result: ComparisonResult);
}

impl ComparisonSink for Vec<ComparisonResult> {
    fn accept(&mut self, result: ComparisonResult) {
        self.push(result);
    }
}
