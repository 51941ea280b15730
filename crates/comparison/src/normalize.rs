//! Cell-area normalization of extensive quantities.

use bench_common::{BenchError, BenchResult};
use ndarray::ArrayD;

/// Name fragments of rate variables that are never area-normalized.
pub const NORMALIZATION_EXCLUSIONS: &[&str] = &["WetLossConvFrac", "Prod_", "Loss_"];

/// Units that trigger normalization when regridding.
pub const AREA_EXTENSIVE_UNITS: &[&str] = &["kg", "kgC"];

/// Display suffix attached to normalized variables.
pub const NORMALIZED_SUFFIX: &str = ", Normalized by Area";

/// When to divide a layer by cell area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizationPolicy {
    /// Normalize every eligible variable.
    pub force: bool,
    /// Either input is being regridded.
    pub regridding: bool,
}

impl NormalizationPolicy {
    pub fn new(force: bool, regridding: bool) -> Self {
        Self { force, regridding }
    }

    /// Whether a variable must be normalized under this policy.
    pub fn applies(&self, varname: &str, units: &str) -> bool {
        if is_excluded(varname) {
            return false;
        }
        self.force || (self.regridding && AREA_EXTENSIVE_UNITS.contains(&units))
    }
}

/// Whether a variable name matches the exclusion list.
pub fn is_excluded(varname: &str) -> bool {
    NORMALIZATION_EXCLUSIONS.iter().any(|s| varname.contains(s))
}

/// A layer after the normalization step.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub data: ArrayD<f64>,
    pub units: String,
    /// `", Normalized by Area"` when normalized, empty otherwise.
    pub subtitle_suffix: String,
}

impl Normalized {
    pub fn is_normalized(&self) -> bool {
        !self.subtitle_suffix.is_empty()
    }
}

/// Divide `layer` by `area` when `policy` requires it.
///
/// `area` covers one horizontal layer and is broadcast over any leading
/// (level) axes of `layer`. It is only consulted when normalization
/// applies; a missing area is then an error.
pub fn normalize(
    layer: ArrayD<f64>,
    area: Option<&ArrayD<f64>>,
    varname: &str,
    units: &str,
    policy: NormalizationPolicy,
) -> BenchResult<Normalized> {
    if !policy.applies(varname, units) {
        return Ok(Normalized {
            data: layer,
            units: units.to_string(),
            subtitle_suffix: String::new(),
        });
    }

    let area = area.ok_or_else(|| {
        BenchError::normalization(varname, "no AREAM2 field or area override available")
    })?;

    let area = area.broadcast(layer.shape()).ok_or_else(|| {
        BenchError::normalization(
            varname,
            format!(
                "area shape {:?} does not match layer shape {:?}",
                area.shape(),
                layer.shape()
            ),
        )
    })?;

    Ok(Normalized {
        data: layer / &area,
        units: format!("{}/m2", units),
        subtitle_suffix: NORMALIZED_SUFFIX.to_string(),
    })
}
