//! The comparison engine.
//!
//! One run classifies both datasets' grids, resolves the comparison grid and
//! acquires regrid operators once, then compares each variable in turn:
//!
//! ```text
//! slice -> normalize -> regrid -> reduce -> differences -> statistics
//! ```
//!
//! The slice kind picks the slice and reduce steps: a single level with no
//! reduction, or a full column averaged over longitude. Grid classification
//! and operator acquisition failures abort the run; anything that goes wrong
//! with a single variable is recorded and the run moves on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bench_common::{BenchError, BenchResult, Dataset, Field, GridDescriptor, DEFAULT_MIXED_RESOLUTION};
use ndarray::{ArrayD, Axis, Zip};
use regridder::operator::to_face_layout;
use regridder::{catalog, GridGeometry, RegridCacheStats, RegridOperator, RegridderCache};
use tracing::{debug, info, warn};

use crate::config::{ComparisonConfig, SliceKind};
use crate::normalize::{normalize, NormalizationPolicy};
use crate::result::{ComparisonReport, ComparisonResult, ComparisonSink, RunSummary, VariableFailure};
use crate::slicer::{slice_column, slice_layer};
use crate::stats::{ComparisonStats, DisplayRange, StatsInput};
use crate::varlist::common_variables;

/// Name of the dataset-embedded cell area field.
pub const AREA_FIELD: &str = "AREAM2";

/// Set once the first ref/dev units mismatch has been logged.
static UNITS_MISMATCH_REPORTED: AtomicBool = AtomicBool::new(false);

/// Which side of the comparison a dataset is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Ref,
    Dev,
}

impl Side {
    fn as_str(&self) -> &'static str {
        match self {
            Side::Ref => "ref",
            Side::Dev => "dev",
        }
    }
}

/// Area fields for one variable, overriding the dataset-level areas.
#[derive(Debug, Clone, Default)]
pub struct VariableArea {
    pub ref_area: Option<ArrayD<f64>>,
    pub dev_area: Option<ArrayD<f64>>,
}

/// Caller-supplied cell areas (m²) used instead of each dataset's `AREAM2`.
///
/// Lookup order: per-variable override, then per-dataset override, then the
/// dataset's own `AREAM2` field.
#[derive(Debug, Clone, Default)]
pub struct AreaOverrides {
    pub ref_area: Option<ArrayD<f64>>,
    pub dev_area: Option<ArrayD<f64>>,
    pub variables: HashMap<String, VariableArea>,
}

impl AreaOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these areas for every variable of the respective dataset.
    pub fn with_dataset_areas(mut self, ref_area: ArrayD<f64>, dev_area: ArrayD<f64>) -> Self {
        self.ref_area = Some(ref_area);
        self.dev_area = Some(dev_area);
        self
    }

    /// Use these areas for one variable.
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        ref_area: Option<ArrayD<f64>>,
        dev_area: Option<ArrayD<f64>>,
    ) -> Self {
        self.variables
            .insert(name.into(), VariableArea { ref_area, dev_area });
        self
    }

    fn lookup(&self, side: Side, varname: &str) -> Option<&ArrayD<f64>> {
        let per_variable = self.variables.get(varname).and_then(|v| match side {
            Side::Ref => v.ref_area.as_ref(),
            Side::Dev => v.dev_area.as_ref(),
        });
        per_variable.or(match side {
            Side::Ref => self.ref_area.as_ref(),
            Side::Dev => self.dev_area.as_ref(),
        })
    }
}

/// Grids and operators shared by every variable of a run.
struct RunPlan {
    ref_grid: GridDescriptor,
    dev_grid: GridDescriptor,
    cmp_grid: GridDescriptor,
    ref_op: Option<Arc<RegridOperator>>,
    dev_op: Option<Arc<RegridOperator>>,
    ref_geometry: Arc<GridGeometry>,
    dev_geometry: Arc<GridGeometry>,
    cmp_geometry: Arc<GridGeometry>,
}

impl RunPlan {
    fn regridded_any(&self) -> bool {
        self.ref_op.is_some() || self.dev_op.is_some()
    }

    fn grid(&self, side: Side) -> GridDescriptor {
        match side {
            Side::Ref => self.ref_grid,
            Side::Dev => self.dev_grid,
        }
    }

    fn operator(&self, side: Side) -> Option<&RegridOperator> {
        match side {
            Side::Ref => self.ref_op.as_deref(),
            Side::Dev => self.dev_op.as_deref(),
        }
    }
}

/// Compares ref and dev datasets variable by variable.
pub struct ComparisonEngine {
    config: ComparisonConfig,
    cache: RegridderCache,
}

impl ComparisonEngine {
    /// Create an engine with a regridder cache built from `config.regridder`.
    pub fn new(config: ComparisonConfig) -> BenchResult<Self> {
        let cache = RegridderCache::new(&config.regridder)?;
        Self::with_cache(config, cache)
    }

    /// Create an engine that reuses an existing regridder cache.
    pub fn with_cache(config: ComparisonConfig, cache: RegridderCache) -> BenchResult<Self> {
        config.validate().map_err(BenchError::Config)?;
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> RegridCacheStats {
        self.cache.stats()
    }

    /// Variables a run will compare: the configured list, or the common
    /// variables suited to the slice kind.
    pub fn variables(&self, ref_ds: &Dataset, dev_ds: &Dataset) -> Vec<String> {
        if let Some(list) = &self.config.variable_list {
            return list.clone();
        }
        let common = common_variables(ref_ds, dev_ds);
        match self.config.slice_kind {
            SliceKind::Level => common.all,
            SliceKind::ZonalMean => common.three_d,
        }
    }

    /// Compare every variable, handing each result to `sink` as soon as it
    /// is ready.
    ///
    /// Returns `Err` only when the run cannot start; per-variable failures
    /// are listed in the summary.
    pub fn run(
        &mut self,
        ref_ds: &Dataset,
        dev_ds: &Dataset,
        areas: &AreaOverrides,
        sink: &mut dyn ComparisonSink,
    ) -> BenchResult<RunSummary> {
        let plan = self.plan(ref_ds, dev_ds)?;
        let variables = self.variables(ref_ds, dev_ds);

        info!(
            ref_grid = %plan.ref_grid,
            dev_grid = %plan.dev_grid,
            cmp_grid = %plan.cmp_grid,
            slice = self.config.slice_kind.as_str(),
            variables = variables.len(),
            "Starting comparison run"
        );

        let mut succeeded = 0;
        let mut failures = Vec::new();
        for name in &variables {
            match self.compare_variable(&plan, name, ref_ds, dev_ds, areas) {
                Ok(result) => {
                    debug!(variable = %name, units = %result.units, "Compared variable");
                    sink.accept(result);
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(variable = %name, error = %e, "Variable comparison failed");
                    failures.push(VariableFailure {
                        name: name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = succeeded,
            failed = failures.len(),
            "Comparison run complete"
        );

        Ok(RunSummary {
            ref_grid: plan.ref_grid,
            dev_grid: plan.dev_grid,
            cmp_grid: plan.cmp_grid,
            succeeded,
            failures,
        })
    }

    /// Compare every variable and collect the results.
    pub fn compare(
        &mut self,
        ref_ds: &Dataset,
        dev_ds: &Dataset,
        areas: &AreaOverrides,
    ) -> BenchResult<ComparisonReport> {
        let mut results: Vec<ComparisonResult> = Vec::new();
        let summary = self.run(ref_ds, dev_ds, areas, &mut results)?;
        Ok(ComparisonReport {
            ref_grid: summary.ref_grid,
            dev_grid: summary.dev_grid,
            cmp_grid: summary.cmp_grid,
            results,
            failures: summary.failures,
        })
    }

    /// Compare a single variable.
    pub fn compare_one(
        &mut self,
        name: &str,
        ref_ds: &Dataset,
        dev_ds: &Dataset,
        areas: &AreaOverrides,
    ) -> BenchResult<ComparisonResult> {
        let plan = self.plan(ref_ds, dev_ds)?;
        self.compare_variable(&plan, name, ref_ds, dev_ds, areas)
    }

    fn plan(&mut self, ref_ds: &Dataset, dev_ds: &Dataset) -> BenchResult<RunPlan> {
        let ref_grid = catalog::classify_dataset(ref_ds)?;
        let dev_grid = catalog::classify_dataset(dev_ds)?;
        let cmp_grid = self.comparison_grid(&ref_grid, &dev_grid)?;

        let ref_op = self.operator(&ref_grid, &cmp_grid)?;
        let dev_op = self.operator(&dev_grid, &cmp_grid)?;

        let cmp_geometry = Arc::new(catalog::build(&cmp_grid));
        let geometry = |grid: &GridDescriptor| {
            if *grid == cmp_grid {
                Arc::clone(&cmp_geometry)
            } else {
                Arc::new(catalog::build(grid))
            }
        };

        Ok(RunPlan {
            ref_geometry: geometry(&ref_grid),
            dev_geometry: geometry(&dev_grid),
            cmp_geometry: Arc::clone(&cmp_geometry),
            ref_grid,
            dev_grid,
            cmp_grid,
            ref_op,
            dev_op,
        })
    }

    fn comparison_grid(
        &self,
        ref_grid: &GridDescriptor,
        dev_grid: &GridDescriptor,
    ) -> BenchResult<GridDescriptor> {
        let requested = self.config.comparison_resolution.as_deref();
        let grid = catalog::resolve_comparison(ref_grid, dev_grid, requested)?;

        if self.config.slice_kind == SliceKind::ZonalMean && grid.is_cubed_sphere() {
            if requested.is_some() {
                return Err(BenchError::config(format!(
                    "zonal means need a lat-lon comparison grid, got {}",
                    grid
                )));
            }
            debug!(resolved = %grid, "Zonal mean falls back to the default lat-lon grid");
            return GridDescriptor::parse(DEFAULT_MIXED_RESOLUTION);
        }
        Ok(grid)
    }

    fn operator(
        &mut self,
        native: &GridDescriptor,
        cmp: &GridDescriptor,
    ) -> BenchResult<Option<Arc<RegridOperator>>> {
        if native == cmp {
            return Ok(None);
        }
        let dir = self.config.weights_directory.as_deref();
        Ok(Some(self.cache.get(native, cmp, dir)?))
    }

    fn compare_variable(
        &self,
        plan: &RunPlan,
        name: &str,
        ref_ds: &Dataset,
        dev_ds: &Dataset,
        areas: &AreaOverrides,
    ) -> BenchResult<ComparisonResult> {
        let ref_field = ref_ds
            .get(name)
            .ok_or_else(|| BenchError::not_found(name, Side::Ref.as_str()))?;
        let dev_field = dev_ds
            .get(name)
            .ok_or_else(|| BenchError::not_found(name, Side::Dev.as_str()))?;

        if self.config.strict_dimensions && ref_field.ndim() != dev_field.ndim() {
            return Err(BenchError::dimension(
                name,
                format!(
                    "ref has {} dimensions, dev has {}",
                    ref_field.ndim(),
                    dev_field.ndim()
                ),
            ));
        }

        let units = self.check_units(ref_field, dev_field)?;

        let ref_layer = self.extract(ref_field, plan.grid(Side::Ref), self.config.flip_ref)?;
        let dev_layer = self.extract(dev_field, plan.grid(Side::Dev), self.config.flip_dev)?;

        // Normalize
        let policy = NormalizationPolicy::new(self.config.normalize_by_area, plan.regridded_any());
        let (ref_area, dev_area) = if policy.applies(name, &units) {
            (
                self.area(Side::Ref, name, ref_ds, plan, areas)?,
                self.area(Side::Dev, name, dev_ds, plan, areas)?,
            )
        } else {
            (None, None)
        };
        let ref_norm = normalize(ref_layer, ref_area.as_ref(), name, &units, policy)?;
        let dev_norm = normalize(dev_layer, dev_area.as_ref(), name, &units, policy)?;

        // Regrid
        let ref_on_cmp = regrid(plan.operator(Side::Ref), &ref_norm.data)?;
        let dev_on_cmp = regrid(plan.operator(Side::Dev), &dev_norm.data)?;

        // Reduce
        let (ref_native, dev_native, ref_on_cmp, dev_on_cmp) = match self.config.slice_kind {
            SliceKind::Level => (ref_norm.data, dev_norm.data, ref_on_cmp, dev_on_cmp),
            SliceKind::ZonalMean => {
                let ref_on_cmp = zonal_mean(name, &ref_on_cmp)?;
                let dev_on_cmp = zonal_mean(name, &dev_on_cmp)?;
                let ref_native = native_zonal_mean(name, plan.ref_grid, &ref_norm.data, &ref_on_cmp)?;
                let dev_native = native_zonal_mean(name, plan.dev_grid, &dev_norm.data, &dev_on_cmp)?;
                (ref_native, dev_native, ref_on_cmp, dev_on_cmp)
            }
        };

        if ref_on_cmp.shape() != dev_on_cmp.shape() {
            return Err(BenchError::dimension(
                name,
                format!(
                    "ref shape {:?} and dev shape {:?} differ on the comparison grid",
                    ref_on_cmp.shape(),
                    dev_on_cmp.shape()
                ),
            ));
        }

        let abs_diff = &dev_on_cmp - &ref_on_cmp;
        let frac_diff = fractional_difference(&ref_on_cmp, &dev_on_cmp);

        let stats = ComparisonStats::compute(
            StatsInput {
                ref_native: &ref_native,
                dev_native: &dev_native,
                ref_on_cmp: &ref_on_cmp,
                dev_on_cmp: &dev_on_cmp,
                abs_diff: &abs_diff,
                frac_diff: &frac_diff,
            },
            self.config.match_colorbars,
            self.config.restricted_percentiles,
            range(self.config.frac_diff_fixed_range),
            self.config.abs_diff_fixed_range.map(range),
        );

        Ok(ComparisonResult {
            name: name.to_string(),
            ref_native,
            dev_native,
            ref_on_cmp,
            dev_on_cmp,
            abs_diff,
            frac_diff,
            units: ref_norm.units,
            subtitle_extra: ref_norm.subtitle_suffix,
            layer_label: self.layer_label(ref_field, dev_field),
            ref_grid: plan.ref_grid,
            dev_grid: plan.dev_grid,
            cmp_grid: plan.cmp_grid,
            ref_geometry: Arc::clone(&plan.ref_geometry),
            dev_geometry: Arc::clone(&plan.dev_geometry),
            cmp_geometry: Arc::clone(&plan.cmp_geometry),
            regridded_any: plan.regridded_any(),
            stats,
        })
    }

    /// Units to report for a variable, applying the mismatch policy.
    fn check_units(&self, ref_field: &Field, dev_field: &Field) -> BenchResult<String> {
        let (ref_units, dev_units) = (ref_field.units(), dev_field.units());
        if ref_units != dev_units {
            if self.config.enforce_units {
                return Err(BenchError::UnitMismatch {
                    variable: ref_field.name().to_string(),
                    ref_units: ref_units.to_string(),
                    dev_units: dev_units.to_string(),
                });
            }
            if !UNITS_MISMATCH_REPORTED.swap(true, Ordering::Relaxed) {
                warn!(
                    variable = %ref_field.name(),
                    ref_units = %ref_units,
                    dev_units = %dev_units,
                    "Ref and dev units differ, using ref units"
                );
            }
        }
        Ok(ref_units.to_string())
    }

    /// Slice a field per the slice kind and put it in canonical grid layout.
    fn extract(&self, field: &Field, grid: GridDescriptor, flip: bool) -> BenchResult<ArrayD<f64>> {
        let data = match self.config.slice_kind {
            SliceKind::Level => {
                slice_layer(field, self.config.level_index, self.config.time_index, flip)?
            }
            SliceKind::ZonalMean => slice_column(field, self.config.time_index, flip)?,
        };
        in_grid_layout(field.name(), data, grid)
    }

    fn area(
        &self,
        side: Side,
        varname: &str,
        dataset: &Dataset,
        plan: &RunPlan,
        areas: &AreaOverrides,
    ) -> BenchResult<Option<ArrayD<f64>>> {
        let area = match areas.lookup(side, varname) {
            Some(area) => area.clone(),
            None => match dataset.get(AREA_FIELD) {
                Some(field) => slice_layer(field, 0, 0, false)?,
                None => return Ok(None),
            },
        };
        in_grid_layout(varname, area, plan.grid(side)).map(Some)
    }

    fn layer_label(&self, ref_field: &Field, dev_field: &Field) -> String {
        match self.config.slice_kind {
            SliceKind::ZonalMean => "Zonal Mean".to_string(),
            SliceKind::Level => {
                let has_levels = ref_field.has(bench_common::Dim::Lev)
                    && dev_field.has(bench_common::Dim::Lev);
                if !has_levels {
                    return String::new();
                }
                match self.config.level_index {
                    0 => "Surface".to_string(),
                    22 => "500 hPa".to_string(),
                    ilev => format!("Level {}", ilev - 1),
                }
            }
        }
    }
}

/// Cubed-sphere data in `(.., 6, N, N)` layout; lat-lon data unchanged.
fn in_grid_layout(name: &str, data: ArrayD<f64>, grid: GridDescriptor) -> BenchResult<ArrayD<f64>> {
    match grid {
        GridDescriptor::CubedSphere { n } => {
            to_face_layout(data, n).map_err(|e| BenchError::dimension(name, e.to_string()))
        }
        GridDescriptor::LatLon { .. } => Ok(data),
    }
}

fn regrid(op: Option<&RegridOperator>, data: &ArrayD<f64>) -> BenchResult<ArrayD<f64>> {
    match op {
        Some(op) => Ok(op.apply_layers(data.view())?),
        None => Ok(data.clone()),
    }
}

/// Mean over the trailing longitude axis, skipping NaN.
pub fn zonal_mean(name: &str, data: &ArrayD<f64>) -> BenchResult<ArrayD<f64>> {
    let ndim = data.ndim();
    if ndim < 2 || data.shape()[ndim - 1] == 0 {
        return Err(BenchError::dimension(
            name,
            format!("cannot average shape {:?} over longitude", data.shape()),
        ));
    }
    Ok(data.map_axis(Axis(ndim - 1), |lane| {
        let (sum, count) = lane
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }))
}

/// Native-grid zonal mean: averaged in place for lat-lon inputs, taken from
/// the comparison grid for cubed-sphere inputs.
fn native_zonal_mean(
    name: &str,
    grid: GridDescriptor,
    native: &ArrayD<f64>,
    on_cmp: &ArrayD<f64>,
) -> BenchResult<ArrayD<f64>> {
    if grid.is_latlon() {
        zonal_mean(name, native)
    } else {
        Ok(on_cmp.clone())
    }
}

/// `(dev - ref) / ref`, NaN where both are zero.
///
/// Where only `ref` is zero the result is an infinity.
pub fn fractional_difference(ref_data: &ArrayD<f64>, dev_data: &ArrayD<f64>) -> ArrayD<f64> {
    Zip::from(ref_data)
        .and(dev_data)
        .map_collect(|&r, &d| {
            if r == 0.0 && d == 0.0 {
                f64::NAN
            } else {
                (d - r) / r
            }
        })
}

fn range((min, max): (f64, f64)) -> DisplayRange {
    DisplayRange::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use test_utils::{create_constant_layer, create_dataset, grids};

    fn array(values: &[f64]) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap()
    }

    #[test]
    fn test_fractional_difference_conventions() {
        let r = array(&[0.0, 0.0, 5.0, 0.0, 2.0]);
        let d = array(&[0.0, 5.0, 5.0, -1.0, 3.0]);
        let frac = fractional_difference(&r, &d);
        assert!(frac[0].is_nan());
        assert_eq!(frac[1], f64::INFINITY);
        assert_eq!(frac[2], 0.0);
        assert_eq!(frac[3], f64::NEG_INFINITY);
        assert_eq!(frac[4], 0.5);
    }

    #[test]
    fn test_zonal_mean_skips_nan() {
        let data = ArrayD::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![1.0, 2.0, f64::NAN, f64::NAN, f64::NAN, f64::NAN],
        )
        .unwrap();
        let mean = zonal_mean("x", &data).unwrap();
        assert_eq!(mean.shape(), &[2]);
        assert_eq!(mean[0], 1.5);
        assert!(mean[1].is_nan());
        assert!(zonal_mean("x", &array(&[1.0])).is_err());
    }

    #[test]
    fn test_area_lookup_order() {
        let per_dataset = ArrayD::from_elem(IxDyn(&[2]), 1.0);
        let per_variable = ArrayD::from_elem(IxDyn(&[2]), 2.0);
        let areas = AreaOverrides::new()
            .with_dataset_areas(per_dataset.clone(), per_dataset.clone())
            .with_variable("EmisCO", Some(per_variable.clone()), None);

        assert_eq!(areas.lookup(Side::Ref, "EmisCO"), Some(&per_variable));
        assert_eq!(areas.lookup(Side::Dev, "EmisCO"), Some(&per_dataset));
        assert_eq!(areas.lookup(Side::Ref, "Other"), Some(&per_dataset));
        assert_eq!(AreaOverrides::new().lookup(Side::Ref, "EmisCO"), None);
    }

    #[test]
    fn test_layer_labels() {
        let mut config = ComparisonConfig::default();
        let column = test_utils::create_constant_column_field("O3", "ppb", &grids::LL_4X5, 72, 1.0);
        let layer = create_constant_layer("O3", "ppb", &grids::LL_4X5, 1.0);

        let label = |config: &ComparisonConfig, a: &Field, b: &Field| {
            ComparisonEngine::new(config.clone()).unwrap().layer_label(a, b)
        };

        assert_eq!(label(&config, &column, &column), "Surface");
        config.level_index = 22;
        assert_eq!(label(&config, &column, &column), "500 hPa");
        config.level_index = 10;
        assert_eq!(label(&config, &column, &column), "Level 9");
        assert_eq!(label(&config, &layer, &layer), "");
        config.slice_kind = SliceKind::ZonalMean;
        assert_eq!(label(&config, &column, &column), "Zonal Mean");
    }

    #[test]
    fn test_zonal_comparison_grid_falls_back_to_latlon() {
        let config = ComparisonConfig {
            slice_kind: SliceKind::ZonalMean,
            ..Default::default()
        };
        let engine = ComparisonEngine::new(config).unwrap();
        let grid = engine
            .comparison_grid(&grids::CS_C24, &grids::CS_C24)
            .unwrap();
        assert_eq!(grid, grids::LL_1X125);
    }

    #[test]
    fn test_unclassifiable_dataset_aborts_run() {
        let odd = GridDescriptor::LatLon { nlat: 10, nlon: 20 };
        let ref_ds = create_dataset([create_constant_layer("O3", "ppb", &odd, 1.0)]);
        let dev_ds = create_dataset([create_constant_layer("O3", "ppb", &grids::LL_4X5, 1.0)]);

        let mut engine = ComparisonEngine::new(ComparisonConfig::default()).unwrap();
        let err = engine
            .compare(&ref_ds, &dev_ds, &AreaOverrides::new())
            .unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedGrid { nlat: 10, nlon: 20 }));
    }
}
