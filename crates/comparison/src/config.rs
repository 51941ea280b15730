//! Configuration for comparison runs.

use std::fs;
use std::path::{Path, PathBuf};

use bench_common::{BenchError, BenchResult, GridDescriptor};
use regridder::RegridderConfig;
use serde::{Deserialize, Serialize};

/// How a field is reduced to the arrays being compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceKind {
    /// A single horizontal layer at `level_index`.
    #[default]
    Level,
    /// Longitude average of every level, giving `(lev, lat)` profiles.
    ZonalMean,
}

impl SliceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SliceKind::Level => "level",
            SliceKind::ZonalMean => "zonal_mean",
        }
    }
}

/// Configuration for a ref-vs-dev comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Variables to compare. `None` uses the variables common to both
    /// datasets.
    pub variable_list: Option<Vec<String>>,

    /// Vertical level to compare for [`SliceKind::Level`].
    pub level_index: usize,

    /// Time step to compare.
    pub time_index: usize,

    /// Explicit comparison grid resolution (`"2x2.5"`, `"c48"`).
    pub comparison_resolution: Option<String>,

    /// Share one display range between the ref and dev value panels.
    pub match_colorbars: bool,

    /// Normalize every eligible variable by cell area.
    pub normalize_by_area: bool,

    /// Fail a variable whose ref and dev units differ.
    pub enforce_units: bool,

    /// Read ref levels in reverse vertical order.
    pub flip_ref: bool,

    /// Read dev levels in reverse vertical order.
    pub flip_dev: bool,

    /// Directory holding persisted regridding weights.
    pub weights_directory: Option<PathBuf>,

    pub slice_kind: SliceKind,

    /// Fail a variable whose ref and dev dimensionality differ.
    pub strict_dimensions: bool,

    /// Fixed display range for fractional differences.
    pub frac_diff_fixed_range: (f64, f64),

    /// Fixed display range for absolute differences. `None` reuses the
    /// dynamic range.
    pub abs_diff_fixed_range: Option<(f64, f64)>,

    /// Percentiles bounding the restricted difference range.
    pub restricted_percentiles: (f64, f64),

    pub regridder: RegridderConfig,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            variable_list: None,
            level_index: 0,
            time_index: 0,
            comparison_resolution: None,
            match_colorbars: true,
            normalize_by_area: false,
            enforce_units: false,
            flip_ref: false,
            flip_dev: false,
            weights_directory: None,
            slice_kind: SliceKind::Level,
            strict_dimensions: false,
            frac_diff_fixed_range: (-2.0, 2.0),
            abs_diff_fixed_range: None,
            restricted_percentiles: (5.0, 95.0),
            regridder: RegridderConfig::default(),
        }
    }
}

impl ComparisonConfig {
    /// Parse configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> BenchResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BenchError::config(format!("invalid comparison config: {}", e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> BenchResult<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            BenchError::config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            regridder: RegridderConfig::from_env(),
            ..Self::default()
        };
        config.apply_env();
        config
    }

    /// Override fields from `BENCH_*` environment variables.
    ///
    /// Regridder settings are left alone; see [`RegridderConfig::from_env`].
    pub fn apply_env(&mut self) {
        let flag = |val: String| val.to_lowercase() == "true" || val == "1";

        if let Ok(val) = std::env::var("BENCH_VARIABLES") {
            let names: Vec<String> = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !names.is_empty() {
                self.variable_list = Some(names);
            }
        }

        if let Ok(val) = std::env::var("BENCH_LEVEL_INDEX") {
            if let Ok(idx) = val.parse() {
                self.level_index = idx;
            }
        }

        if let Ok(val) = std::env::var("BENCH_TIME_INDEX") {
            if let Ok(idx) = val.parse() {
                self.time_index = idx;
            }
        }

        if let Ok(val) = std::env::var("BENCH_CMP_RES") {
            self.comparison_resolution = Some(val);
        }

        if let Ok(val) = std::env::var("BENCH_MATCH_COLORBARS") {
            self.match_colorbars = flag(val);
        }

        if let Ok(val) = std::env::var("BENCH_NORMALIZE_BY_AREA") {
            self.normalize_by_area = flag(val);
        }

        if let Ok(val) = std::env::var("BENCH_ENFORCE_UNITS") {
            self.enforce_units = flag(val);
        }

        if let Ok(val) = std::env::var("BENCH_FLIP_REF") {
            self.flip_ref = flag(val);
        }

        if let Ok(val) = std::env::var("BENCH_FLIP_DEV") {
            self.flip_dev = flag(val);
        }

        if let Ok(val) = std::env::var("BENCH_WEIGHTS_DIR") {
            self.weights_directory = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("BENCH_SLICE_KIND") {
            match val.to_lowercase().as_str() {
                "level" => self.slice_kind = SliceKind::Level,
                "zonal_mean" | "zonal" => self.slice_kind = SliceKind::ZonalMean,
                _ => {}
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        let (lo, hi) = self.restricted_percentiles;
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return Err("restricted_percentiles must satisfy 0 <= low < high <= 100".to_string());
        }

        let ranges = std::iter::once(("frac_diff_fixed_range", self.frac_diff_fixed_range))
            .chain(self.abs_diff_fixed_range.map(|r| ("abs_diff_fixed_range", r)));
        for (name, (min, max)) in ranges {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(format!("{} must be a finite (min, max) pair", name));
            }
        }

        if let Some(res) = &self.comparison_resolution {
            let grid = GridDescriptor::parse(res).map_err(|e| e.to_string())?;
            if self.slice_kind == SliceKind::ZonalMean && grid.is_cubed_sphere() {
                return Err(format!(
                    "zonal means need a lat-lon comparison grid, got '{}'",
                    res
                ));
            }
        }

        if let Some(vars) = &self.variable_list {
            if vars.is_empty() {
                return Err("variable_list must not be empty when given".to_string());
            }
        }

        self.regridder.validate()
    }
}
