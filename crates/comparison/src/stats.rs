//! Display-range statistics for comparison panels.
//!
//! All ranges skip non-finite values. An array with no finite values, or
//! with only zeros, yields the `[0, 0]` range, so an all-zero difference is
//! always renderable.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// A closed `[min, max]` display range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl DisplayRange {
    pub const ZERO: DisplayRange = DisplayRange { min: 0.0, max: 0.0 };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Min and max over the finite values of `values`.
    pub fn of<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let mut range: Option<DisplayRange> = None;
        for &v in values.into_iter().filter(|v| v.is_finite()) {
            range = Some(match range {
                Some(r) => DisplayRange::new(r.min.min(v), r.max.max(v)),
                None => DisplayRange::new(v, v),
            });
        }
        range.unwrap_or(Self::ZERO)
    }

    /// Smallest range covering both.
    pub fn union(self, other: DisplayRange) -> Self {
        DisplayRange::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Range symmetric about zero with the same largest magnitude.
    pub fn symmetric(self) -> Self {
        let m = self.min.abs().max(self.max.abs());
        DisplayRange::new(-m, m)
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Percentile of sorted finite values using linear interpolation between
/// closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// The three display ranges reported for a difference panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffRanges {
    /// Symmetric range over the largest finite magnitude.
    pub dynamic: DisplayRange,
    /// Symmetric range over the larger magnitude of the two percentiles.
    pub restricted: DisplayRange,
    /// Caller-configured range.
    pub fixed: DisplayRange,
}

impl DiffRanges {
    /// Compute ranges for a difference array.
    ///
    /// `fixed` of `None` reports the dynamic range as the fixed range.
    pub fn compute(data: &ArrayD<f64>, percentiles: (f64, f64), fixed: Option<DisplayRange>) -> Self {
        let mut finite: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(|a, b| a.total_cmp(b));

        let dynamic = match (finite.first(), finite.last()) {
            (Some(&min), Some(&max)) => DisplayRange::new(min, max).symmetric(),
            _ => DisplayRange::ZERO,
        };
        let restricted = DisplayRange::new(
            percentile(&finite, percentiles.0),
            percentile(&finite, percentiles.1),
        )
        .symmetric();

        Self {
            dynamic,
            restricted,
            fixed: fixed.unwrap_or(dynamic),
        }
    }
}

/// Display statistics for one compared variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub ref_native: DisplayRange,
    pub dev_native: DisplayRange,
    pub ref_on_cmp: DisplayRange,
    pub dev_on_cmp: DisplayRange,
    /// Range covering all four value arrays.
    pub matched: DisplayRange,
    /// Range to use for the ref value panel.
    pub ref_display: DisplayRange,
    /// Range to use for the dev value panel.
    pub dev_display: DisplayRange,
    pub abs_diff: DiffRanges,
    pub frac_diff: DiffRanges,
    /// Every absolute difference is exactly zero.
    pub identical: bool,
}

/// Inputs for [`ComparisonStats::compute`].
pub struct StatsInput<'a> {
    pub ref_native: &'a ArrayD<f64>,
    pub dev_native: &'a ArrayD<f64>,
    pub ref_on_cmp: &'a ArrayD<f64>,
    pub dev_on_cmp: &'a ArrayD<f64>,
    pub abs_diff: &'a ArrayD<f64>,
    pub frac_diff: &'a ArrayD<f64>,
}

impl ComparisonStats {
    pub fn compute(
        input: StatsInput<'_>,
        match_colorbars: bool,
        percentiles: (f64, f64),
        frac_fixed: DisplayRange,
        abs_fixed: Option<DisplayRange>,
    ) -> Self {
        let ref_native = DisplayRange::of(input.ref_native);
        let dev_native = DisplayRange::of(input.dev_native);
        let ref_on_cmp = DisplayRange::of(input.ref_on_cmp);
        let dev_on_cmp = DisplayRange::of(input.dev_on_cmp);
        let matched = ref_native.union(dev_native).union(ref_on_cmp).union(dev_on_cmp);

        let (ref_display, dev_display) = if match_colorbars {
            (matched, matched)
        } else {
            (ref_native, dev_native)
        };

        Self {
            ref_native,
            dev_native,
            ref_on_cmp,
            dev_on_cmp,
            matched,
            ref_display,
            dev_display,
            abs_diff: DiffRanges::compute(input.abs_diff, percentiles, abs_fixed),
            frac_diff: DiffRanges::compute(input.frac_diff, percentiles, Some(frac_fixed)),
            identical: input.abs_diff.iter().all(|v| *v == 0.0),
        }
    }
}
