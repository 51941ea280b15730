//! Horizontal grid descriptors.
//!
//! A grid is identified by its type and a resolution label. Lat-lon grids use
//! the `"<dlat>x<dlon>"` convention (`"4x5"`, `"2x2.5"`) and carry a fixed
//! `(nlat, nlon)` pair; cubed-sphere grids are identified by their face edge
//! length `N` (`"c24"`, `"c48"`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BenchError, BenchResult};

/// Recognized lat-lon resolutions: (label, nlat, nlon).
///
/// Latitude edges are half-width at the poles, so `nlat = 180 / dlat + 1`.
pub const LATLON_RESOLUTIONS: &[(&str, usize, usize)] = &[
    ("4x5", 46, 72),
    ("2x2.5", 91, 144),
    ("1x1.25", 181, 288),
    ("0.5x0.625", 361, 576),
    ("0.25x0.3125", 721, 1152),
];

/// Comparison resolution used when ref and dev grid types differ.
pub const DEFAULT_MIXED_RESOLUTION: &str = "1x1.25";

/// Number of faces on a cubed-sphere grid.
pub const CUBED_SPHERE_FACES: usize = 6;

/// Horizontal grid type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    LatLon,
    CubedSphere,
}

impl GridKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridKind::LatLon => "ll",
            GridKind::CubedSphere => "cs",
        }
    }
}

/// Identifies a horizontal grid by type and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridDescriptor {
    /// Regular global lat-lon grid with polar half-cells.
    LatLon { nlat: usize, nlon: usize },
    /// Gnomonic cubed-sphere grid with six `n x n` faces.
    CubedSphere { n: usize },
}

impl GridDescriptor {
    /// Look up a lat-lon grid from the recognized resolution table.
    pub fn latlon_from_table(nlat: usize, nlon: usize) -> Option<Self> {
        LATLON_RESOLUTIONS
            .iter()
            .find(|(_, la, lo)| *la == nlat && *lo == nlon)
            .map(|_| GridDescriptor::LatLon { nlat, nlon })
    }

    /// Parse a resolution string.
    ///
    /// Strings containing `x` are lat-lon (`"2x2.5"`); anything else is a
    /// cubed-sphere face size (`"48"`, `"c48"`, `"C48"`).
    pub fn parse(resolution: &str) -> BenchResult<Self> {
        let s = resolution.trim();
        if s.contains('x') {
            Self::parse_latlon(s)
        } else {
            Self::parse_cubed_sphere(s)
        }
    }

    fn parse_latlon(s: &str) -> BenchResult<Self> {
        let invalid = || BenchError::InvalidResolution(s.to_string());
        let (lat, lon) = s.split_once('x').ok_or_else(invalid)?;
        let dlat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let dlon: f64 = lon.trim().parse().map_err(|_| invalid())?;
        if !(dlat > 0.0 && dlon > 0.0) {
            return Err(invalid());
        }

        let nlat_f = 180.0 / dlat + 1.0;
        let nlon_f = 360.0 / dlon;
        if (nlat_f - nlat_f.round()).abs() > 1e-9 || (nlon_f - nlon_f.round()).abs() > 1e-9 {
            return Err(invalid());
        }

        Ok(GridDescriptor::LatLon {
            nlat: nlat_f.round() as usize,
            nlon: nlon_f.round() as usize,
        })
    }

    fn parse_cubed_sphere(s: &str) -> BenchResult<Self> {
        let digits = s.trim_start_matches(['c', 'C']);
        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(GridDescriptor::CubedSphere { n }),
            _ => Err(BenchError::InvalidResolution(s.to_string())),
        }
    }

    pub fn kind(&self) -> GridKind {
        match self {
            GridDescriptor::LatLon { .. } => GridKind::LatLon,
            GridDescriptor::CubedSphere { .. } => GridKind::CubedSphere,
        }
    }

    pub fn is_latlon(&self) -> bool {
        self.kind() == GridKind::LatLon
    }

    pub fn is_cubed_sphere(&self) -> bool {
        self.kind() == GridKind::CubedSphere
    }

    /// Resolution label, e.g. `"4x5"` or `"c24"`.
    pub fn label(&self) -> String {
        match self {
            GridDescriptor::LatLon { .. } => {
                let (dlat, dlon) = self.spacing_degrees();
                format!("{}x{}", dlat, dlon)
            }
            GridDescriptor::CubedSphere { n } => format!("c{}", n),
        }
    }

    /// Nominal cell spacing in degrees (dlat, dlon).
    ///
    /// For cubed-sphere grids this is the equatorial spacing `90 / N`.
    pub fn spacing_degrees(&self) -> (f64, f64) {
        match *self {
            GridDescriptor::LatLon { nlat, nlon } => {
                (180.0 / (nlat.max(2) - 1) as f64, 360.0 / nlon.max(1) as f64)
            }
            GridDescriptor::CubedSphere { n } => {
                let d = 90.0 / n.max(1) as f64;
                (d, d)
            }
        }
    }

    /// Shape of a single horizontal layer in its canonical form:
    /// `[nlat, nlon]` or `[6, n, n]`.
    pub fn layer_shape(&self) -> Vec<usize> {
        match *self {
            GridDescriptor::LatLon { nlat, nlon } => vec![nlat, nlon],
            GridDescriptor::CubedSphere { n } => vec![CUBED_SPHERE_FACES, n, n],
        }
    }

    /// Stacked `(nlat, nlon)` shape as stored in files (`6N x N` for cubed-sphere).
    pub fn stacked_shape(&self) -> (usize, usize) {
        match *self {
            GridDescriptor::LatLon { nlat, nlon } => (nlat, nlon),
            GridDescriptor::CubedSphere { n } => (CUBED_SPHERE_FACES * n, n),
        }
    }

    /// Total number of horizontal cells.
    pub fn cell_count(&self) -> usize {
        let (a, b) = self.stacked_shape();
        a * b
    }
}

impl fmt::Display for GridDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_labels_round_trip() {
        for (label, nlat, nlon) in LATLON_RESOLUTIONS {
            let grid = GridDescriptor::latlon_from_table(*nlat, *nlon).unwrap();
            assert_eq!(grid.label(), *label);
            assert_eq!(GridDescriptor::parse(label).unwrap(), grid);
        }
    }

    #[test]
    fn test_parse_cubed_sphere_variants() {
        for s in ["48", "c48", "C48", " c48 "] {
            assert_eq!(
                GridDescriptor::parse(s).unwrap(),
                GridDescriptor::CubedSphere { n: 48 }
            );
        }
        assert!(GridDescriptor::parse("c0").is_err());
        assert!(GridDescriptor::parse("cfoo").is_err());
    }

    #[test]
    fn test_parse_latlon_rejects_non_global() {
        assert!(GridDescriptor::parse("7x5").is_err());
        assert!(GridDescriptor::parse("4x7").is_err());
        assert!(GridDescriptor::parse("0x5").is_err());
        assert!(GridDescriptor::parse("axb").is_err());
    }

    #[test]
    fn test_shapes() {
        let cs = GridDescriptor::CubedSphere { n: 24 };
        assert_eq!(cs.layer_shape(), vec![6, 24, 24]);
        assert_eq!(cs.stacked_shape(), (144, 24));
        assert_eq!(cs.cell_count(), 3456);
        assert_eq!(cs.label(), "c24");

        let ll = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        assert_eq!(ll.layer_shape(), vec![46, 72]);
        assert_eq!(ll.spacing_degrees(), (4.0, 5.0));
    }
}
