//! Grid classification and comparison-grid selection.

use bench_common::{BenchError, BenchResult, Dataset, GridDescriptor, DEFAULT_MIXED_RESOLUTION};
use tracing::debug;

use crate::geometry::GridGeometry;

/// Classify a horizontal grid from its stacked `(nlat, nlon)` shape.
///
/// Shapes from the lat-lon resolution table map to that resolution; shapes
/// with `nlat == 6 * nlon` are cubed-sphere grids of face size `nlon`.
/// Anything else is rejected.
pub fn classify(nlat: usize, nlon: usize) -> BenchResult<GridDescriptor> {
    if let Some(grid) = GridDescriptor::latlon_from_table(nlat, nlon) {
        return Ok(grid);
    }
    if nlon > 0 && nlat == 6 * nlon {
        return Ok(GridDescriptor::CubedSphere { n: nlon });
    }
    Err(BenchError::UnsupportedGrid { nlat, nlon })
}

/// Classify the grid of a dataset from its first horizontal field.
pub fn classify_dataset(dataset: &Dataset) -> BenchResult<GridDescriptor> {
    let (nlat, nlon) = dataset
        .horizontal_shape()
        .ok_or_else(|| BenchError::config("dataset has no field with horizontal axes"))?;
    classify(nlat, nlon)
}

/// Choose the grid on which ref and dev are compared.
///
/// An explicit `requested` resolution is used as given. Otherwise:
/// matching lat-lon grids are kept, differing lat-lon grids use the coarser,
/// two cubed-sphere grids use the finer, and mixed grid types use
/// [`DEFAULT_MIXED_RESOLUTION`].
pub fn resolve_comparison(
    ref_grid: &GridDescriptor,
    dev_grid: &GridDescriptor,
    requested: Option<&str>,
) -> BenchResult<GridDescriptor> {
    if let Some(res) = requested {
        return GridDescriptor::parse(res);
    }

    let resolved = match (*ref_grid, *dev_grid) {
        (GridDescriptor::LatLon { .. }, GridDescriptor::LatLon { .. }) => {
            if ref_grid.cell_count() <= dev_grid.cell_count() {
                *ref_grid
            } else {
                *dev_grid
            }
        }
        (GridDescriptor::CubedSphere { n: a }, GridDescriptor::CubedSphere { n: b }) => {
            GridDescriptor::CubedSphere { n: a.max(b) }
        }
        _ => GridDescriptor::parse(DEFAULT_MIXED_RESOLUTION)?,
    };

    debug!(ref_grid = %ref_grid, dev_grid = %dev_grid, cmp_grid = %resolved, "Resolved comparison grid");
    Ok(resolved)
}

/// Build centre/boundary coordinates and cell areas for a grid.
pub fn build(grid: &GridDescriptor) -> GridGeometry {
    GridGeometry::build(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_common::LATLON_RESOLUTIONS;

    #[test]
    fn test_classify_table() {
        for (label, nlat, nlon) in LATLON_RESOLUTIONS {
            let grid = classify(*nlat, *nlon).unwrap();
            assert!(grid.is_latlon());
            assert_eq!(grid.label(), *label);
        }
    }

    #[test]
    fn test_classify_cubed_sphere() {
        for n in [6, 24, 48, 90, 180, 360] {
            assert_eq!(classify(6 * n, n).unwrap(), GridDescriptor::CubedSphere { n });
        }
    }

    #[test]
    fn test_classify_rejects_unknown() {
        for (nlat, nlon) in [(45, 72), (46, 73), (180, 360), (0, 0), (143, 24)] {
            assert!(matches!(
                classify(nlat, nlon),
                Err(BenchError::UnsupportedGrid { .. })
            ));
        }
    }

    #[test]
    fn test_resolve_latlon_pairs() {
        let c4x5 = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        let c2x25 = GridDescriptor::LatLon { nlat: 91, nlon: 144 };
        assert_eq!(resolve_comparison(&c4x5, &c2x25, None).unwrap(), c4x5);
        assert_eq!(resolve_comparison(&c2x25, &c4x5, None).unwrap(), c4x5);
        assert_eq!(resolve_comparison(&c2x25, &c2x25, None).unwrap(), c2x25);
    }

    #[test]
    fn test_resolve_cubed_sphere_and_mixed() {
        let c24 = GridDescriptor::CubedSphere { n: 24 };
        let c48 = GridDescriptor::CubedSphere { n: 48 };
        let ll = GridDescriptor::LatLon { nlat: 46, nlon: 72 };

        assert_eq!(resolve_comparison(&c24, &c48, None).unwrap(), c48);
        assert_eq!(resolve_comparison(&c48, &c24, None).unwrap(), c48);
        assert_eq!(
            resolve_comparison(&ll, &c24, None).unwrap(),
            GridDescriptor::LatLon { nlat: 181, nlon: 288 }
        );
    }

    #[test]
    fn test_resolve_requested() {
        let ll = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        assert_eq!(
            resolve_comparison(&ll, &ll, Some("2x2.5")).unwrap(),
            GridDescriptor::LatLon { nlat: 91, nlon: 144 }
        );
        assert_eq!(
            resolve_comparison(&ll, &ll, Some("C90")).unwrap(),
            GridDescriptor::CubedSphere { n: 90 }
        );
        assert!(resolve_comparison(&ll, &ll, Some("3x7")).is_err());
    }
}
