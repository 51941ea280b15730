//! Conservative weight generation.
//!
//! Lat-lon to lat-lon weights are exact area overlaps: each target cell
//! receives the fraction of its area covered by every source cell, computed
//! separably in `sin(lat)` and longitude.
//!
//! Cubed-sphere to lat-lon weights are area overlaps estimated by equal-area
//! sub-sampling of each target cell: `k x k` points spaced uniformly in
//! `sin(lat)` and longitude are located on the cubed sphere and each
//! contributes `1 / k²` to the source cell containing it.
//!
//! In both cases every target row sums to one, so a constant field is
//! reproduced exactly up to rounding.

use bench_common::grid::CUBED_SPHERE_FACES;
use bench_common::GridDescriptor;
use rayon::prelude::*;
use tracing::debug;

use crate::cubed_sphere;
use crate::error::{RegridError, Result};
use crate::geometry::LatLonGeometry;
use crate::weights::SparseWeights;

const MIN_SAMPLES: usize = 2;
const MAX_SAMPLES: usize = 16;

/// Produces per-face sparse weights for a supported grid pair.
pub trait WeightGenerator: Send + Sync {
    /// Generate weights mapping `source` onto `target`.
    ///
    /// Returns one matrix for lat-lon sources and six (indexed by face)
    /// for cubed-sphere sources.
    fn generate(&self, source: &GridDescriptor, target: &GridDescriptor)
        -> Result<Vec<SparseWeights>>;
}

/// Built-in first-order conservative weight generator.
#[derive(Debug, Clone, Default)]
pub struct ConservativeGenerator {
    samples_per_cell: Option<usize>,
}

impl ConservativeGenerator {
    pub fn new(samples_per_cell: Option<usize>) -> Self {
        Self { samples_per_cell }
    }

    /// Sub-samples per target cell edge for a cubed-sphere source.
    fn samples_for(&self, n: usize, target: &GridDescriptor) -> usize {
        if let Some(k) = self.samples_per_cell {
            return k.max(1);
        }
        let src_spacing = 90.0 / n as f64;
        let (dlat, dlon) = target.spacing_degrees();
        let k = (2.0 * dlat.max(dlon) / src_spacing).ceil() as usize;
        k.clamp(MIN_SAMPLES, MAX_SAMPLES)
    }
}

impl WeightGenerator for ConservativeGenerator {
    fn generate(
        &self,
        source: &GridDescriptor,
        target: &GridDescriptor,
    ) -> Result<Vec<SparseWeights>> {
        match (*source, *target) {
            (
                GridDescriptor::LatLon { nlat: snlat, nlon: snlon },
                GridDescriptor::LatLon { nlat, nlon },
            ) => Ok(vec![latlon_to_latlon(
                &LatLonGeometry::new(snlat, snlon),
                &LatLonGeometry::new(nlat, nlon),
            )]),
            (GridDescriptor::CubedSphere { n }, GridDescriptor::LatLon { nlat, nlon }) => {
                let k = self.samples_for(n, target);
                debug!(source = %source, target = %target, samples = k, "Sampling cubed-sphere overlaps");
                Ok(cubed_sphere_to_latlon(n, &LatLonGeometry::new(nlat, nlon), k))
            }
            _ => Err(RegridError::unsupported(source.label(), target.label())),
        }
    }
}

/// Overlap length of two longitude intervals on a 360-degree circle.
fn lon_overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    [-360.0, 0.0, 360.0]
        .iter()
        .map(|shift| (a1.min(b1 + shift) - a0.max(b0 + shift)).max(0.0))
        .sum()
}

/// For each target interval, the (source index, covered fraction) pairs.
fn overlap_fractions<F>(dst_edges: &[f64], src_edges: &[f64], overlap: F) -> Vec<Vec<(usize, f64)>>
where
    F: Fn(f64, f64, f64, f64) -> f64,
{
    (0..dst_edges.len() - 1)
        .map(|d| {
            let (d0, d1) = (dst_edges[d], dst_edges[d + 1]);
            let width = d1 - d0;
            (0..src_edges.len() - 1)
                .filter_map(|s| {
                    let o = overlap(d0, d1, src_edges[s], src_edges[s + 1]);
                    (o > 0.0 && width > 0.0).then(|| (s, o / width))
                })
                .collect()
        })
        .collect()
}

fn latlon_to_latlon(src: &LatLonGeometry, dst: &LatLonGeometry) -> SparseWeights {
    let sin_edges = |g: &LatLonGeometry| -> Vec<f64> {
        g.lat_b.iter().map(|lat| lat.to_radians().sin()).collect()
    };
    let lat_frac = overlap_fractions(&sin_edges(dst), &sin_edges(src), |a0, a1, b0, b1| {
        (a1.min(b1) - a0.max(b0)).max(0.0)
    });
    let lon_frac = overlap_fractions(&dst.lon_b.to_vec(), &src.lon_b.to_vec(), lon_overlap);

    let (snlon, nlon) = (src.nlon(), dst.nlon());
    let mut weights = SparseWeights::new(src.nlat() * snlon, dst.nlat() * nlon);
    for (j, lat_row) in lat_frac.iter().enumerate() {
        for (i, lon_row) in lon_frac.iter().enumerate() {
            for &(sj, fa) in lat_row {
                for &(si, fb) in lon_row {
                    weights.push(j * nlon + i, sj * snlon + si, fa * fb);
                }
            }
        }
    }
    weights
}

fn cubed_sphere_to_latlon(n: usize, dst: &LatLonGeometry, k: usize) -> Vec<SparseWeights> {
    let (nlat, nlon) = (dst.nlat(), dst.nlon());
    let share = 1.0 / (k * k) as f64;

    // (dst cell, face, src cell, sample count) per latitude row
    let rows: Vec<Vec<(usize, usize, usize, u32)>> = (0..nlat)
        .into_par_iter()
        .map(|j| {
            let s0 = dst.lat_b[j].to_radians().sin();
            let s1 = dst.lat_b[j + 1].to_radians().sin();
            let mut row: Vec<(usize, usize, usize, u32)> = Vec::new();
            for i in 0..nlon {
                let (l0, l1) = (dst.lon_b[i], dst.lon_b[i + 1]);
                let start = row.len();
                for m in 0..k {
                    let s = s0 + (m as f64 + 0.5) / k as f64 * (s1 - s0);
                    let lat = s.clamp(-1.0, 1.0).asin().to_degrees();
                    for q in 0..k {
                        let lon = l0 + (q as f64 + 0.5) / k as f64 * (l1 - l0);
                        let (face, r, c) = cubed_sphere::locate(lat, lon, n);
                        let cell = r * n + c;
                        match row[start..]
                            .iter_mut()
                            .find(|hit| hit.1 == face && hit.2 == cell)
                        {
                            Some(hit) => hit.3 += 1,
                            None => row.push((j * nlon + i, face, cell, 1)),
                        }
                    }
                }
            }
            row
        })
        .collect();

    let mut faces: Vec<SparseWeights> = (0..CUBED_SPHERE_FACES)
        .map(|_| SparseWeights::new(n * n, nlat * nlon))
        .collect();
    for (dst_cell, face, cell, count) in rows.into_iter().flatten() {
        faces[face].push(dst_cell, cell, count as f64 * share);
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rows_sum_to_one(faces: &[SparseWeights]) {
        let n_dst = faces[0].n_dst();
        let mut sums = vec![0.0; n_dst];
        for face in faces {
            for (s, r) in sums.iter_mut().zip(face.row_sums()) {
                *s += r;
            }
        }
        for (cell, s) in sums.iter().enumerate() {
            assert!((s - 1.0).abs() < 1e-10, "row {} sums to {}", cell, s);
        }
    }

    #[test]
    fn test_lon_overlap_wraps() {
        assert_eq!(lon_overlap(-182.5, -177.5, 175.0, 180.0), 2.5);
        assert_eq!(lon_overlap(0.0, 5.0, 10.0, 20.0), 0.0);
        assert_eq!(lon_overlap(0.0, 5.0, 2.5, 7.5), 2.5);
    }

    #[test]
    fn test_latlon_rows_sum_to_one() {
        let generator = ConservativeGenerator::default();
        let faces = generator
            .generate(
                &GridDescriptor::LatLon { nlat: 91, nlon: 144 },
                &GridDescriptor::LatLon { nlat: 46, nlon: 72 },
            )
            .unwrap();
        assert_eq!(faces.len(), 1);
        assert_rows_sum_to_one(&faces);
    }

    #[test]
    fn test_same_grid_is_identity() {
        let grid = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        let faces = ConservativeGenerator::default().generate(&grid, &grid).unwrap();
        let w = &faces[0];
        assert_eq!(w.nnz(), grid.cell_count());

        let src: Vec<f64> = (0..grid.cell_count()).map(|v| v as f64).collect();
        let mut dst = vec![0.0; grid.cell_count()];
        w.apply_into(&src, &mut dst).unwrap();
        for (a, b) in src.iter().zip(&dst) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cubed_sphere_rows_sum_to_one() {
        let faces = ConservativeGenerator::default()
            .generate(
                &GridDescriptor::CubedSphere { n: 12 },
                &GridDescriptor::LatLon { nlat: 46, nlon: 72 },
            )
            .unwrap();
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.nnz() > 0));
        assert_rows_sum_to_one(&faces);
    }

    #[test]
    fn test_unsupported_directions() {
        let generator = ConservativeGenerator::default();
        let ll = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        let cs = GridDescriptor::CubedSphere { n: 24 };
        assert!(matches!(
            generator.generate(&ll, &cs),
            Err(RegridError::UnsupportedDirection { .. })
        ));
        assert!(generator
            .generate(&cs, &GridDescriptor::CubedSphere { n: 48 })
            .is_err());
    }

    #[test]
    fn test_sample_count_scales_with_resolution() {
        let generator = ConservativeGenerator::default();
        let ll = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
        assert_eq!(generator.samples_for(24, &ll), 3);
        assert_eq!(generator.samples_for(360, &ll), MAX_SAMPLES);
        assert_eq!(ConservativeGenerator::new(Some(5)).samples_for(24, &ll), 5);
    }
}
