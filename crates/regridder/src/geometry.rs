//! Grid geometry: cell centres, cell boundaries and cell areas.

use bench_common::grid::CUBED_SPHERE_FACES;
use bench_common::GridDescriptor;
use ndarray::{Array1, Array3, ArrayD, IxDyn};

use crate::cubed_sphere;

/// Earth radius used for cell areas, in metres.
pub const EARTH_RADIUS_M: f64 = 6.375e6;

/// Half-width in degrees of the band around 180E that renderers mask on
/// cubed-sphere plots.
pub const SEAM_HALF_WIDTH_DEG: f64 = 2.0;

/// Geometry of a regular global lat-lon grid.
///
/// Latitude edges are clipped to +/-90 so the polar rows are half cells.
/// Longitude edges start at `-180 - dlon/2`, putting a cell centre on 180W.
#[derive(Debug, Clone)]
pub struct LatLonGeometry {
    pub lat: Array1<f64>,
    pub lon: Array1<f64>,
    pub lat_b: Array1<f64>,
    pub lon_b: Array1<f64>,
}

impl LatLonGeometry {
    pub fn new(nlat: usize, nlon: usize) -> Self {
        let dlat = 180.0 / (nlat - 1) as f64;
        let dlon = 360.0 / nlon as f64;

        let lat_b = Array1::from_iter(
            (0..=nlat).map(|j| (-90.0 - dlat / 2.0 + j as f64 * dlat).clamp(-90.0, 90.0)),
        );
        let lon_b = Array1::from_iter((0..=nlon).map(|i| -180.0 - dlon / 2.0 + i as f64 * dlon));
        let lat = Array1::from_iter((0..nlat).map(|j| (lat_b[j] + lat_b[j + 1]) / 2.0));
        let lon = Array1::from_iter((0..nlon).map(|i| (lon_b[i] + lon_b[i + 1]) / 2.0));

        Self { lat, lon, lat_b, lon_b }
    }

    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    pub fn nlon(&self) -> usize {
        self.lon.len()
    }

    /// Plot extent `(min_lon, max_lon, min_lat, max_lat)` from the cell edges.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let (nlon, nlat) = (self.nlon(), self.nlat());
        (self.lon_b[0], self.lon_b[nlon], self.lat_b[0], self.lat_b[nlat])
    }

    /// Cell areas in m², shape `(nlat, nlon)`.
    pub fn cell_areas(&self) -> ArrayD<f64> {
        let (nlat, nlon) = (self.nlat(), self.nlon());
        let mut areas = ArrayD::zeros(IxDyn(&[nlat, nlon]));
        for j in 0..nlat {
            let band = self.lat_b[j + 1].to_radians().sin() - self.lat_b[j].to_radians().sin();
            for i in 0..nlon {
                let dlon = (self.lon_b[i + 1] - self.lon_b[i]).to_radians();
                areas[[j, i]] = EARTH_RADIUS_M * EARTH_RADIUS_M * dlon * band;
            }
        }
        areas
    }
}

/// Geometry of a gnomonic cubed-sphere grid.
///
/// Centres are `(6, N, N)` and boundaries `(6, N+1, N+1)`, indexed
/// `[face, row, col]`. Longitudes are in `[0, 360)`.
#[derive(Debug, Clone)]
pub struct CubedSphereGeometry {
    pub n: usize,
    pub lat: Array3<f64>,
    pub lon: Array3<f64>,
    pub lat_b: Array3<f64>,
    pub lon_b: Array3<f64>,
}

impl CubedSphereGeometry {
    pub fn new(n: usize) -> Self {
        let mut lat = Array3::zeros((CUBED_SPHERE_FACES, n, n));
        let mut lon = Array3::zeros((CUBED_SPHERE_FACES, n, n));
        let mut lat_b = Array3::zeros((CUBED_SPHERE_FACES, n + 1, n + 1));
        let mut lon_b = Array3::zeros((CUBED_SPHERE_FACES, n + 1, n + 1));

        for f in 0..CUBED_SPHERE_FACES {
            for j in 0..n {
                for i in 0..n {
                    let (la, lo) = cubed_sphere::face_to_geo(
                        f,
                        cubed_sphere::center_angle(i, n),
                        cubed_sphere::center_angle(j, n),
                    );
                    lat[[f, j, i]] = la;
                    lon[[f, j, i]] = lo;
                }
            }
            for j in 0..=n {
                for i in 0..=n {
                    let (la, lo) = cubed_sphere::face_to_geo(
                        f,
                        cubed_sphere::edge_angle(i, n),
                        cubed_sphere::edge_angle(j, n),
                    );
                    lat_b[[f, j, i]] = la;
                    lon_b[[f, j, i]] = lo;
                }
            }
        }

        Self { n, lat, lon, lat_b, lon_b }
    }

    /// Cell areas in m², shape `(6, N, N)`.
    pub fn cell_areas(&self) -> ArrayD<f64> {
        let n = self.n;
        let mut areas = ArrayD::zeros(IxDyn(&[CUBED_SPHERE_FACES, n, n]));
        for f in 0..CUBED_SPHERE_FACES {
            for j in 0..n {
                for i in 0..n {
                    areas[[f, j, i]] = EARTH_RADIUS_M
                        * EARTH_RADIUS_M
                        * cubed_sphere::unit_area(
                            cubed_sphere::edge_angle(i, n),
                            cubed_sphere::edge_angle(i + 1, n),
                            cubed_sphere::edge_angle(j, n),
                            cubed_sphere::edge_angle(j + 1, n),
                        );
                }
            }
        }
        areas
    }
}

/// Geometry for either grid type.
#[derive(Debug, Clone)]
pub enum GridGeometry {
    LatLon(LatLonGeometry),
    CubedSphere(CubedSphereGeometry),
}

impl GridGeometry {
    /// Build the geometry for a grid descriptor.
    pub fn build(grid: &GridDescriptor) -> Self {
        match *grid {
            GridDescriptor::LatLon { nlat, nlon } => {
                GridGeometry::LatLon(LatLonGeometry::new(nlat, nlon))
            }
            GridDescriptor::CubedSphere { n } => {
                GridGeometry::CubedSphere(CubedSphereGeometry::new(n))
            }
        }
    }

    pub fn descriptor(&self) -> GridDescriptor {
        match self {
            GridGeometry::LatLon(g) => GridDescriptor::LatLon {
                nlat: g.nlat(),
                nlon: g.nlon(),
            },
            GridGeometry::CubedSphere(g) => GridDescriptor::CubedSphere { n: g.n },
        }
    }

    /// Cell areas in m², in the grid's canonical layer shape.
    pub fn cell_areas(&self) -> ArrayD<f64> {
        match self {
            GridGeometry::LatLon(g) => g.cell_areas(),
            GridGeometry::CubedSphere(g) => g.cell_areas(),
        }
    }

    /// Cells within the 180E seam band that renderers mask on
    /// cubed-sphere plots. Always empty for lat-lon grids.
    pub fn seam_mask(&self) -> ArrayD<bool> {
        match self {
            GridGeometry::LatLon(g) => ArrayD::from_elem(IxDyn(&[g.nlat(), g.nlon()]), false),
            GridGeometry::CubedSphere(g) => g
                .lon
                .mapv(|lon| (lon - 180.0).abs() < SEAM_HALF_WIDTH_DEG)
                .into_dyn(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_latlon_4x5_edges() {
        let g = LatLonGeometry::new(46, 72);
        assert_eq!(g.lat_b.len(), 47);
        assert_eq!(g.lat_b[0], -90.0);
        assert_eq!(g.lat_b[1], -88.0);
        assert_eq!(g.lat_b[46], 90.0);
        assert_eq!(g.lat[0], -89.0);
        assert_eq!(g.lat[1], -86.0);
        assert_eq!(g.lon[0], -180.0);
        assert_eq!(g.lon_b[0], -182.5);
        assert_eq!(g.extent(), (-182.5, 177.5, -90.0, 90.0));
    }

    #[test]
    fn test_total_area_matches_sphere() {
        let sphere = 4.0 * PI * EARTH_RADIUS_M * EARTH_RADIUS_M;
        for grid in [
            GridDescriptor::LatLon { nlat: 91, nlon: 144 },
            GridDescriptor::CubedSphere { n: 12 },
        ] {
            let total: f64 = GridGeometry::build(&grid).cell_areas().sum();
            assert!((total - sphere).abs() / sphere < 1e-9, "{}: {}", grid, total);
        }
    }

    #[test]
    fn test_seam_mask() {
        let cs = GridGeometry::build(&GridDescriptor::CubedSphere { n: 24 });
        let mask = cs.seam_mask();
        assert_eq!(mask.shape(), &[6, 24, 24]);
        assert!(mask.iter().any(|m| *m));
        assert!(mask.iter().any(|m| !*m));

        let ll = GridGeometry::build(&GridDescriptor::LatLon { nlat: 46, nlon: 72 });
        assert!(ll.seam_mask().iter().all(|m| !*m));
    }

    #[test]
    fn test_descriptor_round_trip() {
        let grid = GridDescriptor::CubedSphere { n: 6 };
        assert_eq!(GridGeometry::build(&grid).descriptor(), grid);
    }
}
