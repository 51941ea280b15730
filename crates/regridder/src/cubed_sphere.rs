//! Equiangular gnomonic cubed-sphere geometry.
//!
//! Each face is the gnomonic projection of one cube face onto the unit
//! sphere. Face-local angles `alpha` (columns, `Xdim`) and `beta` (rows,
//! `Ydim`) run from `-pi/4` to `pi/4` in `N` equal steps.
//!
//! Face order: equatorial faces 0, 1, 3, 4 centred on longitudes 0, 90,
//! 180 and 270; face 2 covers the north pole and face 5 the south pole.

use std::f64::consts::FRAC_PI_4;

/// Orientation of a cube face: outward centre axis plus the directions of
/// increasing `alpha` and `beta`.
#[derive(Debug, Clone, Copy)]
struct FaceFrame {
    center: [f64; 3],
    east: [f64; 3],
    north: [f64; 3],
}

const FACES: [FaceFrame; 6] = [
    FaceFrame { center: [1.0, 0.0, 0.0], east: [0.0, 1.0, 0.0], north: [0.0, 0.0, 1.0] },
    FaceFrame { center: [0.0, 1.0, 0.0], east: [-1.0, 0.0, 0.0], north: [0.0, 0.0, 1.0] },
    FaceFrame { center: [0.0, 0.0, 1.0], east: [0.0, 1.0, 0.0], north: [-1.0, 0.0, 0.0] },
    FaceFrame { center: [-1.0, 0.0, 0.0], east: [0.0, -1.0, 0.0], north: [0.0, 0.0, 1.0] },
    FaceFrame { center: [0.0, -1.0, 0.0], east: [1.0, 0.0, 0.0], north: [0.0, 0.0, 1.0] },
    FaceFrame { center: [0.0, 0.0, -1.0], east: [0.0, 1.0, 0.0], north: [1.0, 0.0, 0.0] },
];

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Face-local angle of edge `k` (0..=n).
#[inline]
pub fn edge_angle(k: usize, n: usize) -> f64 {
    -FRAC_PI_4 + k as f64 * (2.0 * FRAC_PI_4) / n as f64
}

/// Face-local angle of the centre of cell `k` (0..n).
#[inline]
pub fn center_angle(k: usize, n: usize) -> f64 {
    -FRAC_PI_4 + (k as f64 + 0.5) * (2.0 * FRAC_PI_4) / n as f64
}

/// Map face-local angles to geographic `(lat, lon)` in degrees.
///
/// Longitudes are returned in `[0, 360)`.
pub fn face_to_geo(face: usize, alpha: f64, beta: f64) -> (f64, f64) {
    let frame = FACES[face];
    let (ta, tb) = (alpha.tan(), beta.tan());
    let p = [
        frame.center[0] + ta * frame.east[0] + tb * frame.north[0],
        frame.center[1] + ta * frame.east[1] + tb * frame.north[1],
        frame.center[2] + ta * frame.east[2] + tb * frame.north[2],
    ];
    let r = dot(p, p).sqrt();

    let lat = (p[2] / r).clamp(-1.0, 1.0).asin().to_degrees();
    let lon = p[1].atan2(p[0]).to_degrees().rem_euclid(360.0);
    (lat, lon)
}

/// Find the cell containing a geographic point on a face size `n` grid.
///
/// Returns `(face, row, col)`, i.e. `(nf, Ydim, Xdim)` indices.
pub fn locate(lat_deg: f64, lon_deg: f64, n: usize) -> (usize, usize, usize) {
    let (lat, lon) = (lat_deg.to_radians(), lon_deg.to_radians());
    let v = [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()];

    let mut face = 0;
    let mut best = f64::NEG_INFINITY;
    for (f, frame) in FACES.iter().enumerate() {
        let d = dot(v, frame.center);
        if d > best {
            best = d;
            face = f;
        }
    }

    let frame = FACES[face];
    let alpha = (dot(v, frame.east) / best).atan();
    let beta = (dot(v, frame.north) / best).atan();
    (face, angle_to_index(beta, n), angle_to_index(alpha, n))
}

#[inline]
fn angle_to_index(angle: f64, n: usize) -> usize {
    let t = (angle + FRAC_PI_4) / (2.0 * FRAC_PI_4) * n as f64;
    (t.floor().max(0.0) as usize).min(n - 1)
}

/// Area of the face-local rectangle `[a0, a1] x [b0, b1]` on the unit sphere.
pub fn unit_area(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    fn corner(a: f64, b: f64) -> f64 {
        let (x, y) = (a.tan(), b.tan());
        (x * y / (1.0 + x * x + y * y).sqrt()).atan()
    }
    corner(a1, b1) - corner(a0, b1) - corner(a1, b0) + corner(a0, b0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_face_centers() {
        let expected = [(0.0, 0.0), (0.0, 90.0), (90.0, 0.0), (0.0, 180.0), (0.0, 270.0)];
        for (face, (lat, lon)) in expected.iter().enumerate() {
            let (la, lo) = face_to_geo(face, 0.0, 0.0);
            assert!((la - lat).abs() < 1e-9, "face {} lat {}", face, la);
            if lat.abs() < 89.0 {
                assert!((lo - lon).abs() < 1e-9, "face {} lon {}", face, lo);
            }
        }
        let (la, _) = face_to_geo(5, 0.0, 0.0);
        assert!((la + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_locate_inverts_face_to_geo() {
        let n = 12;
        for face in 0..6 {
            for row in [0, 5, 11] {
                for col in [0, 6, 11] {
                    let (lat, lon) = face_to_geo(face, center_angle(col, n), center_angle(row, n));
                    assert_eq!(locate(lat, lon, n), (face, row, col));
                }
            }
        }
    }

    #[test]
    fn test_face_areas_cover_sphere() {
        let n = 8;
        let mut total = 0.0;
        for j in 0..n {
            for i in 0..n {
                total += unit_area(
                    edge_angle(i, n),
                    edge_angle(i + 1, n),
                    edge_angle(j, n),
                    edge_angle(j + 1, n),
                );
            }
        }
        assert!((6.0 * total - 4.0 * PI).abs() < 1e-9);
    }
}
