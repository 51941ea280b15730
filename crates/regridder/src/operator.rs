//! Regrid operators built from sparse weights.

use bench_common::grid::CUBED_SPHERE_FACES;
use bench_common::GridDescriptor;
use ndarray::{Array2, Array3, ArrayD, ArrayViewD, Axis, IxDyn};

use crate::error::{RegridError, Result};
use crate::weights::{SparseWeights, WeightsFile};

/// A ready-to-apply mapping from one horizontal grid onto a lat-lon grid.
#[derive(Debug, Clone)]
pub enum RegridOperator {
    /// Lat-lon source: a single weights matrix.
    LatLon {
        source: GridDescriptor,
        target: GridDescriptor,
        weights: SparseWeights,
    },
    /// Cubed-sphere source: one matrix per face, summed into the target.
    CubedSphere {
        source: GridDescriptor,
        target: GridDescriptor,
        faces: Box<[SparseWeights; CUBED_SPHERE_FACES]>,
    },
}

impl RegridOperator {
    /// Build an operator from loaded or generated weights.
    pub fn from_weights(file: WeightsFile) -> Result<Self> {
        if !file.matches(&file.source, &file.target) {
            return Err(RegridError::shape_mismatch(format!(
                "weights do not fit {} -> {}",
                file.source, file.target
            )));
        }

        let WeightsFile {
            source,
            target,
            mut faces,
        } = file;

        if source.is_latlon() {
            let weights = faces
                .pop()
                .ok_or_else(|| RegridError::shape_mismatch("no lat-lon weights"))?;
            return Ok(RegridOperator::LatLon {
                source,
                target,
                weights,
            });
        }

        let faces: Box<[SparseWeights; CUBED_SPHERE_FACES]> = faces
            .into_boxed_slice()
            .try_into()
            .map_err(|_| RegridError::shape_mismatch("expected six face matrices"))?;
        Ok(RegridOperator::CubedSphere {
            source,
            target,
            faces,
        })
    }

    pub fn source(&self) -> GridDescriptor {
        match self {
            RegridOperator::LatLon { source, .. } | RegridOperator::CubedSphere { source, .. } => {
                *source
            }
        }
    }

    pub fn target(&self) -> GridDescriptor {
        match self {
            RegridOperator::LatLon { target, .. } | RegridOperator::CubedSphere { target, .. } => {
                *target
            }
        }
    }

    /// Weight matrices, one per source face.
    pub fn faces(&self) -> &[SparseWeights] {
        match self {
            RegridOperator::LatLon { weights, .. } => std::slice::from_ref(weights),
            RegridOperator::CubedSphere { faces, .. } => &faces[..],
        }
    }

    /// Regrid one horizontal layer onto the target grid.
    ///
    /// Lat-lon inputs are `(nlat, nlon)`; cubed-sphere inputs may be either
    /// `(6, N, N)` or the stacked `(6N, N)` form.
    pub fn apply(&self, layer: ArrayViewD<'_, f64>) -> Result<Array2<f64>> {
        let source = self.source();
        let expected = source.cell_count();
        if layer.len() != expected || !self.accepts_shape(layer.shape()) {
            return Err(RegridError::shape_mismatch(format!(
                "layer shape {:?} does not match grid {}",
                layer.shape(),
                source
            )));
        }

        let flat: Vec<f64> = layer.iter().copied().collect();
        let (nlat, nlon) = self.target().stacked_shape();
        let mut out = vec![0.0; nlat * nlon];

        let faces = self.faces();
        let face_cells = expected / faces.len();
        for (f, weights) in faces.iter().enumerate() {
            weights.apply_into(&flat[f * face_cells..(f + 1) * face_cells], &mut out)?;
        }

        Array2::from_shape_vec((nlat, nlon), out)
            .map_err(|e| RegridError::shape_mismatch(e.to_string()))
    }

    /// Regrid a layer or a stack of layers with one leading level axis.
    ///
    /// The output keeps the leading axis when present, followed by the
    /// target `(nlat, nlon)`.
    pub fn apply_layers(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        if self.accepts_shape(data.shape()) {
            return Ok(self.apply(data)?.into_dyn());
        }

        let shape = data.shape();
        if shape.len() < 2 || !self.accepts_shape(&shape[1..]) {
            return Err(RegridError::shape_mismatch(format!(
                "cannot regrid array of shape {:?} from {}",
                shape,
                self.source()
            )));
        }

        let nlev = shape[0];
        let (nlat, nlon) = self.target().stacked_shape();
        let mut out = Array3::zeros((nlev, nlat, nlon));
        for (k, layer) in data.axis_iter(Axis(0)).enumerate() {
            let regridded = self.apply(layer)?;
            out.index_axis_mut(Axis(0), k).assign(&regridded);
        }
        Ok(out.into_dyn())
    }

    fn accepts_shape(&self, shape: &[usize]) -> bool {
        let source = self.source();
        let (a, b) = source.stacked_shape();
        shape == [a, b] || (source.is_cubed_sphere() && shape == source.layer_shape().as_slice())
    }
}

/// Identity operator over a lat-lon grid, served for same-grid lookups.
pub fn identity(grid: GridDescriptor) -> Result<RegridOperator> {
    if !grid.is_latlon() {
        return Err(RegridError::unsupported(grid.label(), grid.label()));
    }
    let cells = grid.cell_count();
    let mut weights = SparseWeights::new(cells, cells);
    for c in 0..cells {
        weights.push(c, c, 1.0);
    }
    Ok(RegridOperator::LatLon {
        source: grid,
        target: grid,
        weights,
    })
}

/// Put cubed-sphere data into face layout.
///
/// Trailing stacked `(6N, N)` axes become `(6, N, N)`; leading axes are
/// kept. Data already in face layout is returned unchanged.
pub fn to_face_layout(data: ArrayD<f64>, n: usize) -> Result<ArrayD<f64>> {
    let shape = data.shape().to_vec();
    let nd = shape.len();
    if nd >= 3 && shape[nd - 3..] == [CUBED_SPHERE_FACES, n, n] {
        return Ok(data);
    }
    if nd < 2 || shape[nd - 2..] != [CUBED_SPHERE_FACES * n, n] {
        return Err(RegridError::shape_mismatch(format!(
            "array of shape {:?} is not on a c{} grid",
            shape, n
        )));
    }

    let mut faces = shape[..nd - 2].to_vec();
    faces.extend_from_slice(&[CUBED_SPHERE_FACES, n, n]);
    data.as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(&faces))
        .map_err(|e| RegridError::shape_mismatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{ConservativeGenerator, WeightGenerator};

    fn operator(source: GridDescriptor, target: GridDescriptor) -> RegridOperator {
        let faces = ConservativeGenerator::default().generate(&source, &target).unwrap();
        RegridOperator::from_weights(WeightsFile {
            source,
            target,
            faces,
        })
        .unwrap()
    }

    #[test]
    fn test_constant_latlon_field_preserved() {
        let op = operator(
            GridDescriptor::LatLon { nlat: 91, nlon: 144 },
            GridDescriptor::LatLon { nlat: 46, nlon: 72 },
        );
        let input = ArrayD::from_elem(IxDyn(&[91, 144]), 3.5);
        let out = op.apply(input.view()).unwrap();
        assert_eq!(out.dim(), (46, 72));
        assert!(out.iter().all(|v| (v - 3.5).abs() < 1e-10));
    }

    #[test]
    fn test_cubed_sphere_accepts_both_layouts() {
        let op = operator(
            GridDescriptor::CubedSphere { n: 6 },
            GridDescriptor::LatLon { nlat: 46, nlon: 72 },
        );
        let faces = ArrayD::from_elem(IxDyn(&[6, 6, 6]), 2.0);
        let stacked = ArrayD::from_elem(IxDyn(&[36, 6]), 2.0);

        let a = op.apply(faces.view()).unwrap();
        let b = op.apply(stacked.view()).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (v - 2.0).abs() < 1e-10));
    }

    #[test]
    fn test_apply_layers_keeps_level_axis() {
        let op = identity(GridDescriptor::LatLon { nlat: 46, nlon: 72 }).unwrap();
        let mut data = ArrayD::zeros(IxDyn(&[3, 46, 72]));
        for k in 0..3 {
            data.index_axis_mut(Axis(0), k).fill(k as f64);
        }
        let out = op.apply_layers(data.view()).unwrap();
        assert_eq!(out.shape(), &[3, 46, 72]);
        assert_eq!(out, data);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let op = identity(GridDescriptor::LatLon { nlat: 46, nlon: 72 }).unwrap();
        let wrong = ArrayD::zeros(IxDyn(&[72, 46]));
        assert!(matches!(
            op.apply(wrong.view()),
            Err(RegridError::ShapeMismatch(_))
        ));
        let wrong_stack = ArrayD::zeros(IxDyn(&[2, 3, 46, 72]));
        assert!(op.apply_layers(wrong_stack.view()).is_err());
    }

    #[test]
    fn test_to_face_layout() {
        let stacked = ArrayD::from_shape_fn(IxDyn(&[12, 2]), |ix| (ix[0] * 2 + ix[1]) as f64);
        let faces = to_face_layout(stacked, 2).unwrap();
        assert_eq!(faces.shape(), &[6, 2, 2]);
        assert_eq!(faces[[1, 0, 0]], 4.0);
        assert_eq!(faces[[5, 1, 1]], 23.0);

        let column = ArrayD::zeros(IxDyn(&[3, 12, 2]));
        assert_eq!(to_face_layout(column, 2).unwrap().shape(), &[3, 6, 2, 2]);

        let already = ArrayD::zeros(IxDyn(&[6, 2, 2]));
        assert_eq!(to_face_layout(already, 2).unwrap().shape(), &[6, 2, 2]);

        assert!(to_face_layout(ArrayD::zeros(IxDyn(&[46, 72])), 2).is_err());
    }
}
