//! Synthetic field and dataset generators.
//!
//! Fields are laid out with canonical axes: `(lat, lon)` for lat-lon grids
//! and `(nf, Ydim, Xdim)` for cubed-sphere grids, optionally preceded by
//! `time` and `lev`.

use bench_common::{Dataset, Dim, Field, GridDescriptor};
use ndarray::{ArrayD, IxDyn};

/// Horizontal axis labels for a grid.
pub fn horizontal_dims(grid: &GridDescriptor) -> Vec<Dim> {
    if grid.is_latlon() {
        vec![Dim::Lat, Dim::Lon]
    } else {
        vec![Dim::Face, Dim::Y, Dim::X]
    }
}

/// Creates a single horizontal layer where each cell value is `f(cell)`,
/// with `cell` the row-major index over the grid's layer shape.
///
/// # Example
///
/// ```
/// use bench_common::GridDescriptor;
/// use test_utils::create_layer;
///
/// let grid = GridDescriptor::LatLon { nlat: 46, nlon: 72 };
/// let field = create_layer("O3", "ppb", &grid, |cell| cell as f64);
/// assert_eq!(field.data().shape(), &[46, 72]);
/// assert_eq!(field.data()[[1, 0]], 72.0);
/// ```
pub fn create_layer<F>(name: &str, units: &str, grid: &GridDescriptor, f: F) -> Field
where
    F: Fn(usize) -> f64,
{
    let shape = grid.layer_shape();
    let cells: usize = shape.iter().product();
    let data = ArrayD::from_shape_vec(IxDyn(&shape), (0..cells).map(f).collect())
        .expect("layer shape matches cell count");
    Field::new(name, units, horizontal_dims(grid), data).expect("valid layer dims")
}

/// Creates a layer with every cell set to `value`.
pub fn create_constant_layer(name: &str, units: &str, grid: &GridDescriptor, value: f64) -> Field {
    create_layer(name, units, grid, |_| value)
}

/// Creates a `(time, lev, horizontal...)` field.
///
/// Each cell value is `level * 1000 + time * 100 + 1`, so any selected
/// layer is non-zero and identifies its own (time, level) position.
pub fn create_stacked_field(
    name: &str,
    units: &str,
    grid: &GridDescriptor,
    ntime: usize,
    nlev: usize,
) -> Field {
    let layer = grid.layer_shape();
    let cells: usize = layer.iter().product();

    let mut shape = vec![ntime, nlev];
    shape.extend_from_slice(&layer);
    let data = ArrayD::from_shape_fn(IxDyn(&shape), |ix| {
        (ix[1] * 1000 + ix[0] * 100 + 1) as f64
    });
    debug_assert_eq!(data.len(), ntime * nlev * cells);

    let mut dims = vec![Dim::Time, Dim::Lev];
    dims.extend(horizontal_dims(grid));
    Field::new(name, units, dims, data).expect("valid stacked dims")
}

/// Creates a `(lev, horizontal...)` field with every cell set to `value`.
pub fn create_constant_column_field(
    name: &str,
    units: &str,
    grid: &GridDescriptor,
    nlev: usize,
    value: f64,
) -> Field {
    let mut shape = vec![nlev];
    shape.extend(grid.layer_shape());
    let mut dims = vec![Dim::Lev];
    dims.extend(horizontal_dims(grid));
    Field::new(name, units, dims, ArrayD::from_elem(IxDyn(&shape), value))
        .expect("valid column dims")
}

/// Creates a layer with NaN at every `nan_interval`-th cell and `value`
/// elsewhere.
pub fn create_layer_with_nans(
    name: &str,
    units: &str,
    grid: &GridDescriptor,
    value: f64,
    nan_interval: usize,
) -> Field {
    create_layer(name, units, grid, |cell| {
        if nan_interval > 0 && cell % nan_interval == 0 {
            f64::NAN
        } else {
            value
        }
    })
}

/// Creates an `AREAM2` layer with every cell set to `area` m².
pub fn create_area_field(grid: &GridDescriptor, area: f64) -> Field {
    create_constant_layer("AREAM2", "m2", grid, area)
}

/// Builds a dataset from fields in the given order.
pub fn create_dataset(fields: impl IntoIterator<Item = Field>) -> Dataset {
    fields
        .into_iter()
        .fold(Dataset::new(), |ds, field| ds.with_field(field))
}
