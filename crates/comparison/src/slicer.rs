//! Reduce multi-dimensional fields to comparable layers.
//!
//! Selected arrays come back in canonical axis order: an optional leading
//! level axis followed by `(lat, lon)` or `(nf, Ydim, Xdim)`.

use bench_common::{BenchError, BenchResult, Dim, Field};
use ndarray::{ArrayD, Axis};

/// Number of levels in the standard vertical grid.
pub const STANDARD_LEVELS: usize = 72;

/// Select the level index to read, honouring a flipped vertical axis.
///
/// With `flip` the level is counted from the other end of the axis, i.e.
/// `nlev - 1 - level_index` (`71 - level_index` on the standard grid).
pub fn resolve_level(field: &Field, nlev: usize, level_index: usize, flip: bool) -> BenchResult<usize> {
    if level_index >= nlev {
        return Err(BenchError::dimension(
            field.name(),
            format!("level index {} out of range for {} levels", level_index, nlev),
        ));
    }
    Ok(if flip { nlev - 1 - level_index } else { level_index })
}

/// Slice a field down to a single horizontal layer.
///
/// - time and level present: select `time_index`, then the level
/// - only level present: select the level
/// - only time present: select `time_index`
/// - neither: the field's data unchanged
///
/// Fails if the field has no horizontal axes or an index is out of range.
pub fn slice_layer(
    field: &Field,
    level_index: usize,
    time_index: usize,
    flip_vertical: bool,
) -> BenchResult<ArrayD<f64>> {
    require_horizontal(field)?;

    let mut dims = field.dims().to_vec();
    let mut data = field.data().clone();

    if let Some(ax) = field.axis(Dim::Time) {
        data = select(field, data, ax, time_index, "time")?;
        dims.remove(ax);
    }
    if let Some(ax) = dims.iter().position(|d| *d == Dim::Lev) {
        let nlev = data.shape()[ax];
        let lev = resolve_level(field, nlev, level_index, flip_vertical)?;
        data = select(field, data, ax, lev, "lev")?;
        dims.remove(ax);
    }

    Ok(canonical(data, &dims))
}

/// Slice a field down to a `(lev, horizontal...)` column stack.
///
/// Selects `time_index` when a time axis is present and keeps every level.
/// With `flip_vertical` the level axis is reversed so index 0 is always the
/// same end of the atmosphere for ref and dev.
pub fn slice_column(field: &Field, time_index: usize, flip_vertical: bool) -> BenchResult<ArrayD<f64>> {
    require_horizontal(field)?;
    if !field.has(Dim::Lev) {
        return Err(BenchError::dimension(
            field.name(),
            "zonal mean requires a level axis",
        ));
    }

    let mut dims = field.dims().to_vec();
    let mut data = field.data().clone();

    if let Some(ax) = field.axis(Dim::Time) {
        data = select(field, data, ax, time_index, "time")?;
        dims.remove(ax);
    }

    let mut data = canonical(data, &dims);
    if flip_vertical {
        data.invert_axis(Axis(0));
        data = data.as_standard_layout().into_owned();
    }
    Ok(data)
}

fn require_horizontal(field: &Field) -> BenchResult<()> {
    if field.has_horizontal() {
        Ok(())
    } else {
        Err(BenchError::dimension(
            field.name(),
            "variable has no latitude/longitude axes",
        ))
    }
}

fn select(field: &Field, data: ArrayD<f64>, axis: usize, index: usize, label: &str) -> BenchResult<ArrayD<f64>> {
    let len = data.shape()[axis];
    if index >= len {
        return Err(BenchError::dimension(
            field.name(),
            format!("{} index {} out of range for length {}", label, index, len),
        ));
    }
    Ok(data.index_axis_move(Axis(axis), index))
}

/// Permute remaining axes into canonical order and make the data contiguous.
fn canonical(data: ArrayD<f64>, dims: &[Dim]) -> ArrayD<f64> {
    const ORDER: [Dim; 6] = [Dim::Lev, Dim::Lat, Dim::Lon, Dim::Face, Dim::Y, Dim::X];

    let mut axes: Vec<usize> = (0..dims.len()).collect();
    axes.sort_by_key(|&ax| ORDER.iter().position(|d| *d == dims[ax]).unwrap_or(ORDER.len()));
    if axes.iter().enumerate().all(|(i, ax)| i == *ax) {
        return data;
    }
    data.permuted_axes(axes).as_standard_layout().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use test_utils::{create_stacked_field, grids};

    #[test]
    fn test_time_and_level_selected() {
        let field = create_stacked_field("O3", "ppb", &grids::LL_4X5, 2, 72);
        let layer = slice_layer(&field, 3, 1, false).unwrap();
        assert_eq!(layer.shape(), &[46, 72]);
        assert_eq!(layer[[0, 0]], 3101.0);
    }

    #[test]
    fn test_flip_counts_from_top() {
        let field = create_stacked_field("O3", "ppb", &grids::LL_4X5, 1, STANDARD_LEVELS);
        let layer = slice_layer(&field, 0, 0, true).unwrap();
        assert_eq!(layer[[0, 0]], 71001.0);

        let layer = slice_layer(&field, 22, 0, true).unwrap();
        assert_eq!(layer[[0, 0]], 49001.0);
    }

    #[test]
    fn test_level_only_and_plain_layers() {
        let data = ArrayD::from_shape_fn(IxDyn(&[3, 46, 72]), |ix| ix[0] as f64);
        let field = Field::new("O3", "ppb", vec![Dim::Lev, Dim::Lat, Dim::Lon], data).unwrap();
        assert_eq!(slice_layer(&field, 2, 0, false).unwrap()[[5, 5]], 2.0);

        let plain = Field::new(
            "O3",
            "ppb",
            vec![Dim::Lat, Dim::Lon],
            ArrayD::from_elem(IxDyn(&[46, 72]), 4.0),
        )
        .unwrap();
        let layer = slice_layer(&plain, 10, 10, false).unwrap();
        assert_eq!(&layer, plain.data());
    }

    #[test]
    fn test_time_only_field() {
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 46, 72]), |ix| ix[0] as f64);
        let field = Field::new("O3", "ppb", vec![Dim::Time, Dim::Lat, Dim::Lon], data).unwrap();
        let layer = slice_layer(&field, 0, 1, false).unwrap();
        assert_eq!(layer.shape(), &[46, 72]);
        assert!(layer.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_axes_reordered_to_canonical() {
        let data = ArrayD::from_shape_fn(IxDyn(&[72, 46]), |ix| ix[1] as f64);
        let field = Field::new("O3", "ppb", vec![Dim::Lon, Dim::Lat], data).unwrap();
        let layer = slice_layer(&field, 0, 0, false).unwrap();
        assert_eq!(layer.shape(), &[46, 72]);
        assert_eq!(layer[[7, 0]], 7.0);
    }

    #[test]
    fn test_out_of_range_indices() {
        let field = create_stacked_field("O3", "ppb", &grids::LL_4X5, 1, 5);
        assert!(matches!(
            slice_layer(&field, 5, 0, false),
            Err(BenchError::Dimension { .. })
        ));
        assert!(slice_layer(&field, 0, 1, false).is_err());
    }

    #[test]
    fn test_missing_horizontal_axes() {
        let field = Field::new("O3", "ppb", vec![Dim::Lev], ArrayD::zeros(IxDyn(&[72]))).unwrap();
        assert!(matches!(
            slice_layer(&field, 0, 0, false),
            Err(BenchError::Dimension { .. })
        ));
    }

    #[test]
    fn test_slice_column() {
        let field = create_stacked_field("O3", "ppb", &grids::CS_C6, 2, 4);
        let column = slice_column(&field, 1, false).unwrap();
        assert_eq!(column.shape(), &[4, 6, 6, 6]);
        assert_eq!(column[[0, 0, 0, 0]], 101.0);

        let flipped = slice_column(&field, 1, true).unwrap();
        assert_eq!(flipped[[0, 0, 0, 0]], 3101.0);
        assert_eq!(flipped[[3, 5, 5, 5]], 101.0);

        let layer = test_utils::create_constant_layer("O3", "ppb", &grids::LL_4X5, 1.0);
        assert!(slice_column(&layer, 0, false).is_err());
    }
}
