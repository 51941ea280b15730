//! Labelled multi-dimensional fields and datasets.

use indexmap::IndexMap;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Axis labels a field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Time,
    Lev,
    Lat,
    Lon,
    /// Cubed-sphere face index.
    Face,
    /// Cubed-sphere face-local row.
    Y,
    /// Cubed-sphere face-local column.
    X,
}

impl Dim {
    /// Conventional file-level dimension name.
    pub fn name(&self) -> &'static str {
        match self {
            Dim::Time => "time",
            Dim::Lev => "lev",
            Dim::Lat => "lat",
            Dim::Lon => "lon",
            Dim::Face => "nf",
            Dim::Y => "Ydim",
            Dim::X => "Xdim",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "time" => Some(Dim::Time),
            "lev" => Some(Dim::Lev),
            "lat" => Some(Dim::Lat),
            "lon" => Some(Dim::Lon),
            "nf" => Some(Dim::Face),
            "Ydim" => Some(Dim::Y),
            "Xdim" => Some(Dim::X),
            _ => None,
        }
    }

    pub fn is_horizontal(&self) -> bool {
        !matches!(self, Dim::Time | Dim::Lev)
    }
}

/// A named, unit-tagged array with labelled axes.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    units: String,
    dims: Vec<Dim>,
    data: ArrayD<f64>,
}

impl Field {
    /// Create a field, checking that every axis is labelled exactly once.
    ///
    /// Units are stored trimmed of surrounding whitespace.
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        dims: Vec<Dim>,
        data: ArrayD<f64>,
    ) -> BenchResult<Self> {
        let name = name.into();
        if dims.len() != data.ndim() {
            return Err(BenchError::dimension(
                &name,
                format!("{} labels for {}-d data", dims.len(), data.ndim()),
            ));
        }
        for (i, d) in dims.iter().enumerate() {
            if dims[..i].contains(d) {
                return Err(BenchError::dimension(
                    &name,
                    format!("axis '{}' appears twice", d.name()),
                ));
            }
        }

        Ok(Self {
            name,
            units: units.into().trim().to_string(),
            dims,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Position of an axis, if present.
    pub fn axis(&self, dim: Dim) -> Option<usize> {
        self.dims.iter().position(|d| *d == dim)
    }

    pub fn has(&self, dim: Dim) -> bool {
        self.axis(dim).is_some()
    }

    /// Length of an axis, if present.
    pub fn size(&self, dim: Dim) -> Option<usize> {
        self.axis(dim).map(|ax| self.data.shape()[ax])
    }

    /// Whether the field carries a full set of horizontal axes.
    pub fn has_horizontal(&self) -> bool {
        (self.has(Dim::Lat) && self.has(Dim::Lon))
            || (self.has(Dim::Face) && self.has(Dim::Y) && self.has(Dim::X))
    }

    /// Horizontal shape in stacked `(nlat, nlon)` form.
    ///
    /// Explicit cubed-sphere axes `(nf, Ydim, Xdim)` report `(nf * Ydim, Xdim)`.
    pub fn horizontal_shape(&self) -> Option<(usize, usize)> {
        if let (Some(nlat), Some(nlon)) = (self.size(Dim::Lat), self.size(Dim::Lon)) {
            return Some((nlat, nlon));
        }
        match (self.size(Dim::Face), self.size(Dim::Y), self.size(Dim::X)) {
            (Some(nf), Some(ny), Some(nx)) => Some((nf * ny, nx)),
            _ => None,
        }
    }
}

/// Insertion-ordered collection of fields from one model run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    fields: IndexMap<String, Field>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any existing field of the same name.
    pub fn insert(&mut self, field: Field) {
        self.fields.insert(field.name().to_string(), field);
    }

    /// Builder-style insert.
    pub fn with_field(mut self, field: Field) -> Self {
        self.insert(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Variable names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Stacked horizontal shape of the dataset, taken from the first field
    /// that has horizontal axes.
    pub fn horizontal_shape(&self) -> Option<(usize, usize)> {
        self.fields.values().find_map(Field::horizontal_shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn zeros(shape: &[usize]) -> ArrayD<f64> {
        ArrayD::zeros(IxDyn(shape))
    }

    #[test]
    fn test_field_rejects_mismatched_labels() {
        assert!(Field::new("O3", "ppb", vec![Dim::Lat], zeros(&[2, 3])).is_err());
        assert!(Field::new("O3", "ppb", vec![Dim::Lat, Dim::Lat], zeros(&[2, 3])).is_err());
    }

    #[test]
    fn test_field_trims_units() {
        let f = Field::new("O3", "  ppb ", vec![Dim::Lat, Dim::Lon], zeros(&[2, 3])).unwrap();
        assert_eq!(f.units(), "ppb");
    }

    #[test]
    fn test_horizontal_shape_forms() {
        let ll = Field::new(
            "O3",
            "ppb",
            vec![Dim::Time, Dim::Lev, Dim::Lat, Dim::Lon],
            zeros(&[1, 3, 46, 72]),
        )
        .unwrap();
        assert_eq!(ll.horizontal_shape(), Some((46, 72)));
        assert_eq!(ll.size(Dim::Lev), Some(3));

        let cs = Field::new(
            "O3",
            "ppb",
            vec![Dim::Face, Dim::Y, Dim::X],
            zeros(&[6, 4, 4]),
        )
        .unwrap();
        assert_eq!(cs.horizontal_shape(), Some((24, 4)));

        let column = Field::new("O3", "ppb", vec![Dim::Lev], zeros(&[72])).unwrap();
        assert!(!column.has_horizontal());
        assert_eq!(column.horizontal_shape(), None);
    }

    #[test]
    fn test_dataset_preserves_insertion_order() {
        let mut ds = Dataset::new();
        for name in ["c", "a", "b"] {
            ds.insert(Field::new(name, "1", vec![Dim::Lat, Dim::Lon], zeros(&[2, 2])).unwrap());
        }
        assert_eq!(ds.names().collect::<Vec<_>>(), vec!["c", "a", "b"]);
        assert_eq!(ds.horizontal_shape(), Some((2, 2)));
    }

    #[test]
    fn test_dim_names_round_trip() {
        for d in [Dim::Time, Dim::Lev, Dim::Lat, Dim::Lon, Dim::Face, Dim::Y, Dim::X] {
            assert_eq!(Dim::from_name(d.name()), Some(d));
        }
    }
}
