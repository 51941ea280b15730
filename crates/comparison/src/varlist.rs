//! Variables shared by two datasets.

use bench_common::{Dataset, Dim};

/// Common variable names, in the first dataset's order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonVariables {
    pub all: Vec<String>,
    /// Variables without a level axis.
    pub two_d: Vec<String>,
    /// Variables with a level axis.
    pub three_d: Vec<String>,
}

/// Intersect the variable names of two datasets.
///
/// Dimensionality is taken from `a`; disagreement with `b` surfaces later
/// when the variable is compared.
pub fn common_variables(a: &Dataset, b: &Dataset) -> CommonVariables {
    let mut common = CommonVariables::default();
    for field in a.fields().filter(|f| b.contains(f.name())) {
        let name = field.name().to_string();
        if field.has(Dim::Lev) {
            common.three_d.push(name.clone());
        } else {
            common.two_d.push(name.clone());
        }
        common.all.push(name);
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{create_constant_column_field, create_constant_layer, create_dataset, grids};

    #[test]
    fn test_intersection_order_and_split() {
        let g = grids::LL_4X5;
        let a = create_dataset([
            create_constant_column_field("SpeciesConc_O3", "ppb", &g, 3, 1.0),
            create_constant_layer("AREAM2", "m2", &g, 1.0),
            create_constant_layer("OnlyInA", "1", &g, 1.0),
            create_constant_column_field("SpeciesConc_CO", "ppb", &g, 3, 1.0),
        ]);
        let b = create_dataset([
            create_constant_column_field("SpeciesConc_CO", "ppb", &g, 3, 1.0),
            create_constant_layer("AREAM2", "m2", &g, 1.0),
            create_constant_column_field("SpeciesConc_O3", "ppb", &g, 3, 1.0),
        ]);

        let common = common_variables(&a, &b);
        assert_eq!(common.all, vec!["SpeciesConc_O3", "AREAM2", "SpeciesConc_CO"]);
        assert_eq!(common.two_d, vec!["AREAM2"]);
        assert_eq!(common.three_d, vec!["SpeciesConc_O3", "SpeciesConc_CO"]);
    }

    #[test]
    fn test_disjoint_datasets() {
        let g = grids::LL_4X5;
        let a = create_dataset([create_constant_layer("x", "1", &g, 1.0)]);
        let b = create_dataset([create_constant_layer("y", "1", &g, 1.0)]);
        assert_eq!(common_variables(&a, &b), CommonVariables::default());
    }
}
