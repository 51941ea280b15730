//! Common test fixtures for benchmark comparison tests.

/// Grid descriptors for the resolutions tests use most.
pub mod grids {
    use bench_common::GridDescriptor;

    /// 4x5 lat-lon grid (46 x 72).
    pub const LL_4X5: GridDescriptor = GridDescriptor::LatLon { nlat: 46, nlon: 72 };

    /// 2x2.5 lat-lon grid (91 x 144).
    pub const LL_2X25: GridDescriptor = GridDescriptor::LatLon { nlat: 91, nlon: 144 };

    /// 1x1.25 lat-lon grid (181 x 288), the mixed-type default.
    pub const LL_1X125: GridDescriptor = GridDescriptor::LatLon { nlat: 181, nlon: 288 };

    /// Tiny cubed-sphere grid, fast enough for weight generation in tests.
    pub const CS_C6: GridDescriptor = GridDescriptor::CubedSphere { n: 6 };

    /// C24 cubed-sphere grid.
    pub const CS_C24: GridDescriptor = GridDescriptor::CubedSphere { n: 24 };
}

/// Variable names with special handling.
pub mod variables {
    /// Rate variable excluded from area normalization.
    pub const PROD_NO: &str = "Prod_NO";

    /// Mass variable eligible for area normalization.
    pub const SPECIES_O3: &str = "SpeciesConc_O3";

    /// Embedded grid cell area.
    pub const AREA: &str = "AREAM2";
}

/// Vertical grid conventions.
pub mod levels {
    /// Levels in the standard vertical grid.
    pub const NLEV_72: usize = 72;

    /// Level index labelled as 500 hPa.
    pub const LEVEL_500HPA: usize = 22;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_labels() {
        assert_eq!(grids::LL_4X5.label(), "4x5");
        assert_eq!(grids::LL_2X25.label(), "2x2.5");
        assert_eq!(grids::LL_1X125.label(), "1x1.25");
        assert_eq!(grids::CS_C24.label(), "c24");
    }
}
