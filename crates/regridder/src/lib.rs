//! Grid catalog and regridding operators for model output comparison.
//!
//! This crate classifies horizontal grids, chooses comparison grids and
//! provides cached conservative regridding from lat-lon and cubed-sphere
//! grids onto lat-lon grids.
//!
//! # Example
//!
//! ```ignore
//! use regridder::{catalog, RegridderCache, RegridderConfig};
//!
//! let ref_grid = catalog::classify(46, 72)?;
//! let dev_grid = catalog::classify(91, 144)?;
//! let cmp = catalog::resolve_comparison(&ref_grid, &dev_grid, None)?;
//!
//! let mut cache = RegridderCache::new(&RegridderConfig::default())?;
//! let op = cache.get(&dev_grid, &cmp, Some(Path::new("weights")))?;
//! let regridded = op.apply(layer.view())?;
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod cubed_sphere;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod operator;
pub mod weights;

pub use cache::{RegridCacheStats, RegridderCache};
pub use config::RegridderConfig;
pub use error::{RegridError, Result};
pub use generate::{ConservativeGenerator, WeightGenerator};
pub use geometry::{CubedSphereGeometry, GridGeometry, LatLonGeometry, EARTH_RADIUS_M};
pub use operator::RegridOperator;
pub use weights::{SparseWeights, WeightsFile};
