pub mod kernel;
pub mod spatial_grid;

pub use kernel::*;
pub use spatial_grid::SpatialGrid;
