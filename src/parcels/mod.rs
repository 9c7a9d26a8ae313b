pub mod parcel_structs;
pub mod subdivider;

pub use parcel_structs::*;
pub use subdivider::{subdivide_block, SubdivisionMethod, SubdivisionOutcome};
