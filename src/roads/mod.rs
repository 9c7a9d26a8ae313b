pub mod road_graph;
pub mod road_structs;
pub mod welder;

pub use road_graph::RoadGraph;
pub use road_structs::*;
pub use welder::{IntersectionId, IntersectionKind, IntersectionRecord, WeldOutcome, Welder};
