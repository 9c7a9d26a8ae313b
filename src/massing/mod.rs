pub mod generator;
pub mod massing_structs;
pub mod mesh;

pub use generator::{generate_massing, mesh_for_massing};
pub use massing_structs::*;
pub use mesh::MeshData;
