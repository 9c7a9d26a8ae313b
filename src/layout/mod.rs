pub mod era;
pub mod generator;

pub use era::Era;
pub use generator::LayoutGenerator;
