pub mod buffers;
pub mod city_core;
pub mod messages;

pub use city_core::{run_core, CityCore};
pub use messages::{CoreError, Reply, Request, SpawnEvent, ZoneRequest};
