//! cityfabric - deterministic procedural urban-fabric core.
//!
//! Given a bounded planning area, a seed and an era, the core produces a
//! welded planar road graph, city blocks, zoned parcels and building
//! massings with renderer-ready mesh buffers. All state is owned by a
//! single [`core::CityCore`]; external collaborators talk to it through
//! [`core::Request`]/[`core::Reply`] values, either directly via
//! `CityCore::handle` or over channels via [`core::run_core`].
//!
//! The pipeline, leaves first: geometry kernel, spatial index, road graph,
//! intersection welder, procedural layout, block finder, parcel
//! subdivider, massing generator.

pub mod blocks;
pub mod config;
pub mod core;
pub mod geom;
pub mod layout;
pub mod massing;
pub mod parcels;
pub mod rng;
pub mod roads;

pub use crate::core::{run_core, CityCore, Reply, Request};
pub use config::{CoreConfig, Tolerances};
pub use layout::Era;
