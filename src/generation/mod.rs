//! Procedural generation of vegetation topology.

pub mod plant_gen;

pub use plant_gen::{Attachment, Branch, PlantGenerator, PlantParams, PlantTopology};
