//! Seabed - streamed marching-cubes seafloor with Verlet-simulated vegetation

pub mod core;
pub mod math;
pub mod terrain;
pub mod meshing;
pub mod streaming;
pub mod verlet;
pub mod generation;
pub mod world;

pub use crate::core::{Error, Result, WorldConfig};
pub use world::{World, WorldStats};
