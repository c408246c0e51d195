//! Verlet rope simulation for plants

pub mod collider;
pub mod params;
pub mod plant;
pub mod point;
pub mod solver;

pub use collider::{Collider, SphereCollider};
pub use params::{LineStyle, VerletParams};
pub use plant::{Plant, Polyline};
pub use point::{RigidLine, VerletPoint};
pub use solver::VerletSolver;
