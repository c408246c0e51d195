//! Simulation and line rendering parameters

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Verlet solver tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerletParams {
    /// Per-axis gravity; positive y floats plants upward like buoyancy
    pub gravity: Vec3,
    /// Fraction of implied velocity kept each tick
    pub friction: f32,
    /// Magnitude of the random drift added each tick
    pub jitter: f32,
    /// Constraint relaxation sweeps per tick
    pub iterations: u32,
    /// Push-out distance when a probe point overlaps a collider
    pub probe_distance: f32,
}

impl Default for VerletParams {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.001, 0.0),
            friction: 0.99,
            jitter: 0.05,
            iterations: 5,
            probe_distance: 0.4,
        }
    }
}

/// Base widths of a plant's branch polylines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStyle {
    pub start_width: f32,
    pub end_width: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            start_width: 1.0,
            end_width: 0.6,
        }
    }
}

impl LineStyle {
    /// Start and end widths for a branch of `order`
    ///
    /// Each order shrinks by `end_width / start_width`, so a child starts
    /// where its parent order ends.
    pub fn widths_for_order(&self, order: u32) -> (f32, f32) {
        let ratio = if self.start_width > 0.0 {
            self.end_width / self.start_width
        } else {
            0.0
        };
        let start = self.start_width * ratio.powi(order as i32);
        (start, start * ratio)
    }
}
