//! Simulated points and the distance constraints between them

use glam::Vec3;

/// A simulated point; velocity is implied by `pos - old_pos`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerletPoint {
    pub pos: Vec3,
    pub old_pos: Vec3,
    /// Locked points never move
    pub locked: bool,
}

impl VerletPoint {
    /// A point at rest at `pos`
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            old_pos: pos,
            locked: false,
        }
    }

    pub fn locked(pos: Vec3) -> Self {
        Self {
            locked: true,
            ..Self::new(pos)
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.pos - self.old_pos
    }
}

/// Distance constraint between two points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidLine {
    a: usize,
    b: usize,
    rest: f32,
}

impl RigidLine {
    pub fn new(a: usize, b: usize, rest: f32) -> Self {
        Self { a, b, rest }
    }

    pub fn a(&self) -> usize {
        self.a
    }

    pub fn b(&self) -> usize {
        self.b
    }

    /// Target distance between the endpoints
    pub fn rest(&self) -> f32 {
        self.rest
    }
}
