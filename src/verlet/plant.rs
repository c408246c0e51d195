//! A simulated plant and its per-branch line render handoff

use glam::Vec3;

use crate::generation::plant_gen::{Branch, PlantTopology};
use crate::math::Aabb;

use super::collider::Collider;
use super::params::{LineStyle, VerletParams};
use super::solver::VerletSolver;

/// Point positions and widths for one branch's line renderer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyline {
    pub positions: Vec<Vec3>,
    pub start_width: f32,
    pub end_width: f32,
}

impl Polyline {
    /// Sum of segment lengths
    pub fn length(&self) -> f32 {
        self.positions.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// One plant: its solver, branch table and polylines
pub struct Plant {
    solver: VerletSolver,
    branches: Vec<Branch>,
    polylines: Vec<Polyline>,
}

impl Plant {
    pub fn new(topology: PlantTopology, params: VerletParams, style: &LineStyle, seed: u64) -> Self {
        let PlantTopology { points, lines, branches } = topology;
        let polylines = branches
            .iter()
            .map(|b| {
                let (start_width, end_width) = style.widths_for_order(b.order);
                Polyline {
                    positions: Vec::with_capacity(b.point_count + 1),
                    start_width,
                    end_width,
                }
            })
            .collect();
        let mut plant = Self {
            solver: VerletSolver::new(points, lines, params, seed),
            branches,
            polylines,
        };
        plant.refresh_polylines();
        plant
    }

    /// Fixed-step tick
    pub fn step(&mut self) {
        self.solver.step();
        self.refresh_polylines();
    }

    /// Push probe points out of `collider`; returns how many moved
    pub fn resolve_collision(&mut self, collider: &dyn Collider) -> usize {
        let pushed = self.solver.resolve_collision(collider);
        if pushed > 0 {
            self.refresh_polylines();
        }
        pushed
    }

    pub fn bounds(&self) -> Aabb {
        self.solver.bounds()
    }

    /// Base position (the locked root point)
    pub fn base(&self) -> Vec3 {
        self.solver.points().first().map(|p| p.pos).unwrap_or_default()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn polylines(&self) -> &[Polyline] {
        &self.polylines
    }

    pub fn solver(&self) -> &VerletSolver {
        &self.solver
    }

    pub fn point_count(&self) -> usize {
        self.solver.points().len()
    }

    /// Child branches start their line at the parent attachment point
    fn refresh_polylines(&mut self) {
        let points = self.solver.points();
        for (branch, line) in self.branches.iter().zip(&mut self.polylines) {
            line.positions.clear();
            if let Some(attach) = branch.attach_point {
                line.positions.push(points[attach].pos);
            }
            line.positions.extend(points[branch.point_range()].iter().map(|p| p.pos));
        }
    }
}
