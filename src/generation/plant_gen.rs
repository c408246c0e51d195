//! Plant topology generator: branches, points and rigid lines.
//!
//! A plant is a root stalk with recursively spawned side branches. Every
//! branch owns a contiguous run of points; children are generated depth-first
//! right after their parent, so the branch table doubles as the render index.

use std::ops::Range;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::verlet::point::{RigidLine, VerletPoint};
use crate::verlet::solver::random_unit;

/// Shape parameters for generated plants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantParams {
    /// Points on the root stalk.
    pub main_branch_points: usize,
    /// Branch orders allowed; the root is order 0.
    pub max_branch_order: u32,
    /// Each child has `floor(parent_points / ratio)` points.
    pub point_halving_ratio: f32,
    /// Rest distance between root stalk points.
    pub point_distance: f32,
    /// Children are `1 + growth` times more spread out than their parent.
    pub distance_growth: f32,
    /// Gap between an attachment point and its child's first point.
    pub attach_distance: f32,
    /// Chance that an eligible point spawns a child.
    pub branching_probability: f32,
    /// First point index (within a branch) allowed to spawn children.
    pub min_branch_point: usize,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            main_branch_points: 50,
            max_branch_order: 3,
            point_halving_ratio: 2.0,
            point_distance: 1.0,
            distance_growth: 0.2,
            attach_distance: 0.2,
            branching_probability: 0.4,
            min_branch_point: 1,
        }
    }
}

/// A child branch hanging off a parent point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Absolute index of the parent point.
    pub point: usize,
    /// Index of the child in the branch table.
    pub child: usize,
}

/// One branch: a contiguous run of points joined by rigid lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub first_point: usize,
    pub point_count: usize,
    pub order: u32,
    /// Parent index in the branch table; `None` for the root.
    pub parent: Option<usize>,
    /// Parent point this branch hangs from.
    pub attach_point: Option<usize>,
    pub rest_distance: f32,
    pub attachments: Vec<Attachment>,
}

impl Branch {
    pub fn point_range(&self) -> Range<usize> {
        self.first_point..self.first_point + self.point_count
    }
}

/// Everything a plant's solver and renderers need, built in one pass.
#[derive(Clone, Debug, Default)]
pub struct PlantTopology {
    pub points: Vec<VerletPoint>,
    pub lines: Vec<RigidLine>,
    pub branches: Vec<Branch>,
}

/// Where and how a branch grows.
struct Sprout {
    parent: Option<usize>,
    attach_point: Option<usize>,
    start: Vec3,
    direction: Vec3,
    point_count: usize,
    rest_distance: f32,
    order: u32,
}

/// Builds plant topologies from [`PlantParams`].
pub struct PlantGenerator {
    params: PlantParams,
}

impl PlantGenerator {
    pub fn new(params: PlantParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PlantParams {
        &self.params
    }

    /// Generate a plant rooted at `base`; the same seed gives the same plant.
    pub fn generate(&self, base: Vec3, seed: u64) -> PlantTopology {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut topology = PlantTopology::default();
        let root = Sprout {
            parent: None,
            attach_point: None,
            start: base,
            direction: Vec3::Y,
            point_count: self.params.main_branch_points.max(1),
            rest_distance: self.params.point_distance,
            order: 0,
        };
        self.grow(&mut topology, &mut rng, root);
        log::trace!(
            "Generated plant: {} branches, {} points",
            topology.branches.len(),
            topology.points.len()
        );
        topology
    }

    /// Append a branch and, depth-first, its children. Returns the branch index.
    fn grow(&self, topology: &mut PlantTopology, rng: &mut ChaCha8Rng, sprout: Sprout) -> usize {
        let index = topology.branches.len();
        let first = topology.points.len();
        let count = sprout.point_count;

        for i in 0..count {
            let pos = sprout.start + sprout.direction * (sprout.rest_distance * i as f32);
            let point = if sprout.parent.is_none() && i == 0 {
                VerletPoint::locked(pos)
            } else {
                VerletPoint::new(pos)
            };
            topology.points.push(point);
        }
        for i in 1..count {
            topology.lines.push(RigidLine::new(first + i - 1, first + i, sprout.rest_distance));
        }
        if let Some(attach) = sprout.attach_point {
            topology.lines.push(RigidLine::new(attach, first, self.params.attach_distance));
        }

        topology.branches.push(Branch {
            first_point: first,
            point_count: count,
            order: sprout.order,
            parent: sprout.parent,
            attach_point: sprout.attach_point,
            rest_distance: sprout.rest_distance,
            attachments: Vec::new(),
        });

        let child_count = (count as f32 / self.params.point_halving_ratio).floor() as usize;
        if sprout.order + 1 >= self.params.max_branch_order || child_count < 2 {
            return index;
        }

        let probability = self.params.branching_probability.clamp(0.0, 1.0) as f64;
        for relative in self.params.min_branch_point..count {
            if !rng.gen_bool(probability) {
                continue;
            }
            let point = first + relative;
            let direction = (random_unit(rng) + Vec3::Y).try_normalize().unwrap_or(Vec3::Y);
            let child = Sprout {
                parent: Some(index),
                attach_point: Some(point),
                start: topology.points[point].pos + direction * self.params.attach_distance,
                direction,
                point_count: child_count,
                rest_distance: sprout.rest_distance * (1.0 + self.params.distance_growth),
                order: sprout.order + 1,
            };
            let child = self.grow(topology, rng, child);
            topology.branches[index].attachments.push(Attachment { point, child });
        }
        index
    }
}
