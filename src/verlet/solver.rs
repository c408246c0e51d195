//! Position-based (Verlet) constraint solver
//!
//! Each tick integrates unlocked points, then relaxes every rigid line a
//! fixed number of Gauss-Seidel sweeps. Constraints are only approximately
//! satisfied per tick and tighten over following ticks.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::math::{Aabb, Ray};

use super::collider::Collider;
use super::params::VerletParams;
use super::point::{RigidLine, VerletPoint};

/// Below this separation a line's direction is replaced by a random one
const MIN_DISTANCE: f32 = 1e-3;

/// Simulates one fixed set of points and lines
pub struct VerletSolver {
    points: Vec<VerletPoint>,
    lines: Vec<RigidLine>,
    /// Points tested against colliders: every point unlocked at construction
    probes: Vec<usize>,
    params: VerletParams,
    rng: ChaCha8Rng,
    bounds: Aabb,
}

impl VerletSolver {
    pub fn new(points: Vec<VerletPoint>, lines: Vec<RigidLine>, params: VerletParams, seed: u64) -> Self {
        let probes = points
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.locked)
            .map(|(i, _)| i)
            .collect();
        let mut solver = Self {
            points,
            lines,
            probes,
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
            bounds: Aabb::default(),
        };
        solver.refresh_bounds();
        solver
    }

    pub fn points(&self) -> &[VerletPoint] {
        &self.points
    }

    pub fn lines(&self) -> &[RigidLine] {
        &self.lines
    }

    pub fn probes(&self) -> &[usize] {
        &self.probes
    }

    pub fn params(&self) -> &VerletParams {
        &self.params
    }

    /// Bounds of all points as of the last tick
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// One fixed-step tick: integrate, relax `iterations` times, refresh bounds
    pub fn step(&mut self) {
        self.integrate();
        for _ in 0..self.params.iterations {
            self.relax();
        }
        self.refresh_bounds();
    }

    /// Move unlocked points by implied velocity, jitter and height-damped gravity
    pub fn integrate(&mut self) {
        let VerletParams { gravity, friction, jitter, .. } = self.params;
        for i in 0..self.points.len() {
            if self.points[i].locked {
                continue;
            }
            let drift = random_unit(&mut self.rng) * jitter;
            let p = &mut self.points[i];
            let velocity = p.velocity() * friction + drift;
            p.old_pos = p.pos;
            p.pos += velocity;
            p.pos += damped_gravity(gravity, p.pos.y);
        }
    }

    /// One Gauss-Seidel sweep over every rigid line
    pub fn relax(&mut self) {
        for line in &self.lines {
            let (a, b) = (line.a(), line.b());
            let (pa, pb) = (self.points[a], self.points[b]);
            let (wa, wb) = match (pa.locked, pb.locked) {
                (true, true) => continue,
                (true, false) => (0.0, 1.0),
                (false, true) => (1.0, 0.0),
                (false, false) => (0.5, 0.5),
            };

            let delta = pb.pos - pa.pos;
            let distance = delta.length();
            let (dir, distance) = if distance < MIN_DISTANCE || !distance.is_finite() {
                (random_unit(&mut self.rng), 0.0)
            } else {
                (delta / distance, distance)
            };

            let correction = dir * (line.rest() - distance);
            self.points[a].pos -= correction * wa;
            self.points[b].pos += correction * wb;
        }
    }

    /// Push probe points that come within `probe_distance` of `collider`
    ///
    /// Returns how many points were pushed.
    pub fn resolve_collision(&mut self, collider: &dyn Collider) -> usize {
        let reach = self.params.probe_distance;
        let mut pushed = 0;
        for &i in &self.probes {
            let p = self.points[i].pos;
            let target = collider.closest_point(p);
            let toward = target - p;
            // Inside the collider: no usable direction
            if toward.length_squared() <= f32::EPSILON {
                continue;
            }
            let ray = Ray::new(p, toward.normalize());
            if let Some(hit) = collider.raycast(&ray, reach) {
                self.points[i].pos += hit.normal * reach;
                pushed += 1;
            }
        }
        if pushed > 0 {
            self.refresh_bounds();
        }
        pushed
    }

    fn refresh_bounds(&mut self) {
        self.bounds = Aabb::from_points(self.points.iter().map(|p| p.pos)).unwrap_or_default();
    }
}

/// Gravity weakening with height: `g / (1 + |g| * h)` per axis, `h = max(0, y)`
fn damped_gravity(gravity: Vec3, y: f32) -> Vec3 {
    let h = if y.is_finite() { y.max(0.0) } else { 0.0 };
    let axis = |g: f32| if g == 0.0 { 0.0 } else { g / (1.0 + g.abs() * h) };
    Vec3::new(axis(gravity.x), axis(gravity.y), axis(gravity.z))
}

/// Uniformly distributed unit vector
pub(crate) fn random_unit<R: Rng>(rng: &mut R) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta: f32 = rng.gen_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::HitTag;
    use crate::verlet::collider::SphereCollider;

    fn still() -> VerletParams {
        VerletParams {
            gravity: Vec3::ZERO,
            friction: 0.0,
            jitter: 0.0,
            iterations: 5,
            probe_distance: 0.4,
        }
    }

    #[test]
    fn test_two_point_converges_to_rest() {
        let points = vec![VerletPoint::locked(Vec3::ZERO), VerletPoint::new(Vec3::new(0.3, 3.0, -0.2))];
        let mut solver = VerletSolver::new(points, vec![RigidLine::new(0, 1, 1.0)], still(), 1);
        for _ in 0..10 {
            solver.step();
        }
        let d = solver.points()[0].pos.distance(solver.points()[1].pos);
        assert!((d - 1.0).abs() < 1e-4, "distance {d}");
        assert_eq!(solver.points()[0].pos, Vec3::ZERO);
    }

    #[test]
    fn test_free_pair_splits_correction() {
        let points = vec![VerletPoint::new(Vec3::ZERO), VerletPoint::new(Vec3::new(3.0, 0.0, 0.0))];
        let mut solver = VerletSolver::new(points, vec![RigidLine::new(0, 1, 1.0)], still(), 1);
        solver.relax();
        assert!((solver.points()[0].pos - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
        assert!((solver.points()[1].pos - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_chain_length_settles() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut points = vec![VerletPoint::locked(Vec3::ZERO)];
        for _ in 1..5 {
            let p = Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
            points.push(VerletPoint::new(p));
        }
        let lines = (0..4).map(|i| RigidLine::new(i, i + 1, 1.0)).collect();
        let mut solver = VerletSolver::new(points, lines, still(), 5);
        for _ in 0..200 {
            solver.step();
        }
        let total: f32 = solver.points().windows(2).map(|w| w[0].pos.distance(w[1].pos)).sum();
        assert!((total - 4.0).abs() < 1e-2, "length {total}");
    }

    #[test]
    fn test_coincident_points_separate() {
        let points = vec![VerletPoint::locked(Vec3::ONE), VerletPoint::new(Vec3::ONE)];
        let mut solver = VerletSolver::new(points, vec![RigidLine::new(0, 1, 0.5)], still(), 3);
        solver.step();
        let d = solver.points()[0].pos.distance(solver.points()[1].pos);
        assert!((d - 0.5).abs() < 1e-4, "distance {d}");
    }

    #[test]
    fn test_extreme_heights_stay_finite() {
        let params = VerletParams { gravity: Vec3::new(0.0, 0.5, -0.2), ..VerletParams::default() };
        let points = vec![
            VerletPoint::locked(Vec3::new(0.0, 1e30, 0.0)),
            VerletPoint::new(Vec3::new(0.0, 1e30, 0.0)),
            VerletPoint::new(Vec3::new(0.0, -1e30, 0.0)),
            VerletPoint::new(Vec3::new(0.0, -1e6, 0.0)),
        ];
        let lines = vec![RigidLine::new(0, 1, 1.0), RigidLine::new(2, 3, 1.0)];
        let mut solver = VerletSolver::new(points, lines, params, 11);
        for _ in 0..50 {
            solver.step();
        }
        for p in solver.points() {
            assert!(p.pos.is_finite(), "{:?}", p.pos);
        }
    }

    #[test]
    fn test_damped_gravity() {
        let g = Vec3::new(0.0, 0.001, 0.0);
        assert_eq!(damped_gravity(g, -5.0), g);
        assert!(damped_gravity(g, 1000.0).y < g.y);
        assert_eq!(damped_gravity(Vec3::ZERO, f32::INFINITY), Vec3::ZERO);
        assert_eq!(damped_gravity(Vec3::new(-1.0, 0.0, 0.0), f32::NAN).x, -1.0);
    }

    #[test]
    fn test_locked_points_do_not_move() {
        let params = VerletParams { jitter: 1.0, ..VerletParams::default() };
        let points = vec![VerletPoint::locked(Vec3::ZERO), VerletPoint::new(Vec3::Y)];
        let mut solver = VerletSolver::new(points, vec![RigidLine::new(0, 1, 1.0)], params, 8);
        for _ in 0..20 {
            solver.step();
        }
        assert_eq!(solver.points()[0].pos, Vec3::ZERO);
        assert_eq!(solver.probes(), &[1]);
    }

    #[test]
    fn test_probe_pushes_away_from_collider() {
        let points = vec![VerletPoint::locked(Vec3::ZERO), VerletPoint::new(Vec3::new(0.0, 2.2, 0.0))];
        let mut solver = VerletSolver::new(points, vec![RigidLine::new(0, 1, 2.2)], still(), 2);
        // Surface of the sphere sits 0.2 above the probe
        let sphere = SphereCollider::new(Vec3::new(0.0, 3.4, 0.0), 1.0, HitTag::Player);
        assert_eq!(solver.resolve_collision(&sphere), 1);
        let p = solver.points()[1].pos;
        assert!((p - Vec3::new(0.0, 1.8, 0.0)).length() < 1e-5, "{p}");

        // Out of reach now
        assert_eq!(solver.resolve_collision(&sphere), 0);
    }

    #[test]
    fn test_bounds_follow_points() {
        let points = vec![VerletPoint::locked(Vec3::ZERO), VerletPoint::new(Vec3::new(0.0, 3.0, 0.0))];
        let mut solver = VerletSolver::new(points, vec![RigidLine::new(0, 1, 1.0)], still(), 1);
        assert_eq!(solver.bounds().max.y, 3.0);
        solver.step();
        assert!((solver.bounds().max.y - 1.0).abs() < 1e-5);
    }
}
