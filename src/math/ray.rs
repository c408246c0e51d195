//! Ray type, hit records and the raycast query seam

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// Below this determinant a ray is treated as parallel to a triangle
const PARALLEL_EPSILON: f32 = 1e-8;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Precomputed 1/direction for fast AABB intersection
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(
                1.0 / direction.x,
                1.0 / direction.y,
                1.0 / direction.z,
            ),
        }
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Same direction, origin moved by `offset`
    pub fn translated(&self, offset: Vec3) -> Ray {
        Ray {
            origin: self.origin + offset,
            ..*self
        }
    }

    /// Ray-AABB intersection using slab method
    /// Returns Some((t_near, t_far)) if intersection, None otherwise
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let t1 = (aabb.min - self.origin) * self.inv_direction;
        let t2 = (aabb.max - self.origin) * self.inv_direction;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let t_near = t_min.x.max(t_min.y).max(t_min.z);
        let t_far = t_max.x.min(t_max.y).min(t_max.z);

        if t_near <= t_far && t_far >= 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }

    /// Double-sided ray-triangle intersection (Möller–Trumbore)
    /// Returns the ray parameter of the hit
    pub fn intersects_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}

/// What a raycast hit belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitTag {
    /// Streamed terrain chunk geometry
    Terrain,
    /// The tracked player entity
    Player,
    /// Any other host object, identified by a host-chosen id
    Other(u32),
}

/// Result of a successful raycast
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Unit surface normal at the hit
    pub normal: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
    pub tag: HitTag,
}

/// Step taken past a rejected hit before casting again
const PASS_THROUGH_EPSILON: f32 = 1e-3;

/// Rejected hits passed through before a filtered query gives up
const MAX_PASS_THROUGH: usize = 16;

/// Raycast query primitive supplied by the host or by loaded terrain
pub trait Raycaster {
    /// Nearest hit along `ray` within `max_distance`
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit>;

    /// Nearest hit whose tag `accept` allows
    ///
    /// Rejected hits are passed through: the ray is cast again from just
    /// beyond them. Distances are measured from the original origin.
    fn raycast_filtered(
        &self,
        ray: &Ray,
        max_distance: f32,
        accept: &dyn Fn(HitTag) -> bool,
    ) -> Option<RayHit> {
        let mut travelled = 0.0_f32;
        for _ in 0..MAX_PASS_THROUGH {
            let rest = ray.translated(ray.direction * travelled);
            let hit = self.raycast(&rest, max_distance - travelled)?;
            if accept(hit.tag) {
                return Some(RayHit {
                    distance: travelled + hit.distance,
                    ..hit
                });
            }
            travelled += hit.distance + PASS_THROUGH_EPSILON;
            if travelled > max_distance {
                return None;
            }
        }
        None
    }
}

/// Nearest of two optional hits
pub fn nearest(a: Option<RayHit>, b: Option<RayHit>) -> Option<RayHit> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.distance < a.distance { b } else { a }),
        (a, b) => a.or(b),
    }
}
