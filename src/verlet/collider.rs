//! Host colliders that plant points are pushed away from

use glam::Vec3;

use crate::math::{Aabb, HitTag, Ray, RayHit, Raycaster};

/// A solid the solver can probe against
pub trait Collider: Raycaster {
    /// World-space bounds used for coarse overlap tests
    fn bounds(&self) -> Aabb;

    /// Nearest point of the collider to `p`; `p` itself when inside
    fn closest_point(&self, p: Vec3) -> Vec3;
}

/// Sphere proxy, the usual stand-in for the player's vehicle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereCollider {
    pub center: Vec3,
    pub radius: f32,
    pub tag: HitTag,
}

impl SphereCollider {
    pub fn new(center: Vec3, radius: f32, tag: HitTag) -> Self {
        Self { center, radius, tag }
    }
}

impl Raycaster for SphereCollider {
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        let oc = ray.origin - self.center;
        let b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t = if -b - sqrt_disc >= 0.0 { -b - sqrt_disc } else { -b + sqrt_disc };
        if t < 0.0 || t > max_distance {
            return None;
        }
        let point = ray.at(t);
        Some(RayHit {
            point,
            normal: (point - self.center).normalize_or_zero(),
            distance: t,
            tag: self.tag,
        })
    }
}

impl Collider for SphereCollider {
    fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.center, Vec3::splat(self.radius))
    }

    fn closest_point(&self, p: Vec3) -> Vec3 {
        let offset = p - self.center;
        if offset.length() <= self.radius {
            p
        } else {
            self.center + offset.normalize() * self.radius
        }
    }
}
