//! Indexed triangle mesh handed to the host

use glam::Vec3;

use crate::math::{Aabb, Ray};

/// Indexed triangle mesh in chunk-local space
///
/// Triangles are wound clockwise seen from open water; `normals` point into
/// open water.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub normals: Vec<Vec3>,
    pub bounds: Aabb,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all geometry but keep allocations
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.normals.clear();
        self.bounds = Aabb::default();
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Triangles as index-order point triples
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [0, 1, 2].map(|k| self.vertices[t[k] as usize]))
    }

    /// Face normal of an index-order triple, facing open water
    pub fn face_normal([a, b, c]: [Vec3; 3]) -> Vec3 {
        (c - a).cross(b - a)
    }

    /// Area-weighted vertex normals
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for t in self.indices.chunks_exact(3) {
            let idx = [t[0] as usize, t[1] as usize, t[2] as usize];
            let n = Self::face_normal(idx.map(|i| self.vertices[i]));
            for i in idx {
                normals[i] += n;
            }
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        self.normals = normals;
    }

    pub fn recalculate_bounds(&mut self) {
        self.bounds = Aabb::from_points(self.vertices.iter().copied()).unwrap_or_default();
    }

    /// Nearest triangle hit of a chunk-local ray within `max_distance`
    ///
    /// Returns the hit distance and the unit face normal.
    pub fn raycast_local(&self, ray: &Ray, max_distance: f32) -> Option<(f32, Vec3)> {
        if self.is_empty() {
            return None;
        }
        match ray.intersects_aabb(&self.bounds.inflated(1e-4)) {
            Some((t_near, _)) if t_near <= max_distance => {}
            _ => return None,
        }

        let mut best: Option<(f32, Vec3)> = None;
        for tri in self.triangles() {
            let [a, b, c] = tri;
            let Some(t) = ray.intersects_triangle(a, b, c) else {
                continue;
            };
            if t > max_distance || best.is_some_and(|(bt, _)| bt <= t) {
                continue;
            }
            best = Some((t, Self::face_normal(tri).normalize_or_zero()));
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit quad in the y = 0 plane, wound so normals face +Y
    fn quad() -> Mesh {
        let mut mesh = Mesh {
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Default::default()
        };
        mesh.recalculate_normals();
        mesh.recalculate_bounds();
        mesh
    }

    #[test]
    fn test_normals_and_bounds() {
        let mesh = quad();
        for n in &mesh.normals {
            assert!((*n - Vec3::Y).length() < 1e-6, "{n}");
        }
        assert_eq!(mesh.bounds, Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)));
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_raycast_local() {
        let mesh = quad();
        let ray = Ray::new(Vec3::new(0.3, 5.0, 0.6), Vec3::NEG_Y);
        let (t, n) = mesh.raycast_local(&ray, 10.0).unwrap();
        assert!((t - 5.0).abs() < 1e-5);
        assert!((n - Vec3::Y).length() < 1e-6);

        assert!(mesh.raycast_local(&ray, 4.0).is_none());
        let outside = Ray::new(Vec3::new(3.0, 5.0, 0.5), Vec3::NEG_Y);
        assert!(mesh.raycast_local(&outside, 10.0).is_none());
    }

    #[test]
    fn test_clear() {
        let mut mesh = quad();
        mesh.clear();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.bounds, Aabb::default());
    }
}
