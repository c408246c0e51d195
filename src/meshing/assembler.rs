//! Turns a triangle soup into an indexed mesh
//!
//! Points are deduplicated on their exact bit patterns. Marching cubes
//! computes a shared edge identically in every cell that touches it, so no
//! epsilon welding is needed.

use std::collections::HashMap;

use glam::Vec3;

use super::marching_cubes::Triangle;
use super::mesh::Mesh;

/// Reusable vertex welder
#[derive(Default)]
pub struct MeshAssembler {
    lookup: HashMap<[u32; 3], u32>,
}

impl MeshAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh mesh from `triangles`
    pub fn assemble(&mut self, triangles: &[Triangle]) -> Mesh {
        let mut mesh = Mesh::new();
        self.assemble_into(triangles, &mut mesh);
        mesh
    }

    /// Replace the contents of `mesh` with `triangles`, reusing its buffers
    ///
    /// Vertices appear in first-sighting order. Each triangle is emitted as
    /// (a, c, b), flipping table winding to clockwise-from-water.
    pub fn assemble_into(&mut self, triangles: &[Triangle], mesh: &mut Mesh) {
        mesh.clear();
        self.lookup.clear();
        mesh.indices.reserve(triangles.len() * 3);

        for tri in triangles {
            for p in [tri.a, tri.c, tri.b] {
                let key = p.map(f32::to_bits);
                let index = *self.lookup.entry(key).or_insert_with(|| {
                    mesh.vertices.push(Vec3::from(p));
                    (mesh.vertices.len() - 1) as u32
                });
                mesh.indices.push(index);
            }
        }

        mesh.recalculate_normals();
        mesh.recalculate_bounds();
        log::trace!(
            "Assembled {} triangles into {} vertices",
            triangles.len(),
            mesh.vertices.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;
    use crate::meshing::marching_cubes::GridCell;

    fn soup() -> Vec<Triangle> {
        // Two neighbouring cells cut by the plane y = 0.5 (solid below)
        let values = [1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let left = GridCell::cube(Vec3::ZERO, 1.0, values);
        let right = GridCell::cube(Vec3::X, 1.0, values);
        left.triangles(0.5, true)
            .chain(right.triangles(0.5, true))
            .collect()
    }

    #[test]
    fn test_dedup_shared_edges() {
        let tris = soup();
        assert_eq!(tris.len(), 4);
        let mesh = MeshAssembler::new().assemble(&tris);
        // 2x1 quad strip: 6 unique corners
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices.len(), 12);
        assert_eq!(
            mesh.bounds,
            Aabb::new(Vec3::new(0.0, 0.5, 0.0), Vec3::new(2.0, 0.5, 1.0))
        );
    }

    #[test]
    fn test_emitted_winding_and_normals_face_water() {
        let tris = soup();
        let mesh = MeshAssembler::new().assemble(&tris);
        for n in &mesh.normals {
            assert!((*n - Vec3::Y).length() < 1e-5, "{n}");
        }
        for (emitted, tri) in mesh.triangles().zip(&tris) {
            assert_eq!(emitted, [tri.a, tri.c, tri.b].map(Vec3::from));
            assert!(Mesh::face_normal(emitted).y > 0.0);
        }
    }

    #[test]
    fn test_idempotent() {
        let tris = soup();
        let mut assembler = MeshAssembler::new();
        let first = assembler.assemble(&tris);
        let mut second = Mesh::new();
        assembler.assemble_into(&tris, &mut second);
        assert_eq!(first, second);

        // Reassembling the mesh's own triangles reproduces it
        let again: Vec<Triangle> = first
            .triangles()
            .map(|[a, b, c]| Triangle::new(a, c, b))
            .collect();
        assert_eq!(assembler.assemble(&again), first);
    }

    #[test]
    fn test_empty_input() {
        let mesh = MeshAssembler::new().assemble(&[]);
        assert!(mesh.is_empty());
        assert_eq!(mesh.bounds, Aabb::default());
    }
}
