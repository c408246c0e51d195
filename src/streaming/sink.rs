//! Host handoff for chunk render and collision meshes

use glam::Vec3;

use crate::meshing::Mesh;

use super::chunk::ChunkObjectId;

/// Receives chunk geometry as objects are (re)meshed and recycled
pub trait MeshSink {
    /// `object` now shows `mesh` at `origin`; attach collision if `collidable`
    fn upload(&mut self, object: ChunkObjectId, origin: Vec3, mesh: &Mesh, collidable: bool);

    /// `object` went back to the pool; hide it
    fn release(&mut self, object: ChunkObjectId);
}

/// Sink for headless use
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl MeshSink for NullSink {
    fn upload(&mut self, _object: ChunkObjectId, _origin: Vec3, _mesh: &Mesh, _collidable: bool) {}

    fn release(&mut self, _object: ChunkObjectId) {}
}
