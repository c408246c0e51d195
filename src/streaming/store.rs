//! Loaded chunk table and the recycle pool
//!
//! Loaded chunks are keyed by coordinate. Unloaded chunk objects are parked
//! in a LIFO pool with no coordinate and handed out again on the next load,
//! keeping their mesh buffers.

use std::collections::HashMap;

use super::chunk::{Chunk, ChunkCoord, ChunkObjectId};

#[derive(Default)]
pub struct ChunkStore {
    loaded: HashMap<ChunkCoord, Chunk>,
    pool: Vec<Chunk>,
    next_id: u32,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.loaded.get(&coord)
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.loaded.get_mut(&coord)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    /// Number of loaded chunks
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Number of parked chunk objects
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Chunk objects ever constructed
    pub fn created(&self) -> u32 {
        self.next_id
    }

    /// Loaded coordinates, sorted for deterministic iteration
    pub fn coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.loaded.keys().copied().collect();
        coords.sort();
        coords
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
        self.loaded.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChunkCoord, &mut Chunk)> {
        self.loaded.iter_mut()
    }

    /// Take a parked object, or construct one. The flag is true for a new object.
    pub fn acquire(&mut self) -> (Chunk, bool) {
        match self.pool.pop() {
            Some(chunk) => (chunk, false),
            None => {
                let id = ChunkObjectId(self.next_id);
                self.next_id += 1;
                (Chunk::new(id), true)
            }
        }
    }

    /// Register `chunk` as loaded at `coord`
    pub fn insert(&mut self, coord: ChunkCoord, mut chunk: Chunk) {
        chunk.coord = Some(coord);
        chunk.active = true;
        if let Some(previous) = self.loaded.insert(coord, chunk) {
            log::warn!("Chunk {:?} loaded twice; recycling object {:?}", coord, previous.id);
            self.park(previous);
        }
    }

    /// Unload `coord`: vegetation is destroyed and the object parked.
    /// Returns the recycled object's id.
    pub fn release(&mut self, coord: ChunkCoord) -> Option<ChunkObjectId> {
        let chunk = self.loaded.remove(&coord)?;
        let id = chunk.id;
        self.park(chunk);
        Some(id)
    }

    fn park(&mut self, mut chunk: Chunk) {
        chunk.clear_vegetation();
        chunk.mesh.clear();
        chunk.coord = None;
        chunk.active = false;
        self.pool.push(chunk);
    }
}
