//! Chunk streaming, pooling and vegetation placement

pub mod chunk;
pub mod config;
pub mod manager;
pub mod sink;
pub mod store;
pub mod vegetation;

pub use chunk::{Chunk, ChunkCoord, ChunkObjectId, Treasure, Vegetation};
pub use config::{StreamingConfig, VegetationConfig};
pub use manager::{ChunkStreamer, StreamReport};
pub use sink::{MeshSink, NullSink};
pub use store::ChunkStore;
pub use vegetation::{SceneRaycaster, VegetationPlacer};
