//! Iso-surface extraction: lattice sampling, marching cubes and mesh assembly

pub mod assembler;
pub mod extractor;
pub mod gpu;
pub mod grid;
pub mod marching_cubes;
pub mod mesh;
pub mod tables;

pub use assembler::MeshAssembler;
pub use extractor::{create_extractor, CpuExtractor, ExtractSettings, ExtractorKind, SurfaceExtractor};
pub use gpu::GpuExtractor;
pub use grid::{DensityGrid, GridLayout};
pub use marching_cubes::{CellTriangles, GridCell, Triangle};
pub use mesh::Mesh;
