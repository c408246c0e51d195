//! Surface extraction strategies

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::types::Result;

use super::grid::DensityGrid;
use super::gpu::GpuExtractor;
use super::marching_cubes::Triangle;

/// Which strategy a world uses to march its chunks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Cpu,
    Gpu,
}

/// Per-extraction surface settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractSettings {
    pub threshold: f32,
    pub interpolate: bool,
}

/// Marches every cell of a density grid and returns the triangle soup
pub trait SurfaceExtractor {
    fn extract(&mut self, grid: &DensityGrid, settings: &ExtractSettings) -> Result<Vec<Triangle>>;

    fn name(&self) -> &'static str;
}

/// Table-driven marching cubes on the CPU, one rayon task per z slice
///
/// Output order is z, y, x, then table order within a cell.
#[derive(Default)]
pub struct CpuExtractor;

impl CpuExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SurfaceExtractor for CpuExtractor {
    fn extract(&mut self, grid: &DensityGrid, settings: &ExtractSettings) -> Result<Vec<Triangle>> {
        let cells = grid.layout().cells;
        let slices: Vec<Vec<Triangle>> = (0..cells.z)
            .into_par_iter()
            .map(|z| {
                let mut out = Vec::new();
                for y in 0..cells.y {
                    for x in 0..cells.x {
                        let cell = grid.cell(x, y, z);
                        out.extend(cell.triangles(settings.threshold, settings.interpolate));
                    }
                }
                out
            })
            .collect();
        Ok(slices.concat())
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

/// Build the extractor for `kind`, falling back to the CPU if no GPU is usable
pub fn create_extractor(kind: ExtractorKind) -> Box<dyn SurfaceExtractor + Send> {
    match kind {
        ExtractorKind::Cpu => Box::new(CpuExtractor::new()),
        ExtractorKind::Gpu => match GpuExtractor::new() {
            Ok(gpu) => {
                log::info!("Using GPU surface extraction");
                Box::new(gpu)
            }
            Err(e) => {
                log::warn!("GPU extraction unavailable ({e}), falling back to CPU");
                Box::new(CpuExtractor::new())
            }
        },
    }
}
