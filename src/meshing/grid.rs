//! Density lattice for one chunk
//!
//! A chunk is marched over `(n + 1)^3` samples taken at the lattice points'
//! true world positions. Sampling happens once per regeneration, here, and
//! both extraction strategies read the same [`DensityGrid`].

use glam::{UVec3, Vec3};
use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::terrain::DensityField;

use super::marching_cubes::GridCell;
use super::tables::CORNER_OFFSETS;

/// Shape and placement of a chunk lattice
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    /// Cells per axis
    pub cells: UVec3,
    /// Distance between neighbouring lattice points
    pub spacing: f32,
    /// Minimum lattice corner relative to the chunk origin
    pub local_min: Vec3,
    /// Minimum lattice corner in world space
    pub world_min: Vec3,
}

impl GridLayout {
    /// Lattice for a chunk centred on `origin` with extent `scale`
    ///
    /// Each axis gets `round(scale * dots_per_unit)` cells (at least one),
    /// spaced `1 / dots_per_unit` apart.
    pub fn for_chunk(origin: Vec3, scale: Vec3, dots_per_unit: u32) -> Self {
        let dpu = dots_per_unit.max(1) as f32;
        let cells = (scale * dpu).round().max(Vec3::ONE).as_uvec3();
        let local_min = -scale * 0.5;
        Self {
            cells,
            spacing: 1.0 / dpu,
            local_min,
            world_min: origin + local_min,
        }
    }

    pub fn cell_count(&self) -> usize {
        (self.cells.x * self.cells.y * self.cells.z) as usize
    }

    /// Samples per axis
    pub fn sample_dims(&self) -> UVec3 {
        self.cells + UVec3::ONE
    }

    pub fn sample_count(&self) -> usize {
        let d = self.sample_dims();
        (d.x * d.y * d.z) as usize
    }

    /// Flat index of a lattice point, x fastest
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let d = self.sample_dims();
        (x + y * d.x + z * d.x * d.y) as usize
    }

    /// Chunk-local position of a lattice point
    pub fn local_point(&self, x: u32, y: u32, z: u32) -> Vec3 {
        self.local_min + UVec3::new(x, y, z).as_vec3() * self.spacing
    }

    /// World position of a lattice point
    pub fn world_point(&self, x: u32, y: u32, z: u32) -> Vec3 {
        self.world_min + UVec3::new(x, y, z).as_vec3() * self.spacing
    }

    fn on_boundary(&self, x: u32, y: u32, z: u32) -> bool {
        x == 0
            || y == 0
            || z == 0
            || x == self.cells.x
            || y == self.cells.y
            || z == self.cells.z
    }
}

/// Sampled density values over a [`GridLayout`]
#[derive(Clone, Debug)]
pub struct DensityGrid {
    layout: GridLayout,
    values: Vec<f32>,
}

impl DensityGrid {
    /// Sample `field` at every lattice point, one z slice per rayon task
    ///
    /// With `close_boundary`, every point on the outer shell is forced to
    /// `threshold - 1.0` so the extracted surface is sealed at chunk faces.
    pub fn sample(
        field: &dyn DensityField,
        layout: GridLayout,
        threshold: f32,
        close_boundary: bool,
    ) -> Self {
        let dims = layout.sample_dims();
        let slice_len = (dims.x * dims.y) as usize;
        let mut values = vec![0.0; layout.sample_count()];

        values
            .par_chunks_mut(slice_len)
            .enumerate()
            .for_each(|(z, slice)| {
                let z = z as u32;
                for y in 0..dims.y {
                    for x in 0..dims.x {
                        let i = (x + y * dims.x) as usize;
                        slice[i] = if close_boundary && layout.on_boundary(x, y, z) {
                            threshold - 1.0
                        } else {
                            field.sample(layout.world_point(x, y, z))
                        };
                    }
                }
            });

        Self { layout, values }
    }

    /// Wrap precomputed samples; the length must match the layout
    pub fn from_values(layout: GridLayout, values: Vec<f32>) -> Result<Self> {
        if values.len() != layout.sample_count() {
            return Err(Error::Meshing(format!(
                "grid {:?} needs {} samples, got {}",
                layout.cells,
                layout.sample_count(),
                values.len()
            )));
        }
        Ok(Self { layout, values })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn value(&self, x: u32, y: u32, z: u32) -> f32 {
        self.values[self.layout.index(x, y, z)]
    }

    /// The cube whose minimum corner is lattice point (x, y, z), in chunk-local space
    ///
    /// Corner positions come from global lattice indices so cells sharing an
    /// edge see exactly the same endpoints.
    pub fn cell(&self, x: u32, y: u32, z: u32) -> GridCell {
        let mut positions = [Vec3::ZERO; 8];
        let mut values = [0.0; 8];
        for (i, [dx, dy, dz]) in CORNER_OFFSETS.into_iter().enumerate() {
            let (cx, cy, cz) = (x + dx, y + dy, z + dz);
            positions[i] = self.layout.local_point(cx, cy, cz);
            values[i] = self.value(cx, cy, cz);
        }
        GridCell { positions, values }
    }
}
