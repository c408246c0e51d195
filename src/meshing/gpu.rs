//! Compute-shader marching cubes
//!
//! The CPU-sampled lattice and the flattened triangle table are uploaded,
//! one invocation marches one cell, and triangles are appended through an
//! atomic counter. Readback blocks until the GPU is done: first the counter,
//! then only the triangles that were written.
//!
//! Triangle order follows invocation scheduling and is not deterministic.

use bytemuck::{Pod, Zeroable};

use crate::core::error::Error;
use crate::core::types::Result;

use super::extractor::{ExtractSettings, SurfaceExtractor};
use super::grid::DensityGrid;
use super::marching_cubes::Triangle;
use super::tables::TRI_TABLE;

const WORKGROUP_SIZE: u32 = 4;
const MAX_TRIANGLES_PER_CELL: u64 = 5;
const TRIANGLE_BYTES: u64 = std::mem::size_of::<Triangle>() as u64;

/// Uniform block, laid out to match `Params` in the shader
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct MarchParams {
    cells: [u32; 3],
    capacity: u32,
    local_min: [f32; 3],
    spacing: f32,
    threshold: f32,
    interpolate: u32,
    _pad: [u32; 2],
}

/// Buffers sized for one lattice shape, rebuilt when the shape changes
struct MarchBuffers {
    sample_count: usize,
    capacity: u64,
    values: wgpu::Buffer,
    counter: wgpu::Buffer,
    counter_staging: wgpu::Buffer,
    triangles: wgpu::Buffer,
    triangle_staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Headless wgpu surface extractor
pub struct GpuExtractor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    tri_table: wgpu::Buffer,
    max_binding_size: u64,
    buffers: Option<MarchBuffers>,
}

impl GpuExtractor {
    /// Request a headless adapter and device and build the pipeline
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("seabed_meshing_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                    max_buffer_size: adapter_limits.max_buffer_size,
                    ..Default::default()
                },
                memory_hints: wgpu::MemoryHints::Performance,
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        log::info!(
            "Meshing adapter: {} (max storage binding {}MB)",
            adapter.get_info().name,
            adapter_limits.max_storage_buffer_binding_size / 1024 / 1024
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("marching_cubes_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/marching_cubes.wgsl").into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("marching_cubes_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, false),
                storage(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("marching_cubes_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("marching_cubes_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_params"),
            size: std::mem::size_of::<MarchParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let flat_table: Vec<i32> = TRI_TABLE.iter().flatten().map(|&e| e as i32).collect();
        let tri_table = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_tri_table"),
            size: (flat_table.len() * std::mem::size_of::<i32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&tri_table, 0, bytemuck::cast_slice(&flat_table));

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            params,
            tri_table,
            max_binding_size: adapter_limits.max_storage_buffer_binding_size as u64,
            buffers: None,
        })
    }

    /// Triangle capacity for a lattice with `cells` cells
    pub fn capacity_for(&self, cells: usize) -> u64 {
        (cells as u64 * MAX_TRIANGLES_PER_CELL).min(self.max_binding_size / TRIANGLE_BYTES)
    }

    fn ensure_buffers(&mut self, sample_count: usize, capacity: u64) {
        if let Some(b) = &self.buffers {
            if b.sample_count == sample_count && b.capacity == capacity {
                return;
            }
        }

        let device = &self.device;
        let values = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_values"),
            size: (sample_count * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_counter"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let counter_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_counter_staging"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // Never bind an empty buffer
        let triangle_bytes = capacity.max(1) * TRIANGLE_BYTES;
        let triangles = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_triangles"),
            size: triangle_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let triangle_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_cubes_triangle_staging"),
            size: triangle_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("marching_cubes_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: values.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: self.tri_table.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: counter.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: triangles.as_entire_binding() },
            ],
        });

        log::debug!(
            "Allocated GPU meshing buffers: {} samples, {} triangle capacity",
            sample_count,
            capacity
        );

        self.buffers = Some(MarchBuffers {
            sample_count,
            capacity,
            values,
            counter,
            counter_staging,
            triangles,
            triangle_staging,
            bind_group,
        });
    }

    /// Map `slice` for reading and wait for the GPU
    fn map_blocking(&self, slice: wgpu::BufferSlice<'_>) -> Result<()> {
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(format!("device poll failed: {e}")))?;
        rx.recv()
            .map_err(|e| Error::Gpu(format!("readback channel closed: {e}")))?
            .map_err(|e| Error::Gpu(format!("buffer map failed: {e}")))
    }
}

/// Triangles safe to read back when the shader reports `written`
///
/// The counter keeps growing past `capacity` while the buffer does not, so
/// the excess is dropped.
fn clamp_count(written: u64, capacity: u64) -> u64 {
    if written > capacity {
        log::error!(
            "GPU meshing produced {} triangles, capacity is {}; output truncated",
            written,
            capacity
        );
        capacity
    } else {
        written
    }
}

impl SurfaceExtractor for GpuExtractor {
    fn extract(&mut self, grid: &DensityGrid, settings: &ExtractSettings) -> Result<Vec<Triangle>> {
        let layout = *grid.layout();
        let capacity = self.capacity_for(layout.cell_count());
        self.ensure_buffers(layout.sample_count(), capacity);
        let Some(buffers) = &self.buffers else {
            return Err(Error::Gpu("meshing buffers missing".into()));
        };

        let params = MarchParams {
            cells: layout.cells.to_array(),
            capacity: capacity as u32,
            local_min: layout.local_min.to_array(),
            spacing: layout.spacing,
            threshold: settings.threshold,
            interpolate: settings.interpolate as u32,
            _pad: [0; 2],
        };
        self.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        self.queue.write_buffer(&buffers.values, 0, bytemuck::cast_slice(grid.values()));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("marching_cubes_encoder"),
        });
        encoder.clear_buffer(&buffers.counter, 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("marching_cubes_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            let groups = (layout.cells + (WORKGROUP_SIZE - 1)) / WORKGROUP_SIZE;
            pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }
        encoder.copy_buffer_to_buffer(
            &buffers.counter,
            0,
            &buffers.counter_staging,
            0,
            std::mem::size_of::<u32>() as u64,
        );
        self.queue.submit([encoder.finish()]);

        let counter_slice = buffers.counter_staging.slice(..);
        self.map_blocking(counter_slice)?;
        let written = {
            let data = counter_slice.get_mapped_range();
            let count: &[u32] = bytemuck::cast_slice(&data[..]);
            count[0] as u64
        };
        buffers.counter_staging.unmap();

        let count = clamp_count(written, capacity);
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = count * TRIANGLE_BYTES;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("marching_cubes_readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&buffers.triangles, 0, &buffers.triangle_staging, 0, bytes);
        self.queue.submit([encoder.finish()]);

        let triangle_slice = buffers.triangle_staging.slice(..bytes);
        self.map_blocking(triangle_slice)?;
        let triangles = {
            let data = triangle_slice.get_mapped_range();
            bytemuck::cast_slice::<u8, Triangle>(&data[..]).to_vec()
        };
        buffers.triangle_staging.unmap();

        log::trace!("GPU marched {} cells into {} triangles", layout.cell_count(), count);
        Ok(triangles)
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshing::extractor::CpuExtractor;
    use crate::meshing::grid::GridLayout;
    use crate::terrain::FnDensity;
    use glam::Vec3;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<MarchParams>(), 48);
        assert_eq!(TRIANGLE_BYTES, 36);
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(0, 40), 0);
        assert_eq!(clamp_count(17, 40), 17);
        assert_eq!(clamp_count(40, 40), 40);
        assert_eq!(clamp_count(41, 40), 40);
        assert_eq!(clamp_count(u32::MAX as u64, 40), 40);
        assert_eq!(clamp_count(3, 0), 0);
    }

    #[test]
    fn test_gpu_matches_cpu_triangle_count() {
        let Ok(mut gpu) = GpuExtractor::new() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let layout = GridLayout::for_chunk(Vec3::ZERO, Vec3::splat(8.0), 2);
        let grid = DensityGrid::sample(&FnDensity::new(|p: Vec3| 3.0 - p.length()), layout, 0.5, false);
        let settings = ExtractSettings { threshold: 0.5, interpolate: true };

        let cpu = CpuExtractor::new().extract(&grid, &settings).unwrap();
        let out = gpu.extract(&grid, &settings).unwrap();
        assert_eq!(out.len(), cpu.len());
        for tri in &out {
            for p in tri.points() {
                assert!((p.length() - 2.5).abs() < 0.2, "{p}");
            }
        }
    }
}
