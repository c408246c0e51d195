//! Scalar density fields sampled by the surface extractor

use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::config::TerrainConfig;

/// Deterministic scalar field over world space.
///
/// Values above the iso threshold are solid rock, values at or below it are
/// open water. Implementations must be continuous so neighbouring lattice
/// points produce a stable surface.
pub trait DensityField: Send + Sync {
    fn sample(&self, world: Vec3) -> f32;
}

/// Fractal Perlin noise with an optional height bias ("squish")
pub struct NoiseDensity {
    noise: Fbm<Perlin>,
    noise_scale: f32,
    /// (column height, strength)
    squish: Option<(f32, f32)>,
}

impl NoiseDensity {
    /// Create a density field for terrain columns of `column_height` world units
    pub fn new(seed: u32, config: &TerrainConfig, column_height: f32) -> Self {
        let noise = Fbm::<Perlin>::new(seed)
            .set_octaves(config.octaves.max(1) as usize);

        let squish = (config.squish && column_height > 0.0)
            .then_some((column_height, config.squish_strength));

        Self {
            noise,
            noise_scale: config.noise_scale,
            squish,
        }
    }

    /// Noise remapped from [-1, 1] to [0, 1]
    fn noise01(&self, p: Vec3) -> f32 {
        let s = self.noise_scale as f64;
        let n = self.noise.get([p.x as f64 * s, p.y as f64 * s, p.z as f64 * s]);
        (((n + 1.0) * 0.5) as f32).clamp(0.0, 1.0)
    }
}

impl DensityField for NoiseDensity {
    fn sample(&self, world: Vec3) -> f32 {
        let base = self.noise01(world);
        match self.squish {
            // Solid bias at the bottom of the column, open bias at the top
            Some((height, strength)) => {
                let h = (world.y / height).clamp(0.0, 1.0);
                base + (0.5 - h) * strength
            }
            None => base,
        }
    }
}

/// Adapts a closure into a density field
pub struct FnDensity<F>(pub F);

impl<F> FnDensity<F>
where
    F: Fn(Vec3) -> f32 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DensityField for FnDensity<F>
where
    F: Fn(Vec3) -> f32 + Send + Sync,
{
    fn sample(&self, world: Vec3) -> f32 {
        (self.0)(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(squish: bool) -> NoiseDensity {
        let config = TerrainConfig { squish, ..Default::default() };
        NoiseDensity::new(7, &config, 30.0)
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let a = field(true);
        let b = field(true);
        for i in 0..50 {
            let p = Vec3::new(i as f32 * 0.37, i as f32 * 0.11, -(i as f32) * 0.53);
            assert_eq!(a.sample(p), b.sample(p));
        }
    }

    #[test]
    fn test_continuity() {
        let f = field(true);
        let eps = 1e-3;
        for i in 0..50 {
            let p = Vec3::new(i as f32 * 1.7, 3.0 + i as f32 * 0.4, i as f32 * 0.9);
            let d = (f.sample(p) - f.sample(p + Vec3::splat(eps))).abs();
            assert!(d < 0.01, "jump of {d} at {p}");
        }
    }

    #[test]
    fn test_squish_biases_floor_and_ceiling() {
        let f = field(true);
        let threshold = TerrainConfig::default().threshold;
        // Noise contributes [0, 1]; a full-strength bias pins the extremes
        for i in 0..20 {
            let x = i as f32 * 2.3;
            assert!(f.sample(Vec3::new(x, 0.0, x)) >= threshold);
            assert!(f.sample(Vec3::new(x, 30.0, x)) <= threshold);
        }
    }

    #[test]
    fn test_unsquished_range() {
        let f = field(false);
        for i in 0..100 {
            let v = f.sample(Vec3::new(i as f32 * 0.77, i as f32 * 1.3, 5.0));
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_fn_density() {
        let plane = FnDensity::new(|p: Vec3| 1.0 - p.y);
        assert_eq!(plane.sample(Vec3::new(4.0, 0.25, 9.0)), 0.75);
    }
}
