use crate::terrain::NoiseConfig;
use itertools::iproduct;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The quintic smoothstep `6t⁵ - 15t⁴ + 10t³`.
#[inline]
pub(crate) fn ease(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Value noise on a coarse random lattice, sampled with eased bilinear interpolation.
pub(crate) struct ValueNoise {
    lattice: Array2<f32>,
    cell_count: usize,
    cell_size: f32,
}

impl ValueNoise {
    /// Creates the lattice covering `size` samples, with one lattice cell per `cell_size` samples.
    pub(crate) fn new(size: u32, config: &NoiseConfig) -> Self {
        let cell_size = config.cell_size.clamp(1, size.max(1));
        let cell_count = (size / cell_size).max(1) as usize;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let lattice = Array2::from_shape_simple_fn((cell_count + 1, cell_count + 1), || {
            rng.random_range(0.0..1.0) * config.amplitude
        });

        Self {
            lattice,
            cell_count,
            cell_size: cell_size as f32,
        }
    }

    /// Samples the noise at the sample position `(x, y)`.
    pub(crate) fn sample(&self, x: f32, y: f32) -> f32 {
        let x = x / self.cell_size;
        let y = y / self.cell_size;

        // the last lattice cell also covers the overhanging edge
        let i = (x.floor() as usize).min(self.cell_count - 1);
        let k = (y.floor() as usize).min(self.cell_count - 1);

        let u = ease((x - i as f32).clamp(0.0, 1.0));
        let v = ease((y - k as f32).clamp(0.0, 1.0));

        let a = self.lattice[[k, i]];
        let b = self.lattice[[k, i + 1]];
        let c = self.lattice[[k + 1, i]];
        let d = self.lattice[[k + 1, i + 1]];

        let top = a + (b - a) * u;
        let bottom = c + (d - c) * u;

        top + (bottom - top) * v
    }

    /// Fills a `size`x`size` raster, indexed by `[y, x]`.
    pub(crate) fn raster(&self, size: u32) -> Array2<f32> {
        let size = size as usize;
        let mut raster = Array2::zeros((size, size));

        for (y, x) in iproduct!(0..size, 0..size) {
            raster[[y, x]] = self.sample(x as f32, y as f32).clamp(0.0, 1.0);
        }

        raster
    }
}
