use crate::{
    formats::read_height_map,
    math::TileKey,
    render::GridMesh,
    terrain::{LayerThresholds, TerrainConfig},
    terrain_data::{noise::ValueNoise, HeightRange},
};
use anyhow::{ensure, Context, Result};
use bevy::{
    log::{debug, info},
    math::Vec3,
    prelude::Image,
    render::{
        render_asset::RenderAssetUsages,
        render_resource::{Extent3d, TextureDimension, TextureFormat},
    },
};
use itertools::iproduct;
use ndarray::Array2;
use std::{path::Path, time::Instant};

/// The material class of a height sample, stored as its id in the layer raster.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MaterialLayer {
    Grass = 0,
    Sand = 1,
    Rock = 2,
}

impl MaterialLayer {
    pub fn classify(height: f32, thresholds: &LayerThresholds) -> Self {
        if height > thresholds.rock_above {
            Self::Rock
        } else if height < thresholds.sand_below {
            Self::Sand
        } else {
            Self::Grass
        }
    }
}

/// The authoritative raster of the terrain together with its derived data.
///
/// All rasters are indexed by `[y, x]`, where the raster x axis maps to the world x axis
/// and the raster y axis maps to the world z axis.
#[derive(Debug)]
pub struct HeightField {
    size: u32,
    levels: u32,
    grid_size: u32,
    height_scale: f32,
    terrain_size: f32,
    /// Normalized samples in `[0, 1]`.
    heights: Array2<f32>,
    normals: Array2<[u8; 4]>,
    layers: Array2<u8>,
    /// The height ranges of all tiles, indexed by level and then by `[y, x]`.
    ranges: Vec<Array2<HeightRange>>,
}

impl HeightField {
    /// Generates the height samples using seeded value noise.
    pub fn generate(size: u32, scale: f32, config: &TerrainConfig) -> Result<Self> {
        compute_levels(size, size, config.grid_size)?;

        let start = Instant::now();
        let samples = ValueNoise::new(size, &config.noise).raster(size);
        debug!("Generated {size}x{size} height samples in {:?}.", start.elapsed());

        Self::from_samples(samples, scale, config)
    }

    /// Loads the height samples from a raster file, the first channel is used as height.
    pub fn load(path: impl AsRef<Path>, scale: f32, config: &TerrainConfig) -> Result<Self> {
        let path = path.as_ref();
        let samples = read_height_map(path)
            .with_context(|| format!("failed to load height map {}", path.display()))?;

        Self::from_samples(samples, scale, config)
            .with_context(|| format!("invalid height map {}", path.display()))
    }

    /// Builds the normals, the material layers and the height ranges of all tiles
    /// from normalized height samples.
    pub fn from_samples(samples: Array2<f32>, scale: f32, config: &TerrainConfig) -> Result<Self> {
        let (height, width) = samples.dim();
        let levels = compute_levels(width as u32, height as u32, config.grid_size)?;
        ensure!(
            config.terrain_size > 0.0,
            "the terrain size has to be positive, got {}",
            config.terrain_size
        );

        let start = Instant::now();

        let mut height_field = Self {
            size: width as u32,
            levels,
            grid_size: config.grid_size,
            height_scale: scale,
            terrain_size: config.terrain_size,
            heights: samples,
            normals: Array2::default((0, 0)),
            layers: Array2::default((0, 0)),
            ranges: Vec::new(),
        };

        height_field.build_normals();
        height_field.build_layers(&config.layers);
        height_field.generate_tiles();

        info!(
            "Built height field of size {} with {} levels in {:?}.",
            height_field.size,
            levels + 1,
            start.elapsed()
        );

        Ok(height_field)
    }

    /// The amount of samples along one side.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The highest level of the quadtree, whose tiles map one grid cell to one sample.
    #[inline]
    pub fn max_level(&self) -> u32 {
        self.levels
    }

    #[inline]
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    #[inline]
    pub fn height_scale(&self) -> f32 {
        self.height_scale
    }

    #[inline]
    pub fn terrain_size(&self) -> f32 {
        self.terrain_size
    }

    /// The world distance between two neighbouring samples.
    #[inline]
    pub fn pixel_size(&self) -> f32 {
        self.terrain_size / self.size as f32
    }

    /// The world height of the sample at `(x, y)`.
    #[inline]
    pub fn height_at(&self, x: u32, y: u32) -> f32 {
        self.heights[[y as usize, x as usize]] * self.height_scale
    }

    pub fn normal_at(&self, x: u32, y: u32) -> [u8; 4] {
        self.normals[[y as usize, x as usize]]
    }

    pub fn layer_at(&self, x: u32, y: u32) -> u8 {
        self.layers[[y as usize, x as usize]]
    }

    /// Looks up the precomputed height range of the tile.
    pub fn get_tile_range(&self, key: TileKey) -> Option<HeightRange> {
        self.ranges
            .get(key.level as usize)?
            .get([key.y as usize, key.x as usize])
            .copied()
    }

    /// Like [`HeightField::get_tile_range`], but panics for keys outside of the quadtree.
    pub fn tile_range(&self, key: TileKey) -> HeightRange {
        self.get_tile_range(key)
            .unwrap_or_else(|| panic!("no height range for tile {key}"))
    }

    fn build_normals(&mut self) {
        let size = self.size as usize;
        let last = size - 1;
        let pixel_size = self.pixel_size();

        let mut normals = Array2::default((size, size));

        for (y, x) in iproduct!(0..size, 0..size) {
            // edge samples fall back to a one sided difference
            let (left, right) = (x.saturating_sub(1), (x + 1).min(last));
            let (top, bottom) = (y.saturating_sub(1), (y + 1).min(last));

            let gradient = |a: f32, b: f32, steps: usize| {
                if steps == 0 {
                    0.0
                } else {
                    (b - a) * self.height_scale / (steps as f32 * pixel_size)
                }
            };

            let dx = gradient(
                self.heights[[y, left]],
                self.heights[[y, right]],
                right - left,
            );
            let dz = gradient(
                self.heights[[top, x]],
                self.heights[[bottom, x]],
                bottom - top,
            );

            normals[[y, x]] = encode_normal(Vec3::new(-dx, 1.0, -dz).normalize());
        }

        self.normals = normals;
    }

    fn build_layers(&mut self, thresholds: &LayerThresholds) {
        let height_scale = self.height_scale;

        self.layers = self
            .heights
            .mapv(|height| MaterialLayer::classify(height * height_scale, thresholds) as u8);
    }

    /// Computes the height ranges of all tiles, starting at the highest level.
    ///
    /// Each tile scans its `(grid_size + 1)²` corner samples at the stride of its level
    /// and includes the ranges of its children, so that a parent always bounds its children.
    fn generate_tiles(&mut self) {
        let mut ranges = vec![Array2::default((0, 0)); self.levels as usize + 1];

        for level in (0..=self.levels).rev() {
            let count = TileKey::count(level) as usize;
            let children = ranges.get(level as usize + 1);

            let level_ranges = Array2::from_shape_fn((count, count), |(y, x)| {
                let key = TileKey::new(level, x as u32, y as u32);
                let mut range = self.scan_tile(key);

                if let Some(children) = children {
                    for child in key.children() {
                        range = range.union(children[[child.y as usize, child.x as usize]]);
                    }
                }

                range
            });

            ranges[level as usize] = level_ranges;
        }

        self.ranges = ranges;
    }

    fn scan_tile(&self, key: TileKey) -> HeightRange {
        let size = self.size as usize;
        let grid_size = self.grid_size as usize;
        let step = 1 << (self.levels - key.level);

        let mut range = HeightRange::EMPTY;

        for (k, i) in iproduct!(0..=grid_size, 0..=grid_size) {
            let x = (key.x as usize * grid_size + i) * step;
            let y = (key.y as usize * grid_size + k) * step;

            // the last row and column of the grid overhang the raster
            if x >= size || y >= size {
                continue;
            }

            range.include(self.heights[[y, x]] * self.height_scale);
        }

        range
    }

    fn extent(&self) -> Extent3d {
        Extent3d {
            width: self.size,
            height: self.size,
            depth_or_array_layers: 1,
        }
    }

    /// The heights as a single channel 16 bit image.
    pub fn height_image(&self) -> Image {
        let data = self
            .heights
            .iter()
            .flat_map(|&height| {
                ((height.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16).to_le_bytes()
            })
            .collect();

        Image::new(
            self.extent(),
            TextureDimension::D2,
            data,
            TextureFormat::R16Unorm,
            RenderAssetUsages::default(),
        )
    }

    /// The encoded normals as an RGBA8 image.
    pub fn normal_image(&self) -> Image {
        let data = self.normals.iter().flatten().copied().collect();

        Image::new(
            self.extent(),
            TextureDimension::D2,
            data,
            TextureFormat::Rgba8Unorm,
            RenderAssetUsages::default(),
        )
    }

    /// The material layer ids as a single channel integer image.
    pub fn layer_image(&self) -> Image {
        let data = self.layers.iter().copied().collect();

        Image::new(
            self.extent(),
            TextureDimension::D2,
            data,
            TextureFormat::R8Uint,
            RenderAssetUsages::default(),
        )
    }
}

/// Validates the raster dimensions and returns the amount of levels below the root.
fn compute_levels(width: u32, height: u32, grid_size: u32) -> Result<u32> {
    ensure!(
        width == height,
        "the height map has to be square, got {width}x{height}"
    );
    ensure!(
        width.is_power_of_two(),
        "the height map size has to be a power of two, got {width}"
    );
    ensure!(
        grid_size.is_power_of_two(),
        "the grid size has to be a power of two, got {grid_size}"
    );
    ensure!(
        grid_size <= GridMesh::MAX_GRID_SIZE,
        "the grid size {grid_size} exceeds the maximum of {}",
        GridMesh::MAX_GRID_SIZE
    );
    ensure!(
        width >= grid_size,
        "the height map size {width} is smaller than the grid size {grid_size}"
    );

    Ok(width.trailing_zeros() - grid_size.trailing_zeros())
}

fn encode_normal(normal: Vec3) -> [u8; 4] {
    let encode = |value: f32| ((value * 0.5 + 0.5) * u8::MAX as f32).round() as u8;

    [encode(normal.x), encode(normal.y), encode(normal.z), u8::MAX]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn config(terrain_size: f32, grid_size: u32) -> TerrainConfig {
        TerrainConfig {
            terrain_size,
            grid_size,
            ..Default::default()
        }
    }

    #[test]
    fn levels_follow_size_and_grid() {
        let height_field = HeightField::generate(64, 1.0, &config(64.0, 16)).unwrap();

        assert_eq!(height_field.max_level(), 2);
        assert_eq!(height_field.pixel_size(), 1.0);

        for level in 0..=2 {
            for key in TileKey::level_keys(level) {
                let range = height_field.tile_range(key);
                assert!(range.min <= range.max);
            }
        }

        assert_eq!(height_field.get_tile_range(TileKey::new(3, 0, 0)), None);
        assert_eq!(height_field.get_tile_range(TileKey::new(1, 2, 0)), None);
    }

    #[test]
    #[should_panic(expected = "3_0_0")]
    fn missing_range_panics() {
        let height_field = HeightField::generate(32, 1.0, &config(32.0, 16)).unwrap();

        height_field.tile_range(TileKey::new(3, 0, 0));
    }

    #[test]
    fn rejects_invalid_dimensions() {
        let config = config(64.0, 16);

        assert!(HeightField::generate(48, 1.0, &config).is_err());
        assert!(HeightField::generate(8, 1.0, &config).is_err());
        assert!(HeightField::from_samples(Array2::zeros((32, 64)), 1.0, &config).is_err());
        assert!(HeightField::from_samples(Array2::zeros((0, 0)), 1.0, &config).is_err());
    }

    #[test]
    fn rejects_grids_beyond_16_bit_indices() {
        let error = HeightField::generate(512, 1.0, &config(512.0, 256)).unwrap_err();
        assert!(error.to_string().contains("exceeds the maximum"));

        let height_field = HeightField::generate(256, 1.0, &config(256.0, 128)).unwrap();
        assert_eq!(height_field.max_level(), 1);
    }

    #[test]
    fn parent_range_bounds_children() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for (size, grid_size) in [(32, 8), (64, 16), (64, 4), (128, 16)] {
            let samples =
                Array2::from_shape_simple_fn((size, size), || rng.random_range(0.0..1.0));
            let height_field =
                HeightField::from_samples(samples, 100.0, &config(size as f32, grid_size))
                    .unwrap();

            for level in 0..height_field.max_level() {
                for key in TileKey::level_keys(level) {
                    let parent = height_field.tile_range(key);

                    for child in key.children() {
                        assert!(parent.contains(&height_field.tile_range(child)));
                    }
                }
            }
        }
    }

    #[test]
    fn leaf_range_matches_footprint() {
        let mut samples = Array2::zeros((32, 32));
        samples[[20, 3]] = 0.5;
        samples[[3, 20]] = 0.25;

        let height_field = HeightField::from_samples(samples, 10.0, &config(32.0, 16)).unwrap();

        assert_eq!(height_field.max_level(), 1);
        assert_eq!(
            height_field.tile_range(TileKey::new(1, 0, 1)),
            HeightRange { min: 0.0, max: 5.0 }
        );
        assert_eq!(
            height_field.tile_range(TileKey::new(1, 1, 0)),
            HeightRange { min: 0.0, max: 2.5 }
        );
        assert_eq!(
            height_field.tile_range(TileKey::new(1, 1, 1)),
            HeightRange { min: 0.0, max: 0.0 }
        );
        assert_eq!(
            height_field.tile_range(TileKey::ROOT),
            HeightRange { min: 0.0, max: 5.0 }
        );
    }

    #[test]
    fn layers_follow_thresholds() {
        let samples = Array2::from_shape_fn((16, 16), |(_, x)| x as f32 / 15.0);
        let height_field = HeightField::from_samples(samples, 45.0, &config(16.0, 16)).unwrap();

        // heights are 3 world units apart
        assert_eq!(height_field.layer_at(0, 0), MaterialLayer::Sand as u8);
        assert_eq!(height_field.layer_at(3, 0), MaterialLayer::Sand as u8);
        assert_eq!(height_field.layer_at(4, 0), MaterialLayer::Grass as u8);
        assert_eq!(height_field.layer_at(9, 0), MaterialLayer::Grass as u8);
        assert_eq!(height_field.layer_at(11, 0), MaterialLayer::Rock as u8);
        assert_eq!(height_field.layer_at(15, 7), MaterialLayer::Rock as u8);
    }

    #[test]
    fn normals_point_up_and_away_from_slope() {
        let flat = HeightField::from_samples(Array2::zeros((16, 16)), 10.0, &config(16.0, 16))
            .unwrap();

        for (y, x) in iproduct!(0..16, 0..16) {
            assert_eq!(flat.normal_at(x, y), [128, 255, 128, 255]);
        }

        // rises by one world unit per sample along x
        let samples = Array2::from_shape_fn((16, 16), |(_, x)| x as f32 / 16.0);
        let slope = HeightField::from_samples(samples, 16.0, &config(16.0, 16)).unwrap();

        for (x, y) in [(0, 0), (7, 3), (15, 15)] {
            let normal = slope.normal_at(x, y);

            assert!(normal[0] < 128);
            assert_eq!(normal[2], 128);
            // normalize(-1, 1, 0) encodes to 0.146 and 0.854
            assert_eq!(normal[0], 37);
            assert_eq!(normal[1], 218);
        }
    }

    #[test]
    fn images_match_rasters() {
        let height_field = HeightField::generate(32, 50.0, &config(32.0, 16)).unwrap();

        let height_image = height_field.height_image();
        assert_eq!(height_image.texture_descriptor.format, TextureFormat::R16Unorm);
        assert_eq!(height_image.data.len(), 32 * 32 * 2);

        let normal_image = height_field.normal_image();
        assert_eq!(normal_image.texture_descriptor.format, TextureFormat::Rgba8Unorm);
        assert_eq!(normal_image.data.len(), 32 * 32 * 4);

        let layer_image = height_field.layer_image();
        assert_eq!(layer_image.texture_descriptor.format, TextureFormat::R8Uint);
        assert_eq!(layer_image.data[..], height_field.layers.as_slice().unwrap()[..]);
    }
}
