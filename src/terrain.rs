//! Types for configuring terrains and the [`Terrain`] resource that owns the shared data.

use crate::{
    render::ViewFlags,
    terrain_data::{HeightField, TileCache},
    terrain_view::{ReflectionPass, View},
};
use anyhow::{Context, Result};
use bevy::{math::UVec2, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, sync::Arc};

/// Where the height samples of the terrain come from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum HeightSource {
    /// Procedural value noise with `size`x`size` samples.
    Generate { size: u32 },
    /// A single or multi channel raster file, the first channel is used as height.
    Load { path: PathBuf },
}

/// The height thresholds (in world units) that classify the material layers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct LayerThresholds {
    /// Samples below this height are sand.
    pub sand_below: f32,
    /// Samples above this height are rock.
    pub rock_above: f32,
}

impl Default for LayerThresholds {
    fn default() -> Self {
        Self {
            sand_below: 10.0,
            rock_above: 30.0,
        }
    }
}

/// Tuning of the procedural value noise.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    pub seed: u64,
    /// The amount of samples between two lattice points.
    pub cell_size: u32,
    /// The upper bound of the random lattice values, in normalized height.
    pub amplitude: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: 1729,
            cell_size: 16,
            amplitude: 1.0,
        }
    }
}

/// The configuration of a terrain and its views.
///
/// It can be stored as RON, missing fields fall back to their defaults.
#[derive(Serialize, Deserialize, Resource, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    pub source: HeightSource,
    /// The world height of a normalized sample of 1.0.
    pub height_scale: f32,
    /// The world size of the root tile.
    pub terrain_size: f32,
    /// The amount of grid cells per tile side.
    pub grid_size: u32,
    /// Multiplied with the tile size to get the distance at which a tile gets subdivided.
    pub lod_distance_factor: f32,
    pub layers: LayerThresholds,
    pub noise: NoiseConfig,
    /// The height of the water plane the reflection view mirrors at.
    pub water_level: f32,
    /// The initial position of the primary camera.
    pub camera_position: [f32; 3],
    /// The vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// The initial viewport size in pixels.
    pub viewport: [u32; 2],
    pub reflection: bool,
    pub wireframe: bool,
    pub debug_bounds: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            source: HeightSource::Generate { size: 1024 },
            height_scale: 150.0,
            terrain_size: 512.0,
            grid_size: 16,
            lod_distance_factor: 2.5,
            layers: default(),
            noise: default(),
            water_level: 10.0,
            camera_position: [0.0, 50.0, 0.0],
            fov: 70.0,
            near: 0.1,
            far: 1500.0,
            viewport: [1280, 720],
            reflection: true,
            wireframe: false,
            debug_bounds: false,
        }
    }
}

impl TerrainConfig {
    pub fn from_ron(source: &str) -> Result<Self> {
        ron::from_str(source).context("invalid terrain config")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read terrain config {}", path.display()))?;

        Self::from_ron(&source)
    }

    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("failed to serialize terrain config")
    }

    pub fn view_flags(&self) -> ViewFlags {
        let mut flags = ViewFlags::empty();
        flags.set(ViewFlags::REFLECTION, self.reflection);
        flags.set(ViewFlags::WIREFRAME, self.wireframe);
        flags.set(ViewFlags::DEBUG_BOUNDS, self.debug_bounds);
        flags
    }

    pub fn projection(&self, viewport: UVec2) -> Mat4 {
        let aspect_ratio = viewport.x.max(1) as f32 / viewport.y.max(1) as f32;

        Mat4::perspective_rh(self.fov.to_radians(), aspect_ratio, self.near, self.far)
    }
}

/// The shared state of a terrain: its configuration, the height field and the tile cache.
///
/// Cloning is cheap, the height field and the tile cache are shared.
#[derive(Resource, Clone)]
pub struct Terrain {
    config: TerrainConfig,
    height_field: Arc<HeightField>,
    tile_cache: Arc<TileCache>,
}

impl Terrain {
    /// Builds the height field (including all height ranges) and an empty tile cache.
    pub fn new(config: TerrainConfig) -> Result<Self> {
        let height_field = match &config.source {
            HeightSource::Generate { size } => {
                HeightField::generate(*size, config.height_scale, &config)?
            }
            HeightSource::Load { path } => HeightField::load(path, config.height_scale, &config)?,
        };

        Ok(Self::from_height_field(config, height_field))
    }

    pub fn from_height_field(config: TerrainConfig, height_field: HeightField) -> Self {
        let height_field = Arc::new(height_field);
        let tile_cache = Arc::new(TileCache::new(
            height_field.clone(),
            config.lod_distance_factor,
        ));

        Self {
            config,
            height_field,
            tile_cache,
        }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn height_field(&self) -> &Arc<HeightField> {
        &self.height_field
    }

    pub fn tile_cache(&self) -> &Arc<TileCache> {
        &self.tile_cache
    }

    /// Creates a view sharing the tile cache of this terrain.
    pub fn create_view(&self) -> View {
        let mut view = View::new(self.tile_cache.clone());
        view.camera_mut()
            .set_position(Vec3::from_array(self.config.camera_position));
        view.set_projection(
            self.config.projection(UVec2::from_array(self.config.viewport)),
            self.config.near,
            self.config.far,
        );
        view
    }
}

/// The primary view and the reflection pass of a terrain.
#[derive(Resource)]
pub struct TerrainViews {
    primary: View,
    reflection: ReflectionPass,
    flags: ViewFlags,
    viewport: UVec2,
}

impl TerrainViews {
    pub fn new(terrain: &Terrain) -> Self {
        let config = terrain.config();

        Self {
            primary: terrain.create_view(),
            reflection: ReflectionPass::new(terrain.create_view(), config.water_level),
            flags: config.view_flags(),
            viewport: UVec2::from_array(config.viewport),
        }
    }

    pub fn primary(&self) -> &View {
        &self.primary
    }

    pub fn primary_mut(&mut self) -> &mut View {
        &mut self.primary
    }

    pub fn reflection(&self) -> &ReflectionPass {
        &self.reflection
    }

    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: ViewFlags) {
        self.flags = flags;
    }

    pub fn viewport(&self) -> UVec2 {
        self.viewport
    }

    /// Whether the primary camera is above the water plane, only then the reflection is visible.
    pub fn camera_above_water(&self) -> bool {
        self.primary.camera().position().y > self.reflection.water_level()
    }

    /// Replaces the projection of both views.
    pub fn set_projection(&mut self, projection: Mat4, near: f32, far: f32) {
        self.primary.set_projection(projection, near, far);
        self.reflection.set_projection(projection, near, far);
    }

    /// Adapts the aspect ratio of both views to the new `viewport`.
    pub fn resize(&mut self, viewport: UVec2, config: &TerrainConfig) {
        if viewport == self.viewport {
            return;
        }

        self.viewport = viewport;
        self.set_projection(config.projection(viewport), config.near, config.far);
    }

    /// Runs the per frame update of both views.
    ///
    /// The reflection pass starts after the primary camera moved and runs concurrently
    /// with the primary traversal. When this returns, the visible tiles of both views
    /// are materialized and safe to draw.
    pub fn update(&mut self) {
        self.primary.update(self.viewport.x, self.viewport.y);

        let reflect = self.flags.reflection_enabled();

        if reflect {
            self.reflection.start(self.primary.camera());
        }

        self.primary.update_visibility();

        if reflect {
            self.reflection.finish();
        }
    }
}
