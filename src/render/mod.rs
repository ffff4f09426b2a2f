//! Turns the visible tiles of a view into draw commands.
//!
//! The renderer never talks to a graphics API directly. Resources are created through a
//! [`RenderBackend`] and commands are recorded into a [`CommandRecorder`], both of which are
//! handed in by the caller.

mod grid_mesh;

pub use grid_mesh::{BoxLines, GridMesh};

use crate::{terrain::Terrain, terrain_view::View};
use bevy::{
    asset::{Assets, Handle},
    math::Mat4,
    prelude::{Image, Mesh, Resource},
};
use bitflags::bitflags;
use bytemuck::{bytes_of, cast_slice};

bitflags! {
    /// Toggles of the per frame passes.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ViewFlags: u32 {
        /// Render the water reflection.
        const REFLECTION = 1 << 0;
        /// Draw the terrain as lines, this disables the reflection.
        const WIREFRAME = 1 << 1;
        /// Draw the bounding boxes of all visible tiles.
        const DEBUG_BOUNDS = 1 << 2;
    }
}

impl ViewFlags {
    pub fn reflection_enabled(self) -> bool {
        self.contains(Self::REFLECTION) && !self.contains(Self::WIREFRAME)
    }
}

/// Creates the gpu resources of the terrain.
pub trait RenderBackend {
    type Geometry;
    type Image;

    fn create_geometry(&mut self, mesh: Mesh) -> Self::Geometry;
    fn create_image(&mut self, image: Image) -> Self::Image;
}

/// Records the draw commands of a frame.
pub trait CommandRecorder<G> {
    fn bind_geometry(&mut self, geometry: &G);
    /// Writes `data` into the per draw constants at the byte `offset`.
    fn set_constant(&mut self, offset: u32, data: &[u8]);
    fn draw_indexed(&mut self, index_count: u32);
}

/// A backend that stores the meshes and images as bevy assets.
pub struct AssetBackend<'a> {
    pub meshes: &'a mut Assets<Mesh>,
    pub images: &'a mut Assets<Image>,
}

impl RenderBackend for AssetBackend<'_> {
    type Geometry = Handle<Mesh>;
    type Image = Handle<Image>;

    fn create_geometry(&mut self, mesh: Mesh) -> Handle<Mesh> {
        self.meshes.add(mesh)
    }

    fn create_image(&mut self, image: Image) -> Handle<Image> {
        self.images.add(image)
    }
}

/// Byte offsets of the per draw constants used by the terrain shader.
pub mod constants {
    pub const TERRAIN_SIZE: u32 = 0;
    pub const TERRAIN_HEIGHT: u32 = 4;
    pub const REFLECTED: u32 = 8;
    pub const LOD_DISTANCE: u32 = 12;
    pub const TRANSFORM: u32 = 16;
    /// The debug boxes only use a transform.
    pub const BOX_TRANSFORM: u32 = 0;
}

/// Owns the shared geometry and the sampled rasters of a terrain and records its draws.
#[derive(Resource)]
pub struct TerrainRenderer<G, I> {
    tile_geometry: G,
    box_geometry: G,
    height_map: I,
    normal_map: I,
    layer_map: I,
    tile_index_count: u32,
    terrain_size: f32,
    terrain_height: f32,
}

impl<G, I> TerrainRenderer<G, I> {
    pub fn new<B>(terrain: &Terrain, backend: &mut B) -> Self
    where
        B: RenderBackend<Geometry = G, Image = I>,
    {
        let height_field = terrain.height_field();
        let grid = GridMesh::new(height_field.grid_size());

        Self {
            tile_geometry: backend.create_geometry(grid.to_mesh()),
            box_geometry: backend.create_geometry(BoxLines::to_mesh()),
            height_map: backend.create_image(height_field.height_image()),
            normal_map: backend.create_image(height_field.normal_image()),
            layer_map: backend.create_image(height_field.layer_image()),
            tile_index_count: grid.index_count(),
            terrain_size: height_field.terrain_size(),
            terrain_height: height_field.height_scale(),
        }
    }

    pub fn tile_geometry(&self) -> &G {
        &self.tile_geometry
    }

    pub fn box_geometry(&self) -> &G {
        &self.box_geometry
    }

    pub fn height_map(&self) -> &I {
        &self.height_map
    }

    pub fn normal_map(&self) -> &I {
        &self.normal_map
    }

    pub fn layer_map(&self) -> &I {
        &self.layer_map
    }

    /// Records one draw of the tile grid per visible tile of the `view`.
    ///
    /// `reflected` tells the shader to clip everything below the water plane.
    pub fn display(&self, view: &View, reflected: bool, recorder: &mut impl CommandRecorder<G>) {
        recorder.bind_geometry(&self.tile_geometry);
        recorder.set_constant(constants::TERRAIN_SIZE, bytes_of(&self.terrain_size));
        recorder.set_constant(constants::TERRAIN_HEIGHT, bytes_of(&self.terrain_height));
        recorder.set_constant(constants::REFLECTED, bytes_of(&(reflected as u32)));

        for tile in view.draw_list() {
            recorder.set_constant(constants::LOD_DISTANCE, bytes_of(&tile.lod_distance));
            recorder.set_constant(
                constants::TRANSFORM,
                cast_slice(&tile.transform.to_cols_array()),
            );
            recorder.draw_indexed(self.tile_index_count);
        }
    }

    /// Records one line box per visible tile of the `view`.
    pub fn display_bounds(&self, view: &View, recorder: &mut impl CommandRecorder<G>) {
        recorder.bind_geometry(&self.box_geometry);

        for &key in view.visible_tiles() {
            let bbox = view.tile_cache().bbox(key);
            let transform = Mat4::from_translation(bbox.center())
                * Mat4::from_scale(bbox.half_extents());

            recorder.set_constant(
                constants::BOX_TRANSFORM,
                cast_slice(&transform.to_cols_array()),
            );
            recorder.draw_indexed(BoxLines::INDEX_COUNT);
        }
    }
}
