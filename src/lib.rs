//! This crate selects the visible tiles of large height-field terrains every frame,
//! using a quadtree with distance based level of detail.
//!
//! # Background
//! There are two questions every view of the terrain has to answer each frame:
//!
//! ## Which parts of the terrain are visible?
//! The terrain is subdivided into a quadtree of square tiles. During preprocessing the
//! [`HeightField`](terrain_data::HeightField) computes the height range of every tile, so that
//! each tile can be bounded by a box. Tiles whose box lies outside of the view frustum are
//! discarded together with all of their children.
//!
//! ## At which resolution should they be drawn?
//! All tiles are drawn with the same grid mesh, so a tile further down the quadtree has a
//! higher resolution. Tiles close to the camera are replaced by their four children, until
//! the distance to the camera exceeds the lod distance of the tile's level.
//! See the [`terrain_view`] module for more information.
//!
//! Two views are updated per frame, the primary view and the water reflection.
//! They run concurrently and share one [`TileCache`](terrain_data::TileCache).

pub mod camera;
pub mod formats;
pub mod math;
pub mod plugin;
pub mod render;
pub mod terrain;
pub mod terrain_data;
pub mod terrain_view;

pub mod prelude {
    //! `use bevy_lod_terrain::prelude::*;` to import the common types and the plugin.

    pub use crate::{
        camera::Camera,
        math::{BoundingBox, FrustumCuller, TileKey},
        plugin::{AssetTerrainRenderer, TerrainPlugin},
        render::{CommandRecorder, RenderBackend, TerrainRenderer, ViewFlags},
        terrain::{HeightSource, Terrain, TerrainConfig, TerrainViews},
        terrain_data::{HeightField, HeightRange, Tile, TileCache},
        terrain_view::{ReflectionPass, View},
    };
}
