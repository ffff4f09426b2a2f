//! Views observe the terrain through a [`Camera`] and select the tiles to draw.
//!
//! Each view owns its camera, frustum and visible tile list privately.
//! The only state shared between views is the [`TileCache`] (and the height field behind it).

mod reflection;
mod traversal;

pub use reflection::ReflectionPass;
pub use traversal::VisibilityTraversal;

use crate::{
    camera::Camera,
    math::{FrustumCuller, TileKey},
    terrain_data::{Tile, TileCache},
};
use bevy::math::{Mat3, Mat4, Vec3, Vec4};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;

/// The per view constants used by the sky and fog shaders.
///
/// `topleft`, `xdir` and `ydir` span the world space view rays,
/// so that the ray through pixel `(x, y)` is `topleft + x * xdir + y * ydir`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct ViewUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view_position: [f32; 4],
    pub xdir: [f32; 4],
    pub ydir: [f32; 4],
    pub topleft: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub _padding: [f32; 2],
}

/// A camera looking at the terrain, together with the tiles it currently sees.
pub struct View {
    camera: Camera,
    frustum: FrustumCuller,
    projection: Mat4,
    uniform: ViewUniform,
    traversal: VisibilityTraversal,
    tile_cache: Arc<TileCache>,
}

impl View {
    pub fn new(tile_cache: Arc<TileCache>) -> Self {
        Self {
            camera: Camera::default(),
            frustum: FrustumCuller::default(),
            projection: Mat4::IDENTITY,
            uniform: ViewUniform::default(),
            traversal: VisibilityTraversal::default(),
            tile_cache,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn frustum(&self) -> &FrustumCuller {
        &self.frustum
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn uniform(&self) -> &ViewUniform {
        &self.uniform
    }

    pub fn tile_cache(&self) -> &Arc<TileCache> {
        &self.tile_cache
    }

    pub fn set_projection(&mut self, projection: Mat4, near: f32, far: f32) {
        self.projection = projection;
        self.uniform.near = near;
        self.uniform.far = far;
    }

    /// Updates the camera matrices, the frustum and the view rays for a viewport of `width`x`height`.
    pub fn update(&mut self, width: u32, height: u32) {
        self.camera.update();

        let view_proj = self.projection * self.camera.view();

        let fov_x = 1.0 / self.projection.x_axis.x;
        let fov_y = 1.0 / self.projection.y_axis.y;

        // camera to world rotation
        let camera_to_world = Mat3::from_mat4(self.camera.rotation()).transpose();

        let topleft = camera_to_world * Vec3::new(-fov_x, fov_y, -1.0);
        let xdir = camera_to_world.x_axis * fov_x * (2.0 / width.max(1) as f32);
        let ydir = -(camera_to_world.y_axis * fov_y * (2.0 / height.max(1) as f32));

        self.uniform.xdir = Vec4::from((xdir, 0.0)).to_array();
        self.uniform.ydir = Vec4::from((ydir, 0.0)).to_array();
        self.uniform.topleft = Vec4::from((topleft, 0.0)).to_array();

        self.set_view_proj(view_proj);
    }

    /// Mirrors `camera` at the water plane at `water_level` and rebuilds the frustum.
    pub fn reflect(&mut self, camera: &Camera, water_level: f32) {
        self.camera.reflect(camera, water_level);

        self.set_view_proj(self.projection * self.camera.view());
    }

    fn set_view_proj(&mut self, view_proj: Mat4) {
        self.uniform.view_proj = view_proj.to_cols_array_2d();
        self.uniform.view_position = Vec4::from((self.camera.position(), 0.0)).to_array();

        self.frustum.update(view_proj);
    }

    /// Selects the visible tiles and makes sure all of them are materialized in the tile cache.
    pub fn update_visibility(&mut self) {
        self.traversal
            .update(&self.tile_cache, self.camera.position(), &self.frustum);
    }

    /// The tiles selected by the last [`View::update_visibility`].
    pub fn visible_tiles(&self) -> &[TileKey] {
        self.traversal.visible()
    }

    /// The transform and lod distance of every visible tile, in the order of [`View::visible_tiles`].
    pub fn draw_list(&self) -> Vec<Tile> {
        self.tile_cache.tiles(self.visible_tiles())
    }
}
