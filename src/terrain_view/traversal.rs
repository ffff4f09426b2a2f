use crate::{
    math::{FrustumCuller, TileKey},
    terrain_data::TileCache,
};
use bevy::math::Vec3;
use std::collections::VecDeque;

/// Selects the visible tiles of a view by refining the quadtree breadth first.
///
/// Starting at the root, every tile outside the frustum is discarded together with its subtree.
/// Tiles whose bounds are within the lod distance of the camera are replaced by their children,
/// all others (and the tiles at the highest level) are emitted.
#[derive(Default)]
pub struct VisibilityTraversal {
    queue: VecDeque<TileKey>,
    visible: Vec<TileKey>,
}

impl VisibilityTraversal {
    /// Recomputes the visible tiles and materializes all of them in the `tile_cache`.
    pub fn update(
        &mut self,
        tile_cache: &TileCache,
        camera_position: Vec3,
        frustum: &FrustumCuller,
    ) -> &[TileKey] {
        let max_level = tile_cache.max_level();

        self.visible.clear();
        self.queue.clear();
        self.queue.push_back(TileKey::ROOT);

        while let Some(key) = self.queue.pop_front() {
            let bbox = tile_cache.bbox(key);

            if !frustum.test_bbox(&bbox) {
                continue;
            }

            if key.level == max_level {
                self.visible.push(key);
                continue;
            }

            // a camera exactly at the lod distance still subdivides
            if bbox.intersects_sphere(camera_position, tile_cache.lod_distance(key.level)) {
                self.queue.extend(key.children());
            } else {
                self.visible.push(key);
            }
        }

        tile_cache.ensure_tiles(&self.visible);

        &self.visible
    }

    /// The tiles selected by the last update, in discovery order.
    pub fn visible(&self) -> &[TileKey] {
        &self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera::Camera, terrain::TerrainConfig, terrain_data::HeightField};
    use bevy::math::Mat4;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::{collections::BTreeSet, sync::Arc};

    fn tile_cache(size: u32, height_scale: f32) -> TileCache {
        let config = TerrainConfig {
            terrain_size: size as f32,
            grid_size: 16,
            ..Default::default()
        };
        let height_field = HeightField::generate(size, height_scale, &config).unwrap();

        TileCache::new(Arc::new(height_field), config.lod_distance_factor)
    }

    /// A frustum looking straight down that contains the whole terrain.
    fn top_down(position: Vec3, half_size: f32) -> FrustumCuller {
        let projection =
            Mat4::orthographic_rh(-half_size, half_size, -half_size, half_size, 0.1, 10000.0);
        let view = Mat4::look_to_rh(position, Vec3::NEG_Y, Vec3::Z);

        FrustumCuller::from_matrix(projection * view)
    }

    fn area(tile_cache: &TileCache, keys: &[TileKey]) -> f32 {
        keys.iter()
            .map(|key| tile_cache.tile_size(key.level).powi(2))
            .sum()
    }

    #[test]
    fn far_camera_sees_only_root() {
        let tile_cache = tile_cache(64, 1.0);
        let mut traversal = VisibilityTraversal::default();

        let mut camera = Camera::new(Vec3::new(0.0, 10000.0, 0.0));
        camera.set_angles(90.0, 0.0);
        camera.update();

        let projection = Mat4::perspective_rh(70.0_f32.to_radians(), 1.0, 0.1, 20000.0);
        let frustum = FrustumCuller::from_matrix(projection * camera.view());

        assert!(tile_cache.lod_distance(0) < 10000.0 - 1.0);

        let visible = traversal.update(&tile_cache, camera.position(), &frustum);

        assert_eq!(visible, &[TileKey::ROOT]);
        assert!(tile_cache.contains(TileKey::ROOT));
        assert_eq!(tile_cache.len(), 1);
    }

    #[test]
    fn near_camera_sees_all_leaves() {
        let tile_cache = tile_cache(64, 1.0);
        let mut traversal = VisibilityTraversal::default();

        let position = Vec3::new(0.0, 5.0, 0.0);
        let frustum = top_down(position, 100.0);

        let visible = traversal
            .update(&tile_cache, position, &frustum)
            .iter()
            .copied()
            .collect::<BTreeSet<_>>();

        assert_eq!(visible.len(), 16);
        assert_eq!(visible, TileKey::level_keys(2).collect::<BTreeSet<_>>());
        assert_eq!(tile_cache.len(), 16);
    }

    #[test]
    fn looking_away_sees_nothing() {
        let tile_cache = tile_cache(64, 1.0);
        let mut traversal = VisibilityTraversal::default();

        let position = Vec3::new(0.0, 5.0, 200.0);
        let projection = Mat4::perspective_rh(70.0_f32.to_radians(), 1.0, 0.1, 1000.0);
        let view = Mat4::look_to_rh(position, Vec3::Z, Vec3::Y);
        let frustum = FrustumCuller::from_matrix(projection * view);

        assert!(traversal.update(&tile_cache, position, &frustum).is_empty());
        assert!(tile_cache.is_empty());
    }

    #[test]
    fn leaves_tile_the_terrain() {
        let tile_cache = tile_cache(512, 40.0);
        let mut traversal = VisibilityTraversal::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..32 {
            let position = Vec3::new(
                rng.random_range(-300.0..300.0),
                rng.random_range(0.0..200.0),
                rng.random_range(-300.0..300.0),
            );
            let frustum = top_down(Vec3::new(0.0, 1000.0, 0.0), 1000.0);

            let visible = traversal.update(&tile_cache, position, &frustum).to_vec();

            // no gaps, since the areas add up to the whole terrain
            assert_eq!(area(&tile_cache, &visible), 512.0 * 512.0);

            // no overlaps, since no tile is the ancestor of another
            let keys = visible.iter().copied().collect::<BTreeSet<_>>();
            for key in &visible {
                let mut ancestor = key.parent();

                while let Some(parent) = ancestor {
                    assert!(!keys.contains(&parent));
                    ancestor = parent.parent();
                }
            }
        }
    }

    #[test]
    fn traversal_is_deterministic() {
        let tile_cache = tile_cache(512, 40.0);

        let mut camera = Camera::new(Vec3::new(-100.0, 60.0, 80.0));
        camera.set_angles(20.0, 215.0);
        camera.update();

        let projection = Mat4::perspective_rh(60.0_f32.to_radians(), 1.6, 0.1, 2000.0);
        let frustum = FrustumCuller::from_matrix(projection * camera.view());

        let mut first = VisibilityTraversal::default();
        let mut second = VisibilityTraversal::default();

        let expected = first
            .update(&tile_cache, camera.position(), &frustum)
            .to_vec();

        for _ in 0..4 {
            assert_eq!(
                second.update(&tile_cache, camera.position(), &frustum),
                &expected[..]
            );
        }

        assert!(!expected.is_empty());
    }
}
