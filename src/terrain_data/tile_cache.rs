use crate::{
    math::{BoundingBox, TileKey},
    terrain_data::HeightField,
};
use bevy::{
    log::trace,
    math::{Mat4, Quat, Vec3},
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// The per tile data the renderer needs to draw the shared grid mesh at the right place.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tile {
    /// Scales the grid mesh to the tile size and moves it to the tile center (at height 0).
    pub transform: Mat4,
    /// The distance at which this tile gets subdivided.
    pub lod_distance: f32,
}

/// Lazily materializes the [`Tile`]s of the quadtree.
///
/// Tiles are computed on demand, at most once per key, and are never evicted.
/// The cache is shared by all views of a terrain. Its lock only guards the
/// presence check and the insertion, the tiles themselves are computed outside of it.
pub struct TileCache {
    height_field: Arc<HeightField>,
    lod_distance_factor: f32,
    tiles: Mutex<BTreeMap<TileKey, Tile>>,
}

impl TileCache {
    pub fn new(height_field: Arc<HeightField>, lod_distance_factor: f32) -> Self {
        Self {
            height_field,
            lod_distance_factor,
            tiles: Mutex::default(),
        }
    }

    pub fn height_field(&self) -> &Arc<HeightField> {
        &self.height_field
    }

    #[inline]
    pub fn max_level(&self) -> u32 {
        self.height_field.max_level()
    }

    #[inline]
    pub fn terrain_size(&self) -> f32 {
        self.height_field.terrain_size()
    }

    /// The world size of a tile at the `level`.
    #[inline]
    pub fn tile_size(&self, level: u32) -> f32 {
        self.terrain_size() / TileKey::count(level) as f32
    }

    /// The distance below which tiles of the `level` are subdivided.
    #[inline]
    pub fn lod_distance(&self, level: u32) -> f32 {
        self.tile_size(level) * self.lod_distance_factor
    }

    /// The world space bounds of the tile.
    ///
    /// The footprint is centered around the origin, the height comes from the tile's height range.
    pub fn bbox(&self, key: TileKey) -> BoundingBox {
        let tile_size = self.tile_size(key.level);
        let offset = self.terrain_size() / 2.0;
        let range = self.height_field.tile_range(key);

        let x = (key.x as f32 + 0.5) * tile_size - offset;
        let z = (key.y as f32 + 0.5) * tile_size - offset;
        let half_size = tile_size / 2.0;

        BoundingBox::new(
            Vec3::new(x - half_size, range.min, z - half_size),
            Vec3::new(x + half_size, range.max, z + half_size),
        )
    }

    fn compute_tile(&self, key: TileKey) -> Tile {
        let mut center = self.bbox(key).center();
        center.y = 0.0;

        let scale = self.tile_size(key.level) / self.height_field.grid_size() as f32;

        Tile {
            transform: Mat4::from_scale_rotation_translation(
                Vec3::new(scale, 1.0, scale),
                Quat::IDENTITY,
                center,
            ),
            lod_distance: self.lod_distance(key.level),
        }
    }

    fn lock(&self) -> MutexGuard<BTreeMap<TileKey, Tile>> {
        // a panicking reader can not leave a half inserted tile behind
        self.tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Materializes the tile, if it is not already cached.
    pub fn ensure_tile(&self, key: TileKey) {
        self.ensure_tiles(&[key]);
    }

    /// Materializes all missing tiles of `keys`, acquiring the lock only once.
    pub fn ensure_tiles(&self, keys: &[TileKey]) {
        let tiles = keys
            .iter()
            .map(|&key| (key, self.compute_tile(key)))
            .collect::<Vec<_>>();

        let mut cache = self.lock();
        let previous = cache.len();

        for (key, tile) in tiles {
            cache.entry(key).or_insert(tile);
        }

        trace!(
            "Materialized {} new tiles, {} in total.",
            cache.len() - previous,
            cache.len()
        );
    }

    /// Returns the tile, which must have been materialized before.
    pub fn tile(&self, key: TileKey) -> Tile {
        self.lock()
            .get(&key)
            .copied()
            .unwrap_or_else(|| panic!("tile {key} was read before it was materialized"))
    }

    /// Returns the tiles of all `keys` in order, which must have been materialized before.
    pub fn tiles(&self, keys: &[TileKey]) -> Vec<Tile> {
        let cache = self.lock();

        keys.iter()
            .map(|key| {
                cache.get(key).copied().unwrap_or_else(|| {
                    panic!("tile {key} was read before it was materialized")
                })
            })
            .collect()
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.lock().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The keys of all materialized tiles in ascending order.
    pub fn keys(&self) -> Vec<TileKey> {
        self.lock().keys().copied().collect()
    }
}
