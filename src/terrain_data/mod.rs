//! This module contains the two fundamental data structures of the terrain:
//! the [`HeightField`] and the [`TileCache`].
//!
//! # Explanation
//! Each terrain possesses one [`HeightField`], which stores the height, normal and material layer
//! rasters and the precomputed [`HeightRange`] of every quadtree tile.
//! It is built once, before the first frame, and is read only afterwards.
//!
//! The [`TileCache`] lazily materializes the world transform and lod distance of the tiles
//! that were selected by any view. It is shared between the primary and the reflection view,
//! which is why it is the only piece of terrain data that needs synchronization.

mod height_field;
mod noise;
mod tile_cache;

pub use height_field::{HeightField, MaterialLayer};
pub use tile_cache::{Tile, TileCache};

/// The minimal and maximal world height inside the footprint of a tile.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HeightRange {
    pub min: f32,
    pub max: f32,
}

impl HeightRange {
    /// The range containing no heights, the neutral element of [`HeightRange::union`].
    pub const EMPTY: HeightRange = HeightRange {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    #[inline]
    pub fn include(&mut self, height: f32) {
        self.min = self.min.min(height);
        self.max = self.max.max(height);
    }

    #[inline]
    pub fn union(self, other: HeightRange) -> HeightRange {
        HeightRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn contains(&self, other: &HeightRange) -> bool {
        self.min <= other.min && self.max >= other.max
    }
}

impl Default for HeightRange {
    fn default() -> Self {
        Self::EMPTY
    }
}
