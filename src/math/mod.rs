//! Quadtree addressing and the bounding volumes used for culling and lod selection.

mod frustum;

pub use frustum::{FrustumCuller, Plane};

use bevy::math::Vec3;
use derive_more::derive::Display;
use itertools::iproduct;

/// The identifier of a quadtree node.
///
/// Level 0 is the single root tile, each further level doubles the resolution in both axes.
/// Keys are ordered by `(level, x, y)`.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Display)]
#[display("{level}_{x}_{y}")]
pub struct TileKey {
    /// The lod of the tile, where 0 is the root with the lowest resolution.
    pub level: u32,
    /// The x position of the tile in tile sizes.
    pub x: u32,
    /// The y position of the tile in tile sizes.
    pub y: u32,
}

impl TileKey {
    pub const ROOT: TileKey = TileKey {
        level: 0,
        x: 0,
        y: 0,
    };

    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// The amount of tiles in x and y direction at the `level`.
    #[inline]
    pub const fn count(level: u32) -> u32 {
        1 << level
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.level < u32::BITS && self.x < Self::count(self.level) && self.y < Self::count(self.level)
    }

    pub fn parent(self) -> Option<Self> {
        (self.level > 0).then(|| Self::new(self.level - 1, self.x >> 1, self.y >> 1))
    }

    /// The four children in the order `(2x,2y)`, `(2x+1,2y)`, `(2x,2y+1)`, `(2x+1,2y+1)`.
    pub fn children(self) -> [Self; 4] {
        let (level, x, y) = (self.level + 1, self.x << 1, self.y << 1);

        [
            Self::new(level, x, y),
            Self::new(level, x + 1, y),
            Self::new(level, x, y + 1),
            Self::new(level, x + 1, y + 1),
        ]
    }

    /// Iterates over all tiles of the `level` row by row.
    pub fn level_keys(level: u32) -> impl Iterator<Item = Self> {
        let count = Self::count(level);

        iproduct!(0..count, 0..count).map(move |(y, x)| Self::new(level, x, y))
    }
}

/// An axis aligned box in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Whether the x/z footprint of `other` lies inside the footprint of this box.
    pub fn contains_footprint(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.min.x
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.z >= other.max.z
    }

    /// The squared distance between the `point` and the closest point inside the box.
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        // get box closest point to the point by clamping
        let closest = point.clamp(self.min, self.max);

        closest.distance_squared(point)
    }

    /// Tests whether the sphere around `center` touches the box.
    /// A sphere exactly at the boundary counts as intersecting.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.distance_squared(center) <= radius * radius
    }
}
