use crate::math::BoundingBox;
use bevy::math::{Mat4, Vec3, Vec4};

/// A plane equation, where points with a positive signed distance lie inside.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    fn from_vec4(plane: Vec4) -> Self {
        Self {
            normal: plane.truncate(),
            offset: plane.w,
        }
    }

    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.offset
    }
}

/// The six clip planes of a view, used to reject tiles outside the screen.
///
/// Only the four side planes take part in the tests, near and far are extracted but ignored.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrustumCuller {
    planes: [Plane; 6],
}

impl FrustumCuller {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const TOP: usize = 2;
    pub const BOTTOM: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    const TESTED_PLANES: usize = 4;

    pub fn from_matrix(clip_from_world: Mat4) -> Self {
        let mut frustum = Self::default();
        frustum.update(clip_from_world);
        frustum
    }

    /// Extracts the planes from the combined projection and view matrix.
    pub fn update(&mut self, clip_from_world: Mat4) {
        let x = clip_from_world.row(0);
        let y = clip_from_world.row(1);
        let z = clip_from_world.row(2);
        let w = clip_from_world.row(3);

        self.planes[Self::LEFT] = Plane::from_vec4(w + x);
        self.planes[Self::RIGHT] = Plane::from_vec4(w - x);
        self.planes[Self::TOP] = Plane::from_vec4(w - y);
        self.planes[Self::BOTTOM] = Plane::from_vec4(w + y);
        self.planes[Self::NEAR] = Plane::from_vec4(w + z);
        self.planes[Self::FAR] = Plane::from_vec4(w - z);
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Tests the box given by its `center` and `half_extents` against the side planes.
    ///
    /// Returns `false` only if the box lies completely outside of at least one plane.
    pub fn test(&self, center: Vec3, half_extents: Vec3) -> bool {
        self.planes[..Self::TESTED_PLANES].iter().all(|plane| {
            let radius = plane.normal.abs().dot(half_extents);

            plane.signed_distance(center) >= -radius
        })
    }

    pub fn test_bbox(&self, bbox: &BoundingBox) -> bool {
        self.test(bbox.center(), bbox.half_extents())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn looking_down_z() -> FrustumCuller {
        let projection = Mat4::perspective_rh(70.0_f32.to_radians(), 1.0, 0.1, 1000.0);
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);

        FrustumCuller::from_matrix(projection * view)
    }

    #[test]
    fn accepts_box_in_front() {
        let frustum = looking_down_z();

        assert!(frustum.test(Vec3::new(0.0, 0.0, -50.0), Vec3::splat(1.0)));
    }

    #[test]
    fn rejects_boxes_outside_side_planes() {
        let frustum = looking_down_z();

        assert!(!frustum.test(Vec3::new(-500.0, 0.0, -50.0), Vec3::splat(1.0)));
        assert!(!frustum.test(Vec3::new(500.0, 0.0, -50.0), Vec3::splat(1.0)));
        assert!(!frustum.test(Vec3::new(0.0, 500.0, -50.0), Vec3::splat(1.0)));
        assert!(!frustum.test(Vec3::new(0.0, -500.0, -50.0), Vec3::splat(1.0)));
    }

    #[test]
    fn ignores_near_and_far() {
        let frustum = looking_down_z();

        // beyond the far plane, but inside the side planes
        assert!(frustum.test(Vec3::new(0.0, 0.0, -5000.0), Vec3::splat(1.0)));
    }

    #[test]
    fn box_around_camera_is_always_visible() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..256 {
            let position = Vec3::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            );
            let direction = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(0.1..1.0),
            )
            .normalize();

            let projection = Mat4::perspective_rh(60.0_f32.to_radians(), 1.5, 0.1, 500.0);
            let view = Mat4::look_to_rh(position, direction, Vec3::Y);
            let frustum = FrustumCuller::from_matrix(projection * view);

            let offset = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let half_extents = offset.abs() + Vec3::splat(0.5);
            let bbox = BoundingBox::new(
                position + offset - half_extents,
                position + offset + half_extents,
            );

            assert!(bbox.contains_point(position));
            assert!(frustum.test_bbox(&bbox));
        }
    }
}
