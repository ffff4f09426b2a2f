use bevy::math::{Mat4, Vec3, Vec4};

/// A first person camera described by its position, pitch and yaw (in degrees).
///
/// The rotation and view matrices are only recomputed by [`Camera::update`].
#[derive(Clone, Debug)]
pub struct Camera {
    position: Vec3,
    pitch: f32,
    yaw: f32,
    rotation: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Camera {
    pub const MAX_PITCH: f32 = 90.0;

    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            pitch: 0.0,
            yaw: 0.0,
            rotation: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn set_angles(&mut self, pitch: f32, yaw: f32) {
        self.pitch = pitch.clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
        // rem_euclid rounds tiny negative angles up to 360
        let yaw = yaw.rem_euclid(360.0);
        self.yaw = if yaw >= 360.0 { 0.0 } else { yaw };
    }

    /// Rotates the camera relative to its current orientation.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.set_angles(self.pitch + pitch, self.yaw + yaw);
    }

    /// The direction the camera is looking at in world space.
    pub fn direction(&self) -> Vec3 {
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        let (pitch_sin, pitch_cos) = (self.pitch + 90.0).to_radians().sin_cos();

        Vec3::new(yaw_sin * pitch_sin, pitch_cos, -yaw_cos * pitch_sin)
    }

    #[inline]
    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    /// The world to camera matrix.
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Recomputes the rotation and view matrices from the current angles and position.
    pub fn update(&mut self) {
        self.rotation = Mat4::from_rotation_x(self.pitch.to_radians())
            * Mat4::from_rotation_y(self.yaw.to_radians());
        self.view = self.rotation * Mat4::from_translation(-self.position);
    }

    /// Turns this camera into the mirror image of `camera` below the horizontal plane at `height`.
    pub fn reflect(&mut self, camera: &Camera, height: f32) {
        let rotation = camera.rotation;

        self.rotation = Mat4::from_cols(
            rotation.x_axis,
            -rotation.y_axis,
            rotation.z_axis,
            rotation.w_axis,
        );
        self.pitch = -camera.pitch;
        self.yaw = camera.yaw;
        self.position = camera.position;
        self.position.y -= 2.0 * (self.position.y - height);
        self.view = self.rotation * Mat4::from_translation(-self.position);
    }

    /// Transforms a world position into camera space.
    pub fn to_view_space(&self, world_position: Vec3) -> Vec3 {
        (self.view * Vec4::from((world_position, 1.0))).truncate()
    }
}
