use glam::{Mat4, Vec3};

/// Camera parameters consumed by the renderer's uniform buffer.
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

/// Perspective camera orbiting the scene origin.
///
/// The aspect ratio always tracks the viewport: `set_viewport` must be called
/// whenever the window is resized.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    /// Field of view used by the scene, in degrees.
    pub const FOV_Y_DEGREES: f32 = 75.0;
    /// Initial distance of the camera from the origin along +Z.
    pub const START_DEPTH: f32 = 50.0;

    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, Self::START_DEPTH),
            target: Vec3::ZERO,
            fov_y_degrees: Self::FOV_Y_DEGREES,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        };
        camera.set_viewport(width, height);
        camera
    }

    /// Recomputes the aspect ratio from viewport pixel dimensions.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn params(&self) -> CameraParams {
        CameraParams {
            view_proj: self.projection_matrix() * self.view_matrix(),
            position: self.position,
        }
    }
}
