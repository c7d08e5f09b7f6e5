use glam::Vec3;

use crate::camera::PerspectiveCamera;

/// Damped orbit rig around a target point.
///
/// Pointer and keyboard input accumulate pending deltas; `update` must run
/// once per frame regardless of input, because easing works by applying a
/// `damping_factor` fraction of the pending deltas each step and decaying the
/// remainder. The orbit distance stays within `[min_distance, max_distance]`
/// and the polar angle never exceeds `max_polar_angle` from the up axis.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub zoom_speed: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub key_pan_speed: f32,
    viewport_height: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            damping_factor: 0.05,
            min_distance: 16.0,
            max_distance: 50.0,
            // Negative speed inverts the wheel direction.
            zoom_speed: -1.0,
            max_polar_angle: std::f32::consts::FRAC_PI_2,
            rotate_speed: 1.0,
            key_pan_speed: 7.0,
            viewport_height: 720.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation is normalized against the viewport height, so a full-height
    /// drag orbits by one turn.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Queues an orbit rotation from a pointer drag, in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let per_pixel = std::f32::consts::TAU / self.viewport_height * self.rotate_speed;
        self.delta_theta -= dx * per_pixel;
        self.delta_phi -= dy * per_pixel;
    }

    /// Queues a zoom from wheel input, in scroll lines.
    pub fn zoom(&mut self, lines: f32) {
        self.scale *= 0.95f32.powf(lines * self.zoom_speed);
    }

    /// Queues a pan from a pointer drag, in pixels. Panning is restricted to
    /// the world plane: horizontal drags move along the camera's right vector,
    /// vertical drags along the ground projection of the view direction.
    pub fn pan(&mut self, dx: f32, dy: f32, camera: &PerspectiveCamera) {
        let offset = camera.position - self.target;
        let distance = offset.length();
        // World height covered by the viewport at the target's distance.
        let units_per_pixel =
            2.0 * distance * (camera.fov_y_degrees.to_radians() / 2.0).tan() / self.viewport_height;

        let forward = (self.target - camera.position).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let ground_forward = Vec3::Y.cross(right).normalize_or_zero();

        self.pan_offset += right * (-dx * units_per_pixel);
        self.pan_offset += ground_forward * (dy * units_per_pixel);
    }

    /// Queues a pan originating from the arrow keys.
    pub fn key_pan(&mut self, dx: f32, dy: f32, camera: &PerspectiveCamera) {
        self.pan(dx * self.key_pan_speed, dy * self.key_pan_speed, camera);
    }

    /// Advances the damping state by one step and writes the resulting eye
    /// position into the camera.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) {
        let offset = camera.position - self.target;
        let radius = offset.length().max(f32::EPSILON);
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.delta_theta * self.damping_factor;
        phi += self.delta_phi * self.damping_factor;
        phi = phi.clamp(1e-6, self.max_polar_angle);

        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.scale = 1.0;

        self.target += self.pan_offset * self.damping_factor;

        let keep = 1.0 - self.damping_factor;
        self.delta_theta *= keep;
        self.delta_phi *= keep;
        self.pan_offset *= keep;

        camera.target = self.target;
        camera.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Current orbit distance from the target.
    pub fn distance(&self, camera: &PerspectiveCamera) -> f32 {
        (camera.position - self.target).length()
    }

    /// Current polar angle from the up axis, in radians.
    pub fn polar_angle(&self, camera: &PerspectiveCamera) -> f32 {
        let offset = camera.position - self.target;
        let radius = offset.length().max(f32::EPSILON);
        (offset.y / radius).clamp(-1.0, 1.0).acos()
    }
}
