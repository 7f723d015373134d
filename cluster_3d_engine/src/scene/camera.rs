/// Camera - free-fly position with yaw/pitch
///
/// Yaw and pitch are in degrees. Yaw 0 looks along +X, yaw -90 along -Z.
/// `CameraInput` is the hand-off from the window thread: plain atomics
/// holding f32 bit patterns, one writer and one reader per field.

use std::sync::atomic::{AtomicU32, Ordering};
use glam::{Mat4, Vec3};
use crate::config::CameraConfig;

const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    config: CameraConfig,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self { position: Vec3::ZERO, yaw: -90.0, pitch: 0.0, config }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Unit view direction
    pub fn direction(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    /// Turn by mouse deltas (degrees); pitch is clamped short of the poles
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move along the view direction and sideways (positive `sideward` is left)
    pub fn move_by(&mut self, forward: f32, sideward: f32) {
        let direction = self.direction();
        self.position += forward * direction;
        self.position -= direction.cross(Vec3::Y).normalize_or_zero() * sideward;
    }

    /// Jump to `position`, looking down -Z
    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.yaw = -90.0;
        self.pitch = 0.0;
    }

    /// Consume the pending input and advance by `dt` seconds
    pub fn apply_input(&mut self, input: &CameraInput, dt: f32) {
        let (dx, dy) = input.take_look();
        self.rotate(dx * self.config.look_speed, -dy * self.config.look_speed);
        let (forward, sideward) = input.movement();
        let step = self.config.move_speed * dt;
        self.move_by(forward * step, sideward * step);
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.direction(), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.config.fov_y_degrees.to_radians(),
            aspect,
            self.config.near,
            self.config.far,
        )
    }

    /// `projection * view` for an extent
    pub fn view_projection(&self, width: u32, height: u32) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn take(&self) -> f32 {
        f32::from_bits(self.0.swap(0f32.to_bits(), Ordering::Relaxed))
    }
}

/// Camera input shared between the window thread (writer) and the render
/// thread (reader)
///
/// Lock-free; a frame may see input one frame late.
#[derive(Debug, Default)]
pub struct CameraInput {
    forward: AtomicF32,
    sideward: AtomicF32,
    look_x: AtomicF32,
    look_y: AtomicF32,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current movement axes, each in -1..=1
    pub fn set_movement(&self, forward: f32, sideward: f32) {
        self.forward.store(forward);
        self.sideward.store(sideward);
    }

    pub fn movement(&self) -> (f32, f32) {
        (self.forward.load(), self.sideward.load())
    }

    /// Accumulate mouse motion in pixels
    pub fn add_look(&self, dx: f32, dy: f32) {
        self.look_x.store(self.look_x.load() + dx);
        self.look_y.store(self.look_y.load() + dy);
    }

    /// Read and clear the accumulated mouse motion
    pub fn take_look(&self) -> (f32, f32) {
        (self.look_x.take(), self.look_y.take())
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
