/// Engine configuration
///
/// Tuning constants of the mesh pipeline and the frame loop. All values have
/// sensible defaults; `validate()` rejects combinations the GPU side cannot
/// handle.

use crate::error::{Error, Result};

/// Which validation messages get reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Meshlet clustering and mesh optimization parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshletConfig {
    /// Maximum unique vertices per meshlet (local indices are u8)
    pub max_vertices: usize,
    /// Maximum triangles per meshlet
    pub max_triangles: usize,
    /// Weight of the normal cone term when scoring candidate triangles, in [0, 1]
    pub cone_weight: f32,
    /// Overdraw optimizer tolerance: 1.05 allows 5% more vertex cache misses
    pub overdraw_threshold: f32,
}

impl Default for MeshletConfig {
    fn default() -> Self {
        Self {
            max_vertices: 64,
            max_triangles: 124,
            cone_weight: 0.25,
            overdraw_threshold: 1.05,
        }
    }
}

impl MeshletConfig {
    /// Check limits
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` when a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(3..=255).contains(&self.max_vertices) {
            return Err(Error::InvalidConfig(format!(
                "max_vertices must be in 3..=255, got {}", self.max_vertices
            )));
        }
        if !(1..=512).contains(&self.max_triangles) || self.max_triangles % 4 != 0 {
            return Err(Error::InvalidConfig(format!(
                "max_triangles must be a multiple of 4 in 4..=512, got {}", self.max_triangles
            )));
        }
        if !(0.0..=1.0).contains(&self.cone_weight) {
            return Err(Error::InvalidConfig(format!(
                "cone_weight must be in [0, 1], got {}", self.cone_weight
            )));
        }
        if !(self.overdraw_threshold >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "overdraw_threshold must be >= 1.0, got {}", self.overdraw_threshold
            )));
        }
        Ok(())
    }
}

/// Projection and movement parameters of the fly camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second
    pub move_speed: f32,
    /// Degrees per pixel of mouse motion
    pub look_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 90.0,
            near: 0.1,
            far: 4000.0,
            move_speed: 10.0,
            look_speed: 0.1,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable the Vulkan validation layer (requires the `vulkan-validation` feature)
    pub enable_validation: bool,
    /// Minimum severity of reported validation messages
    pub debug_severity: DebugSeverity,
    /// FIFO presentation when true, MAILBOX/IMMEDIATE when false
    pub vsync: bool,
    /// Color attachment clear value
    pub clear_color: [f32; 4],
    /// Depth attachment clear value
    pub clear_depth: f32,
    pub meshlet: MeshletConfig,
    pub camera: CameraConfig,
    /// Application name reported to the driver
    pub app_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            vsync: true,
            clear_color: [0.1, 0.1, 0.3, 1.0],
            clear_depth: 1.0,
            meshlet: MeshletConfig::default(),
            camera: CameraConfig::default(),
            app_name: "Cluster3D Application".to_string(),
        }
    }
}

impl Config {
    /// Validate every sub-configuration
    pub fn validate(&self) -> Result<()> {
        self.meshlet.validate()?;
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return Err(Error::InvalidConfig(format!(
                "camera planes must satisfy 0 < near < far, got near={} far={}",
                self.camera.near, self.camera.far
            )));
        }
        if !(self.camera.fov_y_degrees > 0.0 && self.camera.fov_y_degrees < 180.0) {
            return Err(Error::InvalidConfig(format!(
                "fov_y_degrees must be in (0, 180), got {}", self.camera.fov_y_degrees
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
