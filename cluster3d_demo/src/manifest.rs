/// Demo manifest - which scenes to load and how to open the window
///
/// Read from a TOML file. A missing file falls back to the built-in scene
/// list; a file that exists but does not parse is an error.

use std::path::{Path, PathBuf};
use cluster_3d_engine::cluster3d::{Error, Result};
use cluster_3d_engine::glam::{Mat4, Quat, Vec3};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub window: WindowSection,
    pub shaders: ShaderSection,
    /// Spawn the seeded demo lights on top of the lights found in the scenes
    pub demo_lights: bool,
    #[serde(rename = "model", default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

/// SPIR-V files of the meshlet program
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ShaderSection {
    pub task: PathBuf,
    pub mesh: PathBuf,
    pub fragment: PathBuf,
}

/// One glTF placement: scale, then rotate, then translate
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default)]
    pub rotation: Option<Rotation>,
    #[serde(default = "unit_scale")]
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Rotation {
    pub axis: [f32; 3],
    pub degrees: f32,
}

fn unit_scale() -> f32 {
    1.0
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: "Cluster3D".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            fullscreen: false,
        }
    }
}

impl Default for ShaderSection {
    fn default() -> Self {
        Self {
            task: PathBuf::from("shaders/meshlet.task.spv"),
            mesh: PathBuf::from("shaders/meshlet.mesh.spv"),
            fragment: PathBuf::from("shaders/meshlet.frag.spv"),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        let flipped = |degrees| Some(Rotation { axis: [-1.0, 0.0, 0.0], degrees });
        Self {
            window: WindowSection::default(),
            shaders: ShaderSection::default(),
            demo_lights: true,
            models: vec![
                ModelEntry {
                    path: PathBuf::from("assets/stanford_dragon.glb"),
                    translation: [5.0, 5.0, 2.0],
                    rotation: flipped(180.0),
                    scale: 0.1,
                },
                ModelEntry {
                    path: PathBuf::from("assets/DamagedHelmet.glb"),
                    translation: [-5.0, 0.0, 0.0],
                    rotation: flipped(90.0),
                    scale: 1.0,
                },
                ModelEntry {
                    path: PathBuf::from("assets/ToyCar.glb"),
                    translation: [-3.0, 0.0, 0.0],
                    rotation: flipped(90.0),
                    scale: 0.005,
                },
                ModelEntry {
                    path: PathBuf::from("assets/monke.glb"),
                    translation: [-2.0, -4.0, 3.0],
                    rotation: flipped(180.0),
                    scale: 1.0,
                },
            ],
        }
    }
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text)
            .map_err(|e| Error::InvalidConfig(format!("manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load `path`, or the defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::InvalidConfig(format!("{}: {}", path.display(), e))),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "window size {}x{} must be non-zero", self.window.width, self.window.height
            )));
        }
        for model in &self.models {
            if !(model.scale.is_finite() && model.scale > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{}: scale {} must be positive", model.path.display(), model.scale
                )));
            }
            if let Some(rotation) = model.rotation {
                if Vec3::from_array(rotation.axis).length_squared() == 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "{}: rotation axis is zero", model.path.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ModelEntry {
    pub fn transform(&self) -> Mat4 {
        let rotation = self.rotation.map_or(Quat::IDENTITY, |r| {
            Quat::from_axis_angle(Vec3::from_array(r.axis).normalize(), r.degrees.to_radians())
        });
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            rotation,
            Vec3::from_array(self.translation),
        )
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
