/// Scene - everything loaded before the frame loop starts
///
/// Geometry pools, materials and lights are filled single-threaded at
/// startup and are read-only once handed to the mesh builder and uploader.

use std::path::Path;
use glam::Mat4;
use crate::error::Result;
use crate::scene::{GeometryImporter, MaterialLibrary, LightSet, SceneLoadStats, gltf_loader};

#[derive(Debug, Clone, Default)]
pub struct Scene {
    geometry: GeometryImporter,
    materials: MaterialLibrary,
    lights: LightSet,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a glTF file, placing it with `transform`
    pub fn load_gltf(&mut self, path: impl AsRef<Path>, transform: &Mat4) -> Result<SceneLoadStats> {
        gltf_loader::load_gltf(self, path.as_ref(), transform)
    }

    /// Load a self-contained glTF held in memory
    pub fn load_gltf_slice(&mut self, bytes: &[u8], transform: &Mat4) -> Result<SceneLoadStats> {
        gltf_loader::load_gltf_slice(self, bytes, transform)
    }

    pub fn geometry(&self) -> &GeometryImporter {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut GeometryImporter {
        &mut self.geometry
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightSet {
        &mut self.lights
    }
}
