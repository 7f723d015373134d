//! Scene module
//!
//! Geometry import into shared pools, materials and textures, lights,
//! glTF loading and the camera.

mod camera;
mod geometry_importer;
mod gltf_loader;
mod lights;
mod material;
mod scene;
mod texture_decode;

pub use camera::{Camera, CameraInput};
pub use geometry_importer::{GeometryImporter, SubmeshSource, IndexData};
pub use gltf_loader::{SceneLoadStats, DEFAULT_LIGHT_RANGE};
pub use lights::{PointLight, SpotLight, DirLight, LightSet, DEMO_LIGHT_SEED, DEMO_LIGHT_CENTRE};
pub use material::{
    MaterialIndexGroup, MaterialLibrary, MaterialIdTable,
    CHECKERBOARD_TEXTURE, BLACK_TEXTURE, WHITE_TEXTURE, DEFAULT_MATERIAL, MISSING_TEXTURE,
};
pub use scene::Scene;
pub use texture_decode::{TextureImage, ImageMime, decode_texture};
