/// Material library
///
/// Owns every decoded texture of the scene and the material index groups
/// that reference them. Three debug textures always occupy the first
/// slots, and material group 0 is built from them:
///
/// | slot | texture                         |
/// |------|---------------------------------|
/// | 0    | 16x16 magenta/black checkerboard|
/// | 1    | 1x1 black (transparent)         |
/// | 2    | 1x1 white                       |

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use crate::error::Result;
use crate::engine_debug;
use crate::scene::texture_decode::{decode_texture, ImageMime, TextureImage};

const SOURCE: &str = "cluster3d::MaterialLibrary";

pub const CHECKERBOARD_TEXTURE: u32 = 0;
pub const BLACK_TEXTURE: u32 = 1;
pub const WHITE_TEXTURE: u32 = 2;

/// Material every submesh without a material uses
pub const DEFAULT_MATERIAL: u32 = 0;

/// Texture slot returned for images that could not be decoded
pub const MISSING_TEXTURE: u32 = CHECKERBOARD_TEXTURE;

/// Texture indices of one material
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct MaterialIndexGroup {
    pub diffuse: u32,
    pub metallic_roughness: u32,
    pub emissive: u32,
}

impl MaterialIndexGroup {
    pub fn new(diffuse: u32, metallic_roughness: u32, emissive: u32) -> Self {
        Self { diffuse, metallic_roughness, emissive }
    }
}

const_assert_eq!(std::mem::size_of::<MaterialIndexGroup>(), 12);

fn checkerboard() -> TextureImage {
    const MAGENTA: [u8; 4] = [255, 0, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 0];
    let mut pixels = Vec::with_capacity(16 * 16 * 4);
    for y in 0..16 {
        for x in 0..16 {
            let texel = if (x % 2) ^ (y % 2) == 1 { MAGENTA } else { BLACK };
            pixels.extend_from_slice(&texel);
        }
    }
    TextureImage { width: 16, height: 16, pixels }
}

/// Per-load table from asset material index to global material group
///
/// Built while a file's materials are imported, so submeshes keep pointing
/// at the right group however many assets were loaded before.
#[derive(Debug, Clone, Default)]
pub struct MaterialIdTable {
    ids: Vec<u32>,
}

impl MaterialIdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: u32) {
        self.ids.push(group);
    }

    /// Global group of an asset material; no material (or an index the
    /// file never declared) maps to `DEFAULT_MATERIAL`
    pub fn resolve(&self, asset_material: Option<usize>) -> u32 {
        asset_material
            .and_then(|index| self.ids.get(index).copied())
            .unwrap_or(DEFAULT_MATERIAL)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Textures plus material index groups
#[derive(Debug, Clone)]
pub struct MaterialLibrary {
    textures: Vec<TextureImage>,
    groups: Vec<MaterialIndexGroup>,
}

impl MaterialLibrary {
    /// Library holding only the debug textures and material group 0
    pub fn new() -> Self {
        Self {
            textures: vec![
                checkerboard(),
                TextureImage::solid(1, 1, [0, 0, 0, 0]),
                TextureImage::solid(1, 1, [255, 255, 255, 255]),
            ],
            groups: vec![MaterialIndexGroup::new(CHECKERBOARD_TEXTURE, BLACK_TEXTURE, BLACK_TEXTURE)],
        }
    }

    /// Add a decoded texture, returning its slot
    pub fn add_texture(&mut self, image: TextureImage) -> u32 {
        self.textures.push(image);
        self.textures.len() as u32 - 1
    }

    /// Decode and add an image payload
    ///
    /// Unsupported containers return `MISSING_TEXTURE` without adding a slot.
    pub fn import_texture(&mut self, bytes: &[u8], mime: &ImageMime) -> Result<u32> {
        match decode_texture(bytes, mime)? {
            Some(image) => {
                engine_debug!(SOURCE, "texture {}x{} ({:?})", image.width, image.height, mime);
                Ok(self.add_texture(image))
            }
            None => Ok(MISSING_TEXTURE),
        }
    }

    /// Add a material; absent textures fall back to the checkerboard for
    /// diffuse and the black texture for metallic-roughness and emissive
    pub fn add_material(
        &mut self,
        diffuse: Option<u32>,
        metallic_roughness: Option<u32>,
        emissive: Option<u32>,
    ) -> u32 {
        self.groups.push(MaterialIndexGroup::new(
            diffuse.unwrap_or(CHECKERBOARD_TEXTURE),
            metallic_roughness.unwrap_or(BLACK_TEXTURE),
            emissive.unwrap_or(BLACK_TEXTURE),
        ));
        self.groups.len() as u32 - 1
    }

    pub fn textures(&self) -> &[TextureImage] {
        &self.textures
    }

    pub fn groups(&self) -> &[MaterialIndexGroup] {
        &self.groups
    }

    pub fn texture_count(&self) -> u32 {
        self.textures.len() as u32
    }

    pub fn material_count(&self) -> u32 {
        self.groups.len() as u32
    }
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
