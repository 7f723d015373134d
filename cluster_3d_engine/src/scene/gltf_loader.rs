/// glTF 2.0 loader (`.gltf` / `.glb`, `KHR_lights_punctual`)
///
/// Walks the default scene's node tree with world transforms. Every
/// triangle primitive becomes one submesh in the scene's geometry pools,
/// every material one material group, and every punctual light is appended
/// to the light set.

use std::path::Path;
use std::time::Instant;
use glam::{Mat4, Vec3};
use gltf::khr_lights_punctual::Kind;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_info, engine_warn};
use crate::scene::{
    Scene, SubmeshSource, IndexData, MaterialIdTable,
    PointLight, SpotLight, DirLight, ImageMime, MISSING_TEXTURE,
};

const SOURCE: &str = "cluster3d::GltfLoader";

/// Radius given to lights without a `range`
pub const DEFAULT_LIGHT_RANGE: f32 = 100.0;

/// What one load added to the scene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLoadStats {
    pub submeshes: u32,
    pub skipped_primitives: u32,
    pub materials: u32,
    pub textures: u32,
    pub point_lights: u32,
    pub spot_lights: u32,
    pub dir_lights: u32,
    pub vertices: u64,
    pub triangles: u64,
    pub elapsed_ms: f64,
}

struct LoadContext<'a> {
    scene: &'a mut Scene,
    buffers: Vec<gltf::buffer::Data>,
    base_dir: Option<&'a Path>,
    material_ids: MaterialIdTable,
    image_slots: FxHashMap<usize, u32>,
    stats: SceneLoadStats,
}

/// Load a glTF file from disk
///
/// # Errors
///
/// `AssetError` when the file cannot be read or parsed, or when a primitive
/// carries malformed geometry.
pub fn load_gltf(scene: &mut Scene, path: &Path, transform: &Mat4) -> Result<SceneLoadStats> {
    let start = Instant::now();
    let gltf = gltf::Gltf::open(path)
        .map_err(|e| Error::AssetError(format!("{}: {}", path.display(), e)))?;
    let base_dir = path.parent();
    let gltf::Gltf { document, blob } = gltf;
    let buffers = gltf::import_buffers(&document, base_dir, blob)
        .map_err(|e| Error::AssetError(format!("{}: {}", path.display(), e)))?;
    engine_debug!(SOURCE, "parsed {} in {:.2} ms", path.display(), start.elapsed().as_secs_f64() * 1000.0);

    let mut stats = load_document(scene, &document, buffers, base_dir, transform)?;
    stats.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    engine_info!(SOURCE,
        "loaded {}: {} submeshes, {} vertices, {} triangles, {} materials, {} lights in {:.2} ms",
        path.display(), stats.submeshes, stats.vertices, stats.triangles, stats.materials,
        stats.point_lights + stats.spot_lights + stats.dir_lights, stats.elapsed_ms);
    Ok(stats)
}

/// Load a self-contained glTF (GLB or embedded buffers) from memory
pub fn load_gltf_slice(scene: &mut Scene, bytes: &[u8], transform: &Mat4) -> Result<SceneLoadStats> {
    let start = Instant::now();
    let gltf = gltf::Gltf::from_slice(bytes)
        .map_err(|e| Error::AssetError(format!("glTF parse failed: {}", e)))?;
    let gltf::Gltf { document, blob } = gltf;
    let buffers = gltf::import_buffers(&document, None, blob)
        .map_err(|e| Error::AssetError(format!("glTF buffers: {}", e)))?;

    let mut stats = load_document(scene, &document, buffers, None, transform)?;
    stats.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    Ok(stats)
}

fn load_document(
    scene: &mut Scene,
    document: &gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
    base_dir: Option<&Path>,
    transform: &Mat4,
) -> Result<SceneLoadStats> {
    let mut context = LoadContext {
        scene,
        buffers,
        base_dir,
        material_ids: MaterialIdTable::new(),
        image_slots: FxHashMap::default(),
        stats: SceneLoadStats::default(),
    };

    let stage = Instant::now();
    for material in document.materials() {
        context.import_material(&material)?;
    }
    engine_debug!(SOURCE, "{} materials in {:.2} ms",
        context.stats.materials, stage.elapsed().as_secs_f64() * 1000.0);

    let stage = Instant::now();
    for node in root_nodes(document) {
        context.visit(&node, transform)?;
    }
    engine_debug!(SOURCE, "{} submeshes in {:.2} ms",
        context.stats.submeshes, stage.elapsed().as_secs_f64() * 1000.0);

    Ok(context.stats)
}

/// Roots of the default scene, or every parentless node when the file
/// declares no scene
fn root_nodes(document: &gltf::Document) -> Vec<gltf::Node<'_>> {
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        return scene.nodes().collect();
    }
    let mut is_child = vec![false; document.nodes().len()];
    for node in document.nodes() {
        for child in node.children() {
            is_child[child.index()] = true;
        }
    }
    document.nodes().filter(|n| !is_child[n.index()]).collect()
}

impl LoadContext<'_> {
    fn visit(&mut self, node: &gltf::Node<'_>, parent: &Mat4) -> Result<()> {
        let world = *parent * Mat4::from_cols_array_2d(&node.transform().matrix());

        if let Some(light) = node.light() {
            self.import_light(&light, &world);
        }
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                self.import_primitive(&primitive, &world)?;
            }
        }
        for child in node.children() {
            self.visit(&child, &world)?;
        }
        Ok(())
    }

    fn import_light(&mut self, light: &gltf::khr_lights_punctual::Light<'_>, world: &Mat4) {
        let color = Vec3::from_array(light.color());
        let position = world.transform_point3(Vec3::ZERO);
        let direction = world.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
        let radius = light.range().unwrap_or(DEFAULT_LIGHT_RANGE);
        let lights = self.scene.lights_mut();

        match light.kind() {
            Kind::Point => {
                lights.add_point_light(PointLight::new(position, radius, color, 0.0));
                self.stats.point_lights += 1;
            }
            Kind::Spot { inner_cone_angle, outer_cone_angle } => {
                lights.add_spot_light(SpotLight::new(
                    position,
                    radius,
                    direction.extend(1.0),
                    color,
                    0.0,
                    outer_cone_angle,
                    inner_cone_angle,
                ));
                self.stats.spot_lights += 1;
            }
            Kind::Directional => {
                lights.add_dir_light(DirLight::new(direction.extend(1.0), color.extend(1.0)));
                self.stats.dir_lights += 1;
            }
        }
    }

    fn import_material(&mut self, material: &gltf::Material<'_>) -> Result<()> {
        let pbr = material.pbr_metallic_roughness();
        let diffuse = match pbr.base_color_texture() {
            Some(info) => Some(self.import_image(&info.texture().source())?),
            None => None,
        };
        let metallic_roughness = match pbr.metallic_roughness_texture() {
            Some(info) => Some(self.import_image(&info.texture().source())?),
            None => None,
        };
        let emissive = match material.emissive_texture() {
            Some(info) => Some(self.import_image(&info.texture().source())?),
            None => None,
        };

        let group = self.scene.materials_mut().add_material(diffuse, metallic_roughness, emissive);
        self.material_ids.push(group);
        self.stats.materials += 1;
        Ok(())
    }

    /// Texture slot of an image, decoding it on first use
    fn import_image(&mut self, image: &gltf::Image<'_>) -> Result<u32> {
        if let Some(&slot) = self.image_slots.get(&image.index()) {
            return Ok(slot);
        }

        let slot = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let data = self.buffers.get(view.buffer().index()).ok_or_else(|| {
                    Error::AssetError(format!("image {} references a missing buffer", image.index()))
                })?;
                let bytes = data
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| Error::AssetError(format!(
                        "image {} view exceeds its buffer", image.index()
                    )))?;
                self.scene.materials_mut().import_texture(bytes, &ImageMime::from_mime_type(mime_type))?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                match (uri.starts_with("data:"), self.base_dir) {
                    (false, Some(base_dir)) => {
                        let path = base_dir.join(uri);
                        let bytes = std::fs::read(&path).map_err(|e| {
                            Error::AssetError(format!("{}: {}", path.display(), e))
                        })?;
                        let mime = mime_type
                            .map(ImageMime::from_mime_type)
                            .or_else(|| ImageMime::from_extension(uri))
                            .unwrap_or_else(|| ImageMime::sniff(&bytes));
                        self.scene.materials_mut().import_texture(&bytes, &mime)?
                    }
                    _ => {
                        engine_warn!(SOURCE, "image {} uses an unsupported uri, using fallback", image.index());
                        MISSING_TEXTURE
                    }
                }
            }
        };

        if slot != MISSING_TEXTURE {
            self.stats.textures += 1;
        }
        self.image_slots.insert(image.index(), slot);
        Ok(slot)
    }

    fn import_primitive(&mut self, primitive: &gltf::Primitive<'_>, world: &Mat4) -> Result<()> {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            engine_warn!(SOURCE, "skipping {:?} primitive", primitive.mode());
            self.stats.skipped_primitives += 1;
            return Ok(());
        }

        let buffers = &self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| Error::AssetError("primitive without POSITION".to_string()))?
            .collect();
        let normals = reader.read_normals().map(|n| n.collect());
        let tex_coords = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
        let indices = match reader.read_indices() {
            Some(gltf::mesh::util::ReadIndices::U8(i)) => IndexData::U16(i.map(u16::from).collect()),
            Some(gltf::mesh::util::ReadIndices::U16(i)) => IndexData::U16(i.collect()),
            Some(gltf::mesh::util::ReadIndices::U32(i)) => IndexData::U32(i.collect()),
            None => IndexData::U32((0..positions.len() as u32).collect()),
        };

        let source = SubmeshSource {
            positions,
            normals,
            tex_coords,
            indices,
            material: primitive.material().index(),
        };
        let range = self.scene.geometry_mut().import(&source, world, &self.material_ids)?;

        self.stats.submeshes += 1;
        self.stats.vertices += source.positions.len() as u64;
        self.stats.triangles += range.triangle_count() as u64;
        Ok(())
    }
}

#[cfg(test)]
#[path = "gltf_loader_tests.rs"]
mod tests;
