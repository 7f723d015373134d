/// Scene upload manager - staged copies into GPU-only buffers
///
/// Every upload is synchronous: a CPU-visible staging buffer is filled, a
/// one-shot copy into a GPU-only destination is submitted and waited on,
/// then the staging buffer is destroyed. The destination's device address
/// is what the shaders receive through the push constants.

use std::sync::Arc;
use std::time::Instant;
use bytemuck::Pod;
use glam::Mat4;
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::{engine_debug, engine_info, engine_warn};
use crate::graphics_device::{
    RenderContext, BufferUsage, MemoryResidency, CommandList, ImageBarrier,
    Texture, TextureDesc, TextureFormat, TextureUsage,
};
use crate::resource::{GpuResourceAllocator, GpuBuffer, GpuImage, AllocatorStats};
use crate::frame::CommandRecorder;
use crate::mesh::MeshletGeometry;
use crate::scene::{Scene, TextureImage};
use crate::upload::{PushConstantData, SceneInfo};

const SOURCE: &str = "cluster3d::SceneUploadManager";

new_key_type! {
    /// Key of a buffer owned by the upload manager
    pub struct UploadKey;
}

/// Result of one non-empty upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadedBuffer {
    pub key: UploadKey,
    pub address: u64,
    /// Bytes copied
    pub size: u64,
    /// Records copied
    pub count: u32,
}

/// Address of an optional upload, 0 when nothing was uploaded
fn address_of(buffer: Option<UploadedBuffer>) -> u64 {
    buffer.map_or(0, |b| b.address)
}

fn count_of(buffer: Option<UploadedBuffer>) -> u32 {
    buffer.map_or(0, |b| b.count)
}

/// Everything the meshlet pass reads, uploaded once before the frame loop
#[derive(Clone, Default)]
pub struct SceneBuffers {
    pub meshlets: Option<UploadedBuffer>,
    pub meshlet_vertices: Option<UploadedBuffer>,
    pub meshlet_triangles: Option<UploadedBuffer>,
    pub mesh_views: Option<UploadedBuffer>,
    pub vertices: Option<UploadedBuffer>,
    pub materials: Option<UploadedBuffer>,
    pub point_lights: Option<UploadedBuffer>,
    pub spot_lights: Option<UploadedBuffer>,
    pub dir_lights: Option<UploadedBuffer>,
    /// Material textures in library order, for the shader program's descriptor set
    pub textures: Vec<Arc<dyn Texture>>,
}

impl SceneBuffers {
    /// One task work group per meshlet
    pub fn meshlet_count(&self) -> u32 {
        count_of(self.meshlets)
    }

    pub fn scene_info(&self) -> SceneInfo {
        SceneInfo {
            mesh_count: count_of(self.mesh_views),
            point_light_count: count_of(self.point_lights),
            spot_light_count: count_of(self.spot_lights),
            direction_light_count: count_of(self.dir_lights),
        }
    }

    /// Push constant block for one frame
    pub fn push_constants(&self, proj_view: Mat4, world: Mat4) -> PushConstantData {
        let mut data = PushConstantData {
            scene_info: self.scene_info(),
            meshlets_address: address_of(self.meshlets),
            meshlet_vertices_address: address_of(self.meshlet_vertices),
            meshlet_triangles_address: address_of(self.meshlet_triangles),
            mesh_views_address: address_of(self.mesh_views),
            vertices_address: address_of(self.vertices),
            materials_address: address_of(self.materials),
            point_lights_address: address_of(self.point_lights),
            spot_lights_address: address_of(self.spot_lights),
            dir_lights_address: address_of(self.dir_lights),
            ..PushConstantData::default()
        };
        data.set_transforms(proj_view, world);
        data
    }
}

/// Upload counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UploadStats {
    pub buffers: u32,
    pub buffer_bytes: u64,
    /// Empty inputs that were skipped
    pub skipped: u32,
    pub textures: u32,
    pub texture_bytes: u64,
    pub elapsed_ms: f64,
}

/// Owns every uploaded buffer and texture
pub struct SceneUploadManager {
    allocator: GpuResourceAllocator,
    buffers: SlotMap<UploadKey, GpuBuffer>,
    images: Vec<GpuImage>,
    stats: UploadStats,
}

impl SceneUploadManager {
    pub fn new(context: RenderContext) -> Self {
        Self {
            allocator: GpuResourceAllocator::new(context),
            buffers: SlotMap::with_key(),
            images: Vec::new(),
            stats: UploadStats::default(),
        }
    }

    /// Upload a flat array of records into a new GPU-only buffer
    ///
    /// # Returns
    ///
    /// `None` for an empty slice: nothing is allocated and nothing is copied.
    ///
    /// # Errors
    ///
    /// `InvalidResource` for a usage shaders cannot address, allocation and
    /// submission errors otherwise. No buffer is kept on failure.
    pub fn upload<T: Pod>(
        &mut self,
        recorder: &mut CommandRecorder,
        data: &[T],
        usage: BufferUsage,
    ) -> Result<Option<UploadedBuffer>> {
        if !usage.is_shader_visible() {
            return Err(Error::InvalidResource(format!(
                "{:?} is not an upload destination usage", usage
            )));
        }
        if data.is_empty() {
            engine_debug!(SOURCE, "empty {:?} upload skipped", usage);
            self.stats.skipped += 1;
            return Ok(None);
        }

        let start = Instant::now();
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let size = bytes.len() as u64;

        let staging = self.allocator.create_buffer(size, BufferUsage::Staging, MemoryResidency::CpuToGpu)?;
        let destination = match self.fill_and_copy(recorder, &staging, bytes, usage) {
            Ok(destination) => destination,
            Err(e) => {
                self.allocator.destroy_buffer(staging);
                return Err(e);
            }
        };
        self.allocator.destroy_buffer(staging);

        let address = destination.device_address();
        let key = self.buffers.insert(destination);
        self.stats.buffers += 1;
        self.stats.buffer_bytes += size;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        self.stats.elapsed_ms += elapsed;
        engine_debug!(SOURCE, "uploaded {} x {} bytes ({:?}) to 0x{:x} in {:.2} ms",
            data.len(), std::mem::size_of::<T>(), usage, address, elapsed);

        Ok(Some(UploadedBuffer { key, address, size, count: data.len() as u32 }))
    }

    fn fill_and_copy(
        &mut self,
        recorder: &mut CommandRecorder,
        staging: &GpuBuffer,
        bytes: &[u8],
        usage: BufferUsage,
    ) -> Result<GpuBuffer> {
        staging.buffer().update(0, bytes)?;
        let destination = self.allocator.create_buffer(bytes.len() as u64, usage, MemoryResidency::GpuOnly)?;
        let size = bytes.len() as u64;
        let copied = recorder.record_immediate(|cmd| {
            cmd.copy_buffer(staging.buffer(), destination.buffer(), size)
        });
        match copied {
            Ok(()) => Ok(destination),
            Err(e) => {
                self.allocator.destroy_buffer(destination);
                Err(e)
            }
        }
    }

    /// Upload one RGBA8 image and leave it in shader-read layout
    pub fn upload_texture(
        &mut self,
        recorder: &mut CommandRecorder,
        image: &TextureImage,
    ) -> Result<Arc<dyn Texture>> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.byte_size() != expected {
            return Err(Error::InvalidResource(format!(
                "{}x{} image carries {} bytes, expected {}",
                image.width, image.height, image.byte_size(), expected
            )));
        }

        let gpu_image = self.allocator.create_image(TextureDesc {
            width: image.width,
            height: image.height,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::Sampled,
        })?;
        let staging = match self.allocator.create_buffer(
            expected as u64, BufferUsage::Staging, MemoryResidency::CpuToGpu,
        ) {
            Ok(staging) => staging,
            Err(e) => {
                self.allocator.destroy_image(gpu_image);
                return Err(e);
            }
        };

        let copied = staging.buffer().update(0, &image.pixels).and_then(|()| {
            recorder.record_immediate(|cmd: &mut dyn CommandList| {
                let texture = gpu_image.texture();
                cmd.pipeline_barrier(&[ImageBarrier::transfer_dst(texture)])?;
                cmd.copy_buffer_to_texture(staging.buffer(), texture)?;
                cmd.pipeline_barrier(&[ImageBarrier::shader_read(texture)])
            })
        });
        self.allocator.destroy_buffer(staging);
        if let Err(e) = copied {
            self.allocator.destroy_image(gpu_image);
            return Err(e);
        }

        let texture = gpu_image.shared_texture();
        self.images.push(gpu_image);
        self.stats.textures += 1;
        self.stats.texture_bytes += expected as u64;
        Ok(texture)
    }

    /// Upload the built geometry, materials, textures and lights of a scene
    ///
    /// Vertices come from `geometry` (the optimized pool), not from the
    /// scene's raw import pool.
    pub fn upload_scene(
        &mut self,
        recorder: &mut CommandRecorder,
        scene: &Scene,
        geometry: &MeshletGeometry,
    ) -> Result<SceneBuffers> {
        let start = Instant::now();
        let materials = scene.materials();
        let lights = scene.lights();

        let mut textures = Vec::with_capacity(materials.textures().len());
        for image in materials.textures() {
            textures.push(self.upload_texture(recorder, image)?);
        }

        let buffers = SceneBuffers {
            meshlets: self.upload(recorder, &geometry.meshlets, BufferUsage::Geometry)?,
            meshlet_vertices: self.upload(recorder, &geometry.meshlet_vertices, BufferUsage::Geometry)?,
            meshlet_triangles: self.upload(recorder, &geometry.meshlet_triangles, BufferUsage::Geometry)?,
            mesh_views: self.upload(recorder, &geometry.mesh_views, BufferUsage::Geometry)?,
            vertices: self.upload(recorder, &geometry.vertices, BufferUsage::Geometry)?,
            materials: self.upload(recorder, materials.groups(), BufferUsage::Material)?,
            point_lights: self.upload(recorder, lights.point_lights(), BufferUsage::Light)?,
            spot_lights: self.upload(recorder, lights.spot_lights(), BufferUsage::Light)?,
            dir_lights: self.upload(recorder, lights.dir_lights(), BufferUsage::Light)?,
            textures,
        };
        if buffers.meshlets.is_none() {
            engine_warn!(SOURCE, "scene has no meshlets, nothing will be drawn");
        }

        engine_info!(SOURCE,
            "scene uploaded: {} meshlets, {} mesh views, {} textures, {} lights, {} bytes in {:.2} ms",
            buffers.meshlet_count(), count_of(buffers.mesh_views), buffers.textures.len(),
            lights.total(), self.stats.buffer_bytes, start.elapsed().as_secs_f64() * 1000.0);
        Ok(buffers)
    }

    pub fn buffer(&self, key: UploadKey) -> Option<&GpuBuffer> {
        self.buffers.get(key)
    }

    /// Blocking readback of an uploaded buffer
    pub fn read_back(&self, key: UploadKey) -> Result<Vec<u8>> {
        let buffer = self.buffers.get(key).ok_or_else(|| {
            Error::InvalidResource(format!("no uploaded buffer for {:?}", key))
        })?;
        self.allocator.context().device()?.read_buffer(buffer.buffer())
    }

    /// Destroy one uploaded buffer; no in-flight frame may still read it
    pub fn release(&mut self, key: UploadKey) -> bool {
        match self.buffers.remove(key) {
            Some(buffer) => {
                self.allocator.destroy_buffer(buffer);
                true
            }
            None => false,
        }
    }

    /// Destroy every buffer and texture
    pub fn release_all(&mut self) {
        for (_, buffer) in self.buffers.drain() {
            self.allocator.destroy_buffer(buffer);
        }
        for image in self.images.drain(..) {
            self.allocator.destroy_image(image);
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    pub fn allocator_stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }
}

#[cfg(test)]
#[path = "scene_upload_tests.rs"]
mod tests;
