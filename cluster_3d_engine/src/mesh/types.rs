/// GPU-facing geometry records
///
/// Every type here is uploaded verbatim, so layouts are `#[repr(C)]` and
/// their sizes are checked at compile time against the shader side.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use static_assertions::const_assert_eq;

/// Interleaved vertex: position, u, normal, v (texture coordinates split
/// to fill the vec3 padding)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub u: f32,
    pub normal: Vec3,
    pub v: f32,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self { position, u: uv[0], normal, v: uv[1] }
    }

    /// Bit pattern used for exact deduplication (-0.0 and 0.0 differ)
    pub fn bit_key(&self) -> [u32; 8] {
        bytemuck::cast(*self)
    }
}

/// One meshlet descriptor
///
/// `vertex_offset`/`vertex_count` address the shared meshlet-vertex array,
/// `triangle_offset` the shared packed triangle byte array, where the region
/// of a meshlet is `triangle_count * 3` bytes rounded up to 4.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Meshlet {
    pub vertex_offset: u32,
    pub triangle_offset: u32,
    pub vertex_count: u32,
    pub triangle_count: u32,
}

impl Meshlet {
    /// Bytes reserved for this meshlet in the triangle array
    pub fn triangle_bytes(&self) -> u32 {
        padded_triangle_bytes(self.triangle_count)
    }
}

/// `triangle_count * 3` rounded up to a multiple of 4
pub fn padded_triangle_bytes(triangle_count: u32) -> u32 {
    (triangle_count * 3 + 3) & !3
}

/// Half-open meshlet range `[start, end)` drawn with one material
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct MeshView {
    pub start: u32,
    pub end: u32,
    pub material: u32,
    pub padding: u32,
}

impl MeshView {
    pub fn meshlet_count(&self) -> u32 {
        self.end - self.start
    }
}

/// Half-open index range `[start, end)` of one submesh in the shared index pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshRange {
    pub start: u32,
    pub end: u32,
    /// Index into the global material group array
    pub material: u32,
}

impl SubmeshRange {
    pub fn index_count(&self) -> u32 {
        self.end - self.start
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count() / 3
    }
}

const_assert_eq!(std::mem::size_of::<Vertex>(), 32);
const_assert_eq!(std::mem::size_of::<Meshlet>(), 16);
const_assert_eq!(std::mem::size_of::<MeshView>(), 16);
