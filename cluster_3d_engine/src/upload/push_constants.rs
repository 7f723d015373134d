/// Push constant block shared with the task, mesh and fragment shaders
///
/// Field order and sizes must match the shader-side declaration exactly:
///
/// ```text
/// offset  size  field
///      0    64  proj_view
///     64    64  world
///    128    16  scene_info
///    144    72  nine u64 device addresses
/// ```

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use static_assertions::const_assert_eq;

/// Element counts of the scene buffers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct SceneInfo {
    /// Number of mesh views
    pub mesh_count: u32,
    pub point_light_count: u32,
    pub spot_light_count: u32,
    pub direction_light_count: u32,
}

/// Per-draw parameters; a buffer that was never uploaded has address 0
///
/// Matrices are stored as column arrays: `Mat4` is 16-byte aligned and
/// would pad the block past 216 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PushConstantData {
    pub proj_view: [[f32; 4]; 4],
    /// View transform, used by the fragment stage for lighting
    pub world: [[f32; 4]; 4],
    pub scene_info: SceneInfo,

    pub meshlets_address: u64,
    pub meshlet_vertices_address: u64,
    pub meshlet_triangles_address: u64,

    pub mesh_views_address: u64,
    pub vertices_address: u64,
    pub materials_address: u64,

    pub point_lights_address: u64,
    pub spot_lights_address: u64,
    pub dir_lights_address: u64,
}

const_assert_eq!(std::mem::size_of::<SceneInfo>(), 16);
const_assert_eq!(std::mem::size_of::<PushConstantData>(), 216);
const_assert_eq!(std::mem::align_of::<PushConstantData>(), 8);

impl PushConstantData {
    /// Size of the push constant range declared by shader programs
    pub const SIZE: u32 = std::mem::size_of::<PushConstantData>() as u32;

    pub fn set_transforms(&mut self, proj_view: Mat4, world: Mat4) {
        self.proj_view = proj_view.to_cols_array_2d();
        self.world = world.to_cols_array_2d();
    }

    pub fn proj_view(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.proj_view)
    }

    pub fn world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for PushConstantData {
    fn default() -> Self {
        let mut data: Self = Zeroable::zeroed();
        data.set_transforms(Mat4::IDENTITY, Mat4::IDENTITY);
        data
    }
}

#[cfg(test)]
#[path = "push_constants_tests.rs"]
mod tests;
