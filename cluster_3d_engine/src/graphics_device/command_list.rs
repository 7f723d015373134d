/// CommandList trait - for recording GPU commands
///
/// Besides the recording trait this module holds the value types passed to
/// it: image barriers with explicit stage/access pairs, the dynamic pipeline
/// state block, viewports and clear values.

use crate::error::Result;
use crate::graphics_device::{Buffer, Texture, ShaderProgram};

// ============================================================================
// Synchronization value types
// ============================================================================

/// Image layout tracked by barriers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents are discarded
    Undefined,
    ColorAttachment,
    DepthAttachment,
    TransferDst,
    ShaderReadOnly,
    PresentSrc,
}

bitflags::bitflags! {
    /// Pipeline stages a barrier waits on or blocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const TASK_SHADER = 1 << 1;
        const MESH_SHADER = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const EARLY_FRAGMENT_TESTS = 1 << 4;
        const LATE_FRAGMENT_TESTS = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
        const ALL_COMMANDS = 1 << 9;
    }
}

bitflags::bitflags! {
    /// Memory accesses made visible/available by a barrier
    ///
    /// `AccessFlags::empty()` means no access (execution dependency only).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_SAMPLED_READ = 1 << 0;
        const SHADER_STORAGE_READ = 1 << 1;
        const COLOR_ATTACHMENT_WRITE = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 4;
        const TRANSFER_READ = 1 << 5;
        const TRANSFER_WRITE = 1 << 6;
    }
}

/// One image layout transition
///
/// The aspect (color or depth) is derived from the texture format.
#[derive(Clone, Copy)]
pub struct ImageBarrier<'a> {
    pub texture: &'a dyn Texture,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stages: PipelineStages,
    pub dst_access: AccessFlags,
}

impl<'a> ImageBarrier<'a> {
    /// Undefined -> color attachment, before the first color write of a frame
    pub fn color_attachment(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::ColorAttachment,
            src_stages: PipelineStages::TOP_OF_PIPE,
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
        }
    }

    /// Undefined -> depth attachment, before the depth clear of a frame
    pub fn depth_attachment(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::DepthAttachment,
            src_stages: PipelineStages::TOP_OF_PIPE,
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
            dst_access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        }
    }

    /// Color attachment -> present source, after the last color write
    pub fn present(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            old_layout: ImageLayout::ColorAttachment,
            new_layout: ImageLayout::PresentSrc,
            src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_stages: PipelineStages::BOTTOM_OF_PIPE,
            dst_access: AccessFlags::empty(),
        }
    }

    /// Undefined -> transfer destination, before a buffer-to-texture copy
    pub fn transfer_dst(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::TransferDst,
            src_stages: PipelineStages::TOP_OF_PIPE,
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::TRANSFER,
            dst_access: AccessFlags::TRANSFER_WRITE,
        }
    }

    /// Transfer destination -> shader read-only, after a buffer-to-texture copy
    pub fn shader_read(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            old_layout: ImageLayout::TransferDst,
            new_layout: ImageLayout::ShaderReadOnly,
            src_stages: PipelineStages::TRANSFER,
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_stages: PipelineStages::FRAGMENT_SHADER,
            dst_access: AccessFlags::SHADER_SAMPLED_READ,
        }
    }
}

// ============================================================================
// Dynamic state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
}

/// Color blend equation of attachment 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl BlendState {
    /// `src * a + dst * (1 - a)`
    pub fn alpha() -> Self {
        Self {
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

/// Every piece of pipeline state set dynamically before a draw
///
/// Shader objects have no baked pipeline, so the full block is emitted each
/// frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicState {
    pub rasterizer_discard: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub depth_bias: bool,
    pub depth_clamp: bool,
    pub stencil_test: bool,
    pub primitive_restart: bool,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    /// Rasterization sample count (1 = no MSAA)
    pub samples: u32,
    pub alpha_to_coverage: bool,
    /// None disables blending on attachment 0
    pub blend: Option<BlendState>,
}

impl DynamicState {
    /// State used by the meshlet pass
    ///
    /// Depth test and write with less-or-equal, single sample, alpha
    /// blending; stencil, depth clamp, depth bias and primitive restart off.
    pub fn mesh_shading() -> Self {
        Self {
            rasterizer_discard: false,
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::LessOrEqual,
            depth_bias: false,
            depth_clamp: false,
            stencil_test: false,
            primitive_restart: false,
            cull_mode: CullMode::None,
            front_face: FrontFace::Clockwise,
            samples: 1,
            alpha_to_coverage: false,
            blend: Some(BlendState::alpha()),
        }
    }
}

impl Default for DynamicState {
    fn default() -> Self {
        Self::mesh_shading()
    }
}

// ============================================================================
// Viewport / scissor / clear
// ============================================================================

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport with a [0, 1] depth range
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

// ============================================================================
// CommandList trait
// ============================================================================

/// Command list for recording GPU commands
///
/// Commands are recorded and later submitted through `GraphicsDevice::submit()`.
pub trait CommandList: Send + Sync {
    /// Begin recording (one-time submit)
    fn begin(&mut self) -> Result<()>;

    /// End recording
    fn end(&mut self) -> Result<()>;

    /// Return the list to the initial state; the previous submission must have completed
    fn reset(&mut self) -> Result<()>;

    /// True between `begin()` and `end()`
    fn is_recording(&self) -> bool;

    /// Record image layout transitions
    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier<'_>]) -> Result<()>;

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    fn copy_buffer(&mut self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()>;

    /// Copy tightly packed texels into a texture in `TransferDst` layout
    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, dst: &dyn Texture) -> Result<()>;

    /// Begin dynamic rendering into the given attachments
    ///
    /// # Arguments
    ///
    /// * `color` - Color attachment in `ColorAttachment` layout
    /// * `depth` - Optional depth attachment in `DepthAttachment` layout
    /// * `clear_values` - Color clear first, then depth clear
    fn begin_rendering(
        &mut self,
        color: &dyn Texture,
        depth: Option<&dyn Texture>,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// End the current dynamic rendering scope
    fn end_rendering(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Emit the whole dynamic state block
    fn set_dynamic_state(&mut self, state: &DynamicState) -> Result<()>;

    /// Bind the program's shader stages and its texture descriptor set
    fn bind_shader_program(&mut self, program: &dyn ShaderProgram) -> Result<()>;

    /// Push constants at offset 0, visible to all program stages
    fn push_constants(&mut self, program: &dyn ShaderProgram, data: &[u8]) -> Result<()>;

    /// Dispatch task/mesh work groups
    fn draw_mesh_tasks(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()>;
}

#[cfg(test)]
#[path = "command_list_tests.rs"]
mod tests;
