/// ShaderProgram trait - linked task/mesh/fragment shader objects

use std::sync::Arc;
use crate::graphics_device::Texture;

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Task,
    Mesh,
    Fragment,
}

/// SPIR-V code of one stage
#[derive(Debug, Clone)]
pub struct ShaderStageDesc {
    pub stage: ShaderStage,
    /// SPIR-V bytes (length multiple of 4)
    pub code: Vec<u8>,
    /// Entry point name
    pub entry_point: String,
}

/// Descriptor for creating a shader program
#[derive(Clone)]
pub struct ShaderProgramDesc {
    pub stages: Vec<ShaderStageDesc>,
    /// Push constant block size in bytes, visible to every stage
    pub push_constant_size: u32,
    /// Sampled texture array bound at set 0, binding 0
    pub textures: Vec<Arc<dyn Texture>>,
}

/// Linked shader program
pub trait ShaderProgram: Send + Sync {
    /// Size of the push constant block
    fn push_constant_size(&self) -> u32;

    /// Stages in bind order
    fn stages(&self) -> &[ShaderStage];

    /// Number of textures in the bound array
    fn texture_count(&self) -> u32;
}
