//! Unit tests for Vulkan format conversion functions
//!
//! Tests pure conversion functions without requiring GPU.
//! Validates correct mapping between engine types and Vulkan types.

use cluster_3d_engine::cluster3d::render::{
    TextureFormat, TextureUsage, BufferUsage, MemoryResidency, ImageLayout, PipelineStages,
    AccessFlags, ImageBarrier, CompareOp, CullMode, ShaderStage, BlendState,
};
use ash::vk;
use gpu_allocator::MemoryLocation;
use super::*;

// ============================================================================
// TEXTURE FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_texture_format_round_trips_through_vk() {
    let formats = [
        TextureFormat::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM,
        TextureFormat::D16_UNORM,
        TextureFormat::D32_FLOAT,
        TextureFormat::D24_UNORM_S8_UINT,
        TextureFormat::D32_FLOAT_S8_UINT,
    ];
    for format in formats {
        assert_eq!(vk_format_to_texture_format(texture_format_to_vk(format)), Some(format));
    }
}

#[test]
fn test_depth_format_names() {
    assert_eq!(texture_format_to_vk(TextureFormat::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(texture_format_to_vk(TextureFormat::D32_FLOAT_S8_UINT), vk::Format::D32_SFLOAT_S8_UINT);
}

#[test]
fn test_unknown_vk_format_has_no_engine_format() {
    assert_eq!(vk_format_to_texture_format(vk::Format::R16G16B16A16_SFLOAT), None);
}

#[test]
fn test_view_aspect() {
    assert_eq!(view_aspect(TextureFormat::R8G8B8A8_SRGB), vk::ImageAspectFlags::COLOR);
    assert_eq!(view_aspect(TextureFormat::D24_UNORM_S8_UINT), vk::ImageAspectFlags::DEPTH);
}

#[test]
fn test_barrier_aspect_includes_stencil() {
    assert_eq!(barrier_aspect(TextureFormat::D32_FLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        barrier_aspect(TextureFormat::D32_FLOAT_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

// ============================================================================
// USAGE CONVERSION TESTS
// ============================================================================

#[test]
fn test_shader_visible_buffers_are_storage_and_transfer_dst() {
    for usage in [BufferUsage::Geometry, BufferUsage::Material, BufferUsage::Light] {
        let flags = buffer_usage_to_vk(usage, true);
        assert!(flags.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
        assert!(flags.contains(vk::BufferUsageFlags::TRANSFER_DST));
        assert!(flags.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
    }
}

#[test]
fn test_staging_buffer_is_transfer_source_only() {
    let flags = buffer_usage_to_vk(BufferUsage::Staging, false);
    assert_eq!(flags, vk::BufferUsageFlags::TRANSFER_SRC);
}

#[test]
fn test_device_address_flag_is_opt_in() {
    let flags = buffer_usage_to_vk(BufferUsage::Geometry, false);
    assert!(!flags.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
}

#[test]
fn test_residency_to_memory_location() {
    assert_eq!(residency_to_location(MemoryResidency::GpuOnly), MemoryLocation::GpuOnly);
    assert_eq!(residency_to_location(MemoryResidency::CpuToGpu), MemoryLocation::CpuToGpu);
    assert_eq!(residency_to_location(MemoryResidency::GpuToCpu), MemoryLocation::GpuToCpu);
}

#[test]
fn test_texture_usage_flags() {
    assert!(texture_usage_to_vk(TextureUsage::Sampled).contains(vk::ImageUsageFlags::SAMPLED));
    assert_eq!(
        texture_usage_to_vk(TextureUsage::DepthAttachment),
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
    );
}

// ============================================================================
// SYNCHRONIZATION CONVERSION TESTS
// ============================================================================

#[test]
fn test_layouts() {
    assert_eq!(image_layout_to_vk(ImageLayout::Undefined), vk::ImageLayout::UNDEFINED);
    assert_eq!(image_layout_to_vk(ImageLayout::DepthAttachment), vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL);
    assert_eq!(image_layout_to_vk(ImageLayout::PresentSrc), vk::ImageLayout::PRESENT_SRC_KHR);
}

#[test]
fn test_empty_masks_map_to_none() {
    assert_eq!(pipeline_stages_to_vk(PipelineStages::empty()), vk::PipelineStageFlags2::NONE);
    assert_eq!(access_flags_to_vk(AccessFlags::empty()), vk::AccessFlags2::NONE);
}

#[test]
fn test_depth_barrier_masks() {
    struct DepthOnly;
    impl cluster_3d_engine::cluster3d::render::Texture for DepthOnly {
        fn info(&self) -> &cluster_3d_engine::cluster3d::render::TextureInfo {
            unreachable!()
        }
    }
    let texture = DepthOnly;
    let barrier = ImageBarrier::depth_attachment(&texture);

    assert_eq!(
        pipeline_stages_to_vk(barrier.dst_stages),
        vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
    );
    assert_eq!(
        access_flags_to_vk(barrier.dst_access),
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
    );
    assert_eq!(pipeline_stages_to_vk(barrier.src_stages), vk::PipelineStageFlags2::TOP_OF_PIPE);
}

#[test]
fn test_mesh_stages() {
    assert_eq!(
        pipeline_stages_to_vk(PipelineStages::TASK_SHADER | PipelineStages::MESH_SHADER),
        vk::PipelineStageFlags2::TASK_SHADER_EXT | vk::PipelineStageFlags2::MESH_SHADER_EXT
    );
}

// ============================================================================
// DYNAMIC STATE CONVERSION TESTS
// ============================================================================

#[test]
fn test_compare_and_cull() {
    assert_eq!(compare_op_to_vk(CompareOp::LessOrEqual), vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(cull_mode_to_vk(CullMode::None), vk::CullModeFlags::NONE);
}

#[test]
fn test_alpha_blend_factors() {
    let blend = BlendState::alpha();
    assert_eq!(blend_factor_to_vk(blend.src_color), vk::BlendFactor::SRC_ALPHA);
    assert_eq!(blend_factor_to_vk(blend.dst_color), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_op_to_vk(blend.color_op), vk::BlendOp::ADD);
}

#[test]
fn test_sample_counts() {
    assert_eq!(sample_count_to_vk(1), Some(vk::SampleCountFlags::TYPE_1));
    assert_eq!(sample_count_to_vk(3), None);
}

#[test]
fn test_shader_stages() {
    assert_eq!(shader_stage_to_vk(ShaderStage::Task), vk::ShaderStageFlags::TASK_EXT);
    assert_eq!(shader_stage_to_vk(ShaderStage::Mesh), vk::ShaderStageFlags::MESH_EXT);
    assert_eq!(shader_stage_to_vk(ShaderStage::Fragment), vk::ShaderStageFlags::FRAGMENT);
}
