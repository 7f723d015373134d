/// CommandList - Vulkan implementation of the engine CommandList trait
///
/// Records synchronization2 barriers, dynamic rendering scopes, the full
/// shader-object dynamic state block and mesh task dispatches.

use cluster_3d_engine::cluster3d::{Result, Error};
use cluster_3d_engine::cluster3d::render::{
    CommandList as RendererCommandList,
    Buffer as RendererBuffer,
    Texture as RendererTexture,
    ShaderProgram as RendererShaderProgram,
    ImageBarrier, DynamicState, Viewport, Rect2D, ClearValue,
};
use cluster_3d_engine::{engine_error, engine_err, engine_bail};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    image_layout_to_vk, pipeline_stages_to_vk, access_flags_to_vk, barrier_aspect,
    compare_op_to_vk, cull_mode_to_vk, front_face_to_vk, blend_factor_to_vk, blend_op_to_vk,
    sample_count_to_vk,
};
use crate::vulkan_shader_program::ShaderProgram;
use crate::vulkan_texture::Texture;

/// Vulkan command list implementation
///
/// One primary command buffer allocated from its own pool, so `reset()`
/// can recycle the whole pool.
pub struct CommandList {
    /// Shared GPU context
    ctx: Arc<GpuContext>,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a dynamic rendering scope
    in_rendering: bool,
}

/// Downcast an engine command list to the Vulkan type
pub(crate) fn vk_command_list(cmd: &dyn RendererCommandList) -> &CommandList {
    unsafe { &*(cmd as *const dyn RendererCommandList as *const CommandList) }
}

fn vk_buffer(buffer: &dyn RendererBuffer) -> &Buffer {
    unsafe { &*(buffer as *const dyn RendererBuffer as *const Buffer) }
}

fn vk_texture(texture: &dyn RendererTexture) -> &Texture {
    unsafe { &*(texture as *const dyn RendererTexture as *const Texture) }
}

fn vk_program(program: &dyn RendererShaderProgram) -> &ShaderProgram {
    unsafe { &*(program as *const dyn RendererShaderProgram as *const ShaderProgram) }
}

impl CommandList {
    /// Create a new command list
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context (device and graphics queue family)
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            // Create command pool
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| {
                    engine_error!("cluster3d::vulkan", "Failed to create command pool: {:?}", e);
                    Error::BackendError(format!("Failed to create command pool: {:?}", e))
                })?;

            // Allocate command buffer
            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) if !buffers.is_empty() => buffers[0],
                result => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_error!("cluster3d::vulkan", "Failed to allocate command buffer: {:?}", result.err());
                    return Err(Error::BackendError("Failed to allocate command buffer".to_string()));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                is_recording: false,
                in_rendering: false,
            })
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn ensure_recording(&self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        Ok(())
    }

    fn ensure_outside_rendering(&self, what: &str) -> Result<()> {
        self.ensure_recording()?;
        if self.in_rendering {
            engine_bail!("cluster3d::vulkan", "{} is not allowed inside a rendering scope", what);
        }
        Ok(())
    }
}

impl RendererCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.is_recording = true;
        self.in_rendering = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;

        if self.in_rendering {
            return Err(Error::BackendError("Rendering not ended before ending command list".to_string()));
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to reset command pool: {:?}", e))?;
        }
        self.is_recording = false;
        self.in_rendering = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording
    }

    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier<'_>]) -> Result<()> {
        self.ensure_outside_rendering("pipeline_barrier")?;

        let image_barriers: Vec<vk::ImageMemoryBarrier2> = barriers
            .iter()
            .map(|barrier| {
                let texture = vk_texture(barrier.texture);
                vk::ImageMemoryBarrier2::default()
                    .src_stage_mask(pipeline_stages_to_vk(barrier.src_stages))
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_stage_mask(pipeline_stages_to_vk(barrier.dst_stages))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
                    .old_layout(image_layout_to_vk(barrier.old_layout))
                    .new_layout(image_layout_to_vk(barrier.new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(texture.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: barrier_aspect(texture.info.format),
                        base_mip_level: 0,
                        level_count: vk::REMAINING_MIP_LEVELS,
                        base_array_layer: 0,
                        layer_count: vk::REMAINING_ARRAY_LAYERS,
                    })
            })
            .collect();

        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&image_barriers);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier2(self.command_buffer, &dependency_info);
        }
        Ok(())
    }

    fn copy_buffer(&mut self, src: &dyn RendererBuffer, dst: &dyn RendererBuffer, size: u64) -> Result<()> {
        self.ensure_outside_rendering("copy_buffer")?;
        if size == 0 || size > src.size() || size > dst.size() {
            return Err(Error::InvalidResource(format!(
                "copy of {} bytes between buffers of {} and {} bytes", size, src.size(), dst.size()
            )));
        }

        let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
        unsafe {
            self.ctx.device.cmd_copy_buffer(
                self.command_buffer,
                vk_buffer(src).buffer,
                vk_buffer(dst).buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn RendererBuffer, dst: &dyn RendererTexture) -> Result<()> {
        self.ensure_outside_rendering("copy_buffer_to_texture")?;
        let info = dst.info();
        if src.size() < info.byte_size() {
            return Err(Error::InvalidResource(format!(
                "texture {}x{} needs {} bytes, buffer holds {}", info.width, info.height, info.byte_size(), src.size()
            )));
        }

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: crate::vulkan_format::view_aspect(info.format),
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D { width: info.width, height: info.height, depth: 1 });

        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                vk_buffer(src).buffer,
                vk_texture(dst).image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn begin_rendering(
        &mut self,
        color: &dyn RendererTexture,
        depth: Option<&dyn RendererTexture>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.ensure_outside_rendering("begin_rendering")?;

        let color_clear = clear_values.iter().find_map(|cv| match cv {
            ClearValue::Color(rgba) => Some(*rgba),
            _ => None,
        });
        let depth_clear = clear_values.iter().find_map(|cv| match cv {
            ClearValue::DepthStencil { depth, stencil } => Some((*depth, *stencil)),
            _ => None,
        });

        let mut color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(vk_texture(color).view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .resolve_mode(vk::ResolveModeFlags::NONE)
            .store_op(vk::AttachmentStoreOp::STORE);
        color_attachment = match color_clear {
            Some(rgba) => color_attachment
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .clear_value(vk::ClearValue { color: vk::ClearColorValue { float32: rgba } }),
            None => color_attachment.load_op(vk::AttachmentLoadOp::LOAD),
        };
        let color_attachments = [color_attachment];

        let depth_attachment = depth.map(|texture| {
            let attachment = vk::RenderingAttachmentInfo::default()
                .image_view(vk_texture(texture).view)
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .resolve_mode(vk::ResolveModeFlags::NONE)
                .store_op(vk::AttachmentStoreOp::DONT_CARE);
            match depth_clear {
                Some((depth, stencil)) => attachment
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .clear_value(vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                    }),
                None => attachment.load_op(vk::AttachmentLoadOp::LOAD),
            }
        });

        let info = color.info();
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: info.width, height: info.height },
            })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        unsafe {
            self.ctx.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }
        self.in_rendering = true;
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_rendering {
            return Err(Error::BackendError("Not inside a rendering scope".to_string()));
        }

        unsafe {
            self.ctx.device.cmd_end_rendering(self.command_buffer);
        }
        self.in_rendering = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording()?;

        let vk_viewport = vk::Viewport::default()
            .x(viewport.x)
            .y(viewport.y)
            .width(viewport.width)
            .height(viewport.height)
            .min_depth(viewport.min_depth)
            .max_depth(viewport.max_depth);

        // Shader objects require the with-count variants
        unsafe {
            self.ctx.device.cmd_set_viewport_with_count(self.command_buffer, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording()?;

        let vk_scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x: scissor.x, y: scissor.y })
            .extent(vk::Extent2D { width: scissor.width, height: scissor.height });

        unsafe {
            self.ctx.device.cmd_set_scissor_with_count(self.command_buffer, &[vk_scissor]);
        }
        Ok(())
    }

    fn set_dynamic_state(&mut self, state: &DynamicState) -> Result<()> {
        self.ensure_recording()?;

        let samples = sample_count_to_vk(state.samples).ok_or_else(|| {
            Error::InvalidResource(format!("unsupported sample count {}", state.samples))
        })?;
        let device = &self.ctx.device;
        let ext = &self.ctx.shader_object;
        let cb = self.command_buffer;

        unsafe {
            device.cmd_set_rasterizer_discard_enable(cb, state.rasterizer_discard);
            device.cmd_set_depth_test_enable(cb, state.depth_test);
            device.cmd_set_depth_write_enable(cb, state.depth_write);
            device.cmd_set_depth_compare_op(cb, compare_op_to_vk(state.depth_compare));
            device.cmd_set_depth_bounds_test_enable(cb, false);
            device.cmd_set_depth_bias_enable(cb, state.depth_bias);
            device.cmd_set_stencil_test_enable(cb, state.stencil_test);
            device.cmd_set_primitive_restart_enable(cb, state.primitive_restart);
            device.cmd_set_primitive_topology(cb, vk::PrimitiveTopology::TRIANGLE_LIST);
            device.cmd_set_cull_mode(cb, cull_mode_to_vk(state.cull_mode));
            device.cmd_set_front_face(cb, front_face_to_vk(state.front_face));

            ext.cmd_set_depth_clamp_enable(cb, state.depth_clamp);
            ext.cmd_set_polygon_mode(cb, vk::PolygonMode::FILL);
            ext.cmd_set_rasterization_samples(cb, samples);
            ext.cmd_set_sample_mask(cb, samples, &[u32::MAX]);
            ext.cmd_set_alpha_to_coverage_enable(cb, state.alpha_to_coverage);

            let blend_enable = if state.blend.is_some() { vk::TRUE } else { vk::FALSE };
            ext.cmd_set_color_blend_enable(cb, 0, &[blend_enable]);
            if let Some(blend) = state.blend {
                let equation = vk::ColorBlendEquationEXT::default()
                    .src_color_blend_factor(blend_factor_to_vk(blend.src_color))
                    .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color))
                    .color_blend_op(blend_op_to_vk(blend.color_op))
                    .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha))
                    .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha))
                    .alpha_blend_op(blend_op_to_vk(blend.alpha_op));
                ext.cmd_set_color_blend_equation(cb, 0, &[equation]);
            }
            ext.cmd_set_color_write_mask(cb, 0, &[vk::ColorComponentFlags::RGBA]);
        }
        Ok(())
    }

    fn bind_shader_program(&mut self, program: &dyn RendererShaderProgram) -> Result<()> {
        self.ensure_recording()?;
        let program = vk_program(program);

        unsafe {
            self.ctx.shader_object.cmd_bind_shaders(
                self.command_buffer,
                &program.bind_stages,
                &program.bind_shaders,
            );
            if let Some(set) = program.descriptor_set {
                self.ctx.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    program.pipeline_layout,
                    0, // first_set
                    &[set],
                    &[], // dynamic_offsets
                );
            }
        }
        Ok(())
    }

    fn push_constants(&mut self, program: &dyn RendererShaderProgram, data: &[u8]) -> Result<()> {
        self.ensure_recording()?;
        if data.len() as u32 > program.push_constant_size() || data.len() % 4 != 0 {
            engine_bail!("cluster3d::vulkan",
                "push constants of {} bytes do not fit the {}-byte block", data.len(), program.push_constant_size());
        }
        let program = vk_program(program);

        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                program.pipeline_layout,
                program.push_stages,
                0,
                data,
            );
        }
        Ok(())
    }

    fn draw_mesh_tasks(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_rendering {
            return Err(Error::BackendError("Not inside a rendering scope".to_string()));
        }

        unsafe {
            self.ctx.mesh_shader.cmd_draw_mesh_tasks(
                self.command_buffer,
                group_count_x,
                group_count_y,
                group_count_z,
            );
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Command buffer is freed with its pool
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
