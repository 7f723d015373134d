/// ShaderProgram - linked task/mesh/fragment shader objects with their texture set

use cluster_3d_engine::cluster3d::{Result, Error};
use cluster_3d_engine::cluster3d::render::{
    ShaderProgram as RendererShaderProgram, ShaderProgramDesc, ShaderStage,
    Texture as RendererTexture,
};
use cluster_3d_engine::{engine_debug, engine_err, engine_error};
use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;
use crate::vulkan_texture::Texture;

/// Vulkan shader program
///
/// Holds the linked shader objects, the pipeline layout used for push
/// constants and descriptor binding, and one descriptor set with the whole
/// texture array sampled through a nearest sampler.
pub struct ShaderProgram {
    ctx: Arc<GpuContext>,
    /// Stages handed to vkCmdBindShadersEXT, including the null vertex stage
    pub(crate) bind_stages: Vec<vk::ShaderStageFlags>,
    /// Shader objects matching `bind_stages` (null where unbound)
    pub(crate) bind_shaders: Vec<vk::ShaderEXT>,
    /// Stages in program order
    stages: Vec<ShaderStage>,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    pub(crate) descriptor_set: Option<vk::DescriptorSet>,
    sampler: vk::Sampler,
    push_constant_size: u32,
    /// Stages the push constant range is visible to
    pub(crate) push_stages: vk::ShaderStageFlags,
    /// Keeps the sampled textures alive while the set refers to them
    textures: Vec<Arc<dyn RendererTexture>>,
}

impl ShaderProgram {
    /// Create and link the shader objects of `desc`
    ///
    /// # Errors
    ///
    /// `InvalidResource` when the stage list is not (task?) mesh fragment,
    /// when SPIR-V is not 4-byte aligned, or when an entry point is invalid.
    pub fn new(ctx: Arc<GpuContext>, desc: ShaderProgramDesc) -> Result<Self> {
        let mut stages = desc.stages;
        stages.sort_by_key(|s| stage_order(s.stage));
        let stage_list: Vec<ShaderStage> = stages.iter().map(|s| s.stage).collect();
        let has_task = stage_list.contains(&ShaderStage::Task);
        let valid = matches!(
            stage_list.as_slice(),
            [ShaderStage::Mesh, ShaderStage::Fragment]
                | [ShaderStage::Task, ShaderStage::Mesh, ShaderStage::Fragment]
        );
        if !valid {
            engine_error!("cluster3d::vulkan", "Shader program needs [task] mesh fragment, got {:?}", stage_list);
            return Err(Error::InvalidResource(format!(
                "shader program stages must be [task] mesh fragment, got {:?}", stage_list
            )));
        }
        for stage in &stages {
            if stage.code.is_empty() || stage.code.len() % 4 != 0 {
                engine_error!("cluster3d::vulkan",
                    "{:?} shader code not 4-byte aligned (size: {} bytes)", stage.stage, stage.code.len());
                return Err(Error::InvalidResource(format!(
                    "{:?} SPIR-V size {} is not a non-zero multiple of 4", stage.stage, stage.code.len()
                )));
            }
        }

        let push_stages = stage_list
            .iter()
            .fold(vk::ShaderStageFlags::empty(), |acc, s| acc | shader_stage_to_vk(*s));

        let mut program = Self {
            ctx,
            bind_stages: Vec::new(),
            bind_shaders: Vec::new(),
            stages: stage_list,
            pipeline_layout: vk::PipelineLayout::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set: None,
            sampler: vk::Sampler::null(),
            push_constant_size: desc.push_constant_size,
            push_stages,
            textures: desc.textures,
        };

        // Handles created below are released by Drop if a later step fails
        program.create_texture_set()?;
        program.create_pipeline_layout()?;
        program.create_shaders(&stages, has_task)?;

        engine_debug!("cluster3d::vulkan",
            "Shader program linked: {:?}, {} push constant bytes, {} textures",
            program.stages, program.push_constant_size, program.textures.len());

        Ok(program)
    }

    fn create_texture_set(&mut self) -> Result<()> {
        let device = &self.ctx.device;
        unsafe {
            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::NEAREST)
                .min_filter(vk::Filter::NEAREST)
                .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
                .address_mode_u(vk::SamplerAddressMode::REPEAT)
                .address_mode_v(vk::SamplerAddressMode::REPEAT)
                .address_mode_w(vk::SamplerAddressMode::REPEAT)
                .max_lod(vk::LOD_CLAMP_NONE);
            self.sampler = device.create_sampler(&sampler_info, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create sampler: {:?}", e))?;

            let count = self.textures.len() as u32;
            let bindings = [vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(count)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)];
            let layout_info = if count > 0 {
                vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings)
            } else {
                vk::DescriptorSetLayoutCreateInfo::default()
            };
            self.set_layout = device.create_descriptor_set_layout(&layout_info, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

            if count == 0 {
                return Ok(());
            }

            let pool_sizes = [vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: count,
            }];
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .pool_sizes(&pool_sizes)
                .max_sets(1);
            self.descriptor_pool = device.create_descriptor_pool(&pool_info, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create descriptor pool: {:?}", e))?;

            let set_layouts = [self.set_layout];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.descriptor_pool)
                .set_layouts(&set_layouts);
            let sets = device.allocate_descriptor_sets(&alloc_info)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to allocate descriptor set: {:?}", e))?;
            let set = sets.first().copied().ok_or_else(|| {
                engine_err!("cluster3d::vulkan", "Descriptor set allocation returned no set")
            })?;

            let image_infos: Vec<vk::DescriptorImageInfo> = self.textures
                .iter()
                .map(|texture| {
                    // Downcast to Vulkan type
                    let vk_texture = texture.as_ref() as *const dyn RendererTexture as *const Texture;
                    vk::DescriptorImageInfo::default()
                        .sampler(self.sampler)
                        .image_view((*vk_texture).view)
                        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                })
                .collect();
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos);
            device.update_descriptor_sets(&[write], &[]);

            self.descriptor_set = Some(set);
            Ok(())
        }
    }

    fn create_pipeline_layout(&mut self) -> Result<()> {
        let set_layouts = [self.set_layout];
        let ranges = [vk::PushConstantRange::default()
            .stage_flags(self.push_stages)
            .offset(0)
            .size(self.push_constant_size)];
        let mut layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        if self.push_constant_size > 0 {
            layout_info = layout_info.push_constant_ranges(&ranges);
        }

        self.pipeline_layout = unsafe {
            self.ctx.device.create_pipeline_layout(&layout_info, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create pipeline layout: {:?}", e))?
        };
        Ok(())
    }

    fn create_shaders(
        &mut self,
        stages: &[cluster_3d_engine::cluster3d::render::ShaderStageDesc],
        has_task: bool,
    ) -> Result<()> {
        let entry_points = stages
            .iter()
            .map(|s| {
                CString::new(s.entry_point.as_str()).map_err(|_| {
                    Error::InvalidResource(format!("entry point {:?} contains a NUL byte", s.entry_point))
                })
            })
            .collect::<Result<Vec<CString>>>()?;

        let set_layouts = [self.set_layout];
        let ranges = [vk::PushConstantRange::default()
            .stage_flags(self.push_stages)
            .offset(0)
            .size(self.push_constant_size)];
        let range_slice: &[vk::PushConstantRange] = if self.push_constant_size > 0 { &ranges } else { &[] };

        let create_infos: Vec<vk::ShaderCreateInfoEXT> = stages
            .iter()
            .zip(&entry_points)
            .map(|(stage, name)| {
                let mut flags = vk::ShaderCreateFlagsEXT::LINK_STAGE;
                if stage.stage == ShaderStage::Mesh && !has_task {
                    flags |= vk::ShaderCreateFlagsEXT::NO_TASK_SHADER;
                }
                vk::ShaderCreateInfoEXT::default()
                    .flags(flags)
                    .stage(shader_stage_to_vk(stage.stage))
                    .next_stage(next_stage(stage.stage))
                    .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                    .code(&stage.code)
                    .name(name.as_c_str())
                    .set_layouts(&set_layouts)
                    .push_constant_ranges(range_slice)
            })
            .collect();

        let shaders = unsafe {
            self.ctx.shader_object.create_shaders(&create_infos, None)
                .map_err(|e| engine_err!("cluster3d::vulkan", "Failed to create shader objects: {:?}", e))?
        };

        // Every graphics stage enabled on the device must be bound, unused ones to null
        let shader_for = |wanted: ShaderStage| {
            self.stages
                .iter()
                .position(|s| *s == wanted)
                .and_then(|i| shaders.get(i).copied())
                .unwrap_or(vk::ShaderEXT::null())
        };
        self.bind_stages = vec![
            vk::ShaderStageFlags::VERTEX,
            vk::ShaderStageFlags::TASK_EXT,
            vk::ShaderStageFlags::MESH_EXT,
            vk::ShaderStageFlags::FRAGMENT,
        ];
        self.bind_shaders = vec![
            vk::ShaderEXT::null(),
            shader_for(ShaderStage::Task),
            shader_for(ShaderStage::Mesh),
            shader_for(ShaderStage::Fragment),
        ];
        Ok(())
    }
}

fn stage_order(stage: ShaderStage) -> u8 {
    match stage {
        ShaderStage::Task => 0,
        ShaderStage::Mesh => 1,
        ShaderStage::Fragment => 2,
    }
}

fn next_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Task => vk::ShaderStageFlags::MESH_EXT,
        ShaderStage::Mesh => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Fragment => vk::ShaderStageFlags::empty(),
    }
}

impl RendererShaderProgram for ShaderProgram {
    fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    fn texture_count(&self) -> u32 {
        self.textures.len() as u32
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        let device = &self.ctx.device;
        unsafe {
            for &shader in &self.bind_shaders {
                if shader != vk::ShaderEXT::null() {
                    self.ctx.shader_object.destroy_shader(shader, None);
                }
            }
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            // Frees the descriptor set with it
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_descriptor_set_layout(self.set_layout, None);
            device.destroy_sampler(self.sampler, None);
        }
    }
}
