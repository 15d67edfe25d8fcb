//! Pipeline management
//!
//! A pipeline is bound to exactly one render stage and owns its shader
//! stages and layout. The pipeline layout always carries the full
//! descriptor-set-layout array up to the device's max bound sets, with
//! unused slots filled by the shared empty layout, so every render system
//! can bind its groups at their fixed set indices.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::vulkan::shader::ShaderModule;

/// Creation parameters for a graphics [`Pipeline`]
pub struct PipelineDesc<'a> {
    /// Vertex stage SPIR-V
    pub vertex_spirv: &'a [u8],
    /// Fragment stage SPIR-V
    pub fragment_spirv: &'a [u8],
    /// Vertex buffer binding descriptions
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attribute descriptions
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Descriptor set layouts at their fixed set indices
    pub set_layouts: Vec<(u32, vk::DescriptorSetLayout)>,
    /// Push constant ranges merged into the layout
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    /// Number of color attachments in the target render stage
    pub color_attachment_count: usize,
    /// Whether the target render stage has a depth attachment
    pub depth_attachment: bool,
    /// The render pass this pipeline executes in
    pub render_pass: vk::RenderPass,
}

/// Creation parameters for a compute [`Pipeline`]
pub struct ComputePipelineDesc<'a> {
    /// Compute stage SPIR-V
    pub compute_spirv: &'a [u8],
    /// Descriptor set layouts at their fixed set indices
    pub set_layouts: Vec<(u32, vk::DescriptorSetLayout)>,
    /// Push constant ranges merged into the layout
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

/// Compiled pipeline with its layout
pub struct Pipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    /// Create a graphics pipeline with the engine's fixed rasterization
    /// state: back-face culling, counter-clockwise front face, fill mode, no
    /// depth clamp, alpha blending per color attachment, depth test+write
    /// with `LESS`, and dynamic viewport/scissor/line-width.
    pub fn new_graphics(
        device: Device,
        empty_layout: vk::DescriptorSetLayout,
        max_bound_sets: u32,
        desc: &PipelineDesc<'_>,
    ) -> VulkanResult<Self> {
        let vertex_shader = ShaderModule::from_spirv(device.clone(), desc.vertex_spirv)?;
        let fragment_shader = ShaderModule::from_spirv(device.clone(), desc.fragment_spirv)?;

        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&desc.vertex_bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only the counts are baked in
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_attachment)
            .depth_write_enable(desc.depth_attachment)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();
        let blend_attachments = vec![blend_attachment; desc.color_attachment_count];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::LINE_WIDTH,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let layout = Self::create_layout(
            &device,
            empty_layout,
            max_bound_sets,
            &desc.set_layouts,
            &desc.push_constant_ranges,
        )?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(desc.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            device,
            pipeline,
            layout,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        })
    }

    /// Create a compute pipeline from a single compute stage
    pub fn new_compute(
        device: Device,
        empty_layout: vk::DescriptorSetLayout,
        max_bound_sets: u32,
        desc: &ComputePipelineDesc<'_>,
    ) -> VulkanResult<Self> {
        let compute_shader = ShaderModule::from_spirv(device.clone(), desc.compute_spirv)?;

        let layout = Self::create_layout(
            &device,
            empty_layout,
            max_bound_sets,
            &desc.set_layouts,
            &desc.push_constant_ranges,
        )?;

        let pipeline_info = vk::ComputePipelineCreateInfo::builder()
            .stage(compute_shader.stage_info(vk::ShaderStageFlags::COMPUTE))
            .layout(layout);

        let pipelines = unsafe {
            device.create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            device,
            pipeline,
            layout,
            bind_point: vk::PipelineBindPoint::COMPUTE,
        })
    }

    fn create_layout(
        device: &Device,
        empty_layout: vk::DescriptorSetLayout,
        max_bound_sets: u32,
        set_layouts: &[(u32, vk::DescriptorSetLayout)],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout> {
        let layouts = assemble_set_layouts(empty_layout, max_bound_sets, set_layouts);

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&layouts)
            .push_constant_ranges(push_constant_ranges);

        unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Get the pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Get the bind point (graphics or compute)
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Fill the full set-layout array, placing each used layout at its fixed
/// index and the empty layout everywhere else
fn assemble_set_layouts(
    empty_layout: vk::DescriptorSetLayout,
    max_bound_sets: u32,
    set_layouts: &[(u32, vk::DescriptorSetLayout)],
) -> Vec<vk::DescriptorSetLayout> {
    let mut layouts = vec![empty_layout; max_bound_sets as usize];
    for &(index, layout) in set_layouts {
        layouts[index as usize] = layout;
    }
    layouts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn unused_slots_are_filled_with_the_empty_layout() {
        let empty = vk::DescriptorSetLayout::from_raw(1);
        let used = vk::DescriptorSetLayout::from_raw(2);

        let layouts = assemble_set_layouts(empty, 4, &[(2, used)]);
        assert_eq!(layouts.len(), 4);
        assert_eq!(layouts[0], empty);
        assert_eq!(layouts[1], empty);
        assert_eq!(layouts[2], used);
        assert_eq!(layouts[3], empty);
    }

    #[test]
    fn set_indices_are_honored_out_of_order() {
        let empty = vk::DescriptorSetLayout::from_raw(1);
        let a = vk::DescriptorSetLayout::from_raw(10);
        let b = vk::DescriptorSetLayout::from_raw(11);

        let layouts = assemble_set_layouts(empty, 3, &[(2, b), (0, a)]);
        assert_eq!(layouts, vec![a, empty, b]);
    }
}
