//! Output render system
//!
//! The unconditional composite pass: draws a full-screen quad into the
//! acquired swapchain image, blending whichever offscreen results are
//! currently valid, then hands the open render pass to the developer
//! console for its overlay.

use ash::vk;

use crate::config::RendererConfig;
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::pipeline::{Pipeline, PipelineDesc};
use crate::render::vulkan::render_stage::{RenderStage, RenderStageDesc};
use crate::render::vulkan::resources::Resources;
use crate::render::vulkan::scene::{FramePushConstants, ShaderSet};
use crate::render::vulkan::systems::{cmd_bind_groups, cmd_set_dynamic_state, quad_vertex_layout, QuadGeometry};
use crate::render::ConsoleOverlay;

/// Output composite pass targeting the swapchain images
pub struct OutputSystem {
    stage: RenderStage,
    pipeline: Pipeline,
    quad: QuadGeometry,
    clear_color: [f32; 4],
}

impl OutputSystem {
    /// Build the swapchain render stage, pipeline, and quad geometry
    pub fn new(
        context: &VulkanContext,
        resources: &Resources,
        shaders: &ShaderSet,
        config: &RendererConfig,
    ) -> VulkanResult<Self> {
        let swapchain = context.swapchain();

        let attachments = vec![vk::AttachmentDescription::builder()
            .format(swapchain.format().format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build()];

        let stage = RenderStage::new(
            context.raw_device(),
            &RenderStageDesc {
                attachments,
                color_refs: vec![vk::AttachmentReference {
                    attachment: 0,
                    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                }],
                depth_ref: None,
                framebuffer_views: Self::swapchain_views(context),
                extent: swapchain.extent(),
            },
        )?;

        let (vertex_bindings, vertex_attributes) = quad_vertex_layout();
        let pipeline = Pipeline::new_graphics(
            context.raw_device(),
            resources.empty_set_layout(),
            context.max_bound_descriptor_sets(),
            &PipelineDesc {
                vertex_spirv: &shaders.output_vertex,
                fragment_spirv: &shaders.output_fragment,
                vertex_bindings,
                vertex_attributes,
                set_layouts: vec![
                    (resources.uniform_group().set_index(), resources.uniform_group().layout()),
                    (resources.pass_input_group().set_index(), resources.pass_input_group().layout()),
                ],
                push_constant_ranges: vec![FramePushConstants::range()],
                color_attachment_count: 1,
                depth_attachment: false,
                render_pass: stage.render_pass(),
            },
        )?;

        let quad = QuadGeometry::new(context, resources)?;

        Ok(Self {
            stage,
            pipeline,
            quad,
            clear_color: config.clear_color,
        })
    }

    fn swapchain_views(context: &VulkanContext) -> Vec<Vec<vk::ImageView>> {
        context
            .swapchain()
            .image_views()
            .iter()
            .map(|&view| vec![view])
            .collect()
    }

    /// Rebuild the framebuffers after swapchain recreation
    pub fn recreate_framebuffers(&mut self, context: &VulkanContext) -> VulkanResult<()> {
        self.stage
            .recreate_framebuffers(&Self::swapchain_views(context), context.swapchain().extent())
    }

    /// Record the composite pass into the acquired swapchain image, then
    /// the console overlay inside the same render-pass scope
    pub fn record(
        &self,
        context: &VulkanContext,
        command_buffer: vk::CommandBuffer,
        resources: &Resources,
        image_index: usize,
        frame_index: usize,
        push: &FramePushConstants,
        console: &mut dyn ConsoleOverlay,
    ) {
        let device = &context.device().device;

        cmd_set_dynamic_state(device, command_buffer, self.stage.extent());

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: self.clear_color },
        }];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.stage.render_pass())
            .framebuffer(self.stage.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.stage.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(command_buffer, self.pipeline.bind_point(), self.pipeline.handle());
        }

        cmd_bind_groups(
            device,
            command_buffer,
            &self.pipeline,
            &[resources.uniform_group(), resources.pass_input_group()],
            frame_index,
        );

        unsafe {
            device.cmd_push_constants(
                command_buffer,
                self.pipeline.layout(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(push),
            );

            device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.quad.vertex_buffer()], &[0]);
            device.cmd_bind_index_buffer(command_buffer, self.quad.index_buffer(), 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(command_buffer, self.quad.index_count(), 1, 0, 0, 0);
        }

        console.record(command_buffer, image_index, frame_index);

        unsafe {
            device.cmd_end_render_pass(command_buffer);
        }
    }
}
