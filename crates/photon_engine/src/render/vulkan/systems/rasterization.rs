//! Rasterization render system
//!
//! Forward pass over the scene geometry into this frame slot's color+depth
//! targets, sampling the shadow map recorded earlier in the same command
//! buffer.

use ash::vk;

use crate::config::RendererConfig;
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::pipeline::{Pipeline, PipelineDesc};
use crate::render::vulkan::render_stage::{RenderStage, RenderStageDesc};
use crate::render::vulkan::resources::Resources;
use crate::render::vulkan::scene::{FramePushConstants, ShaderSet};
use crate::render::vulkan::systems::{cmd_bind_groups, cmd_set_dynamic_state, geometry_vertex_layout};

/// Rasterization pass: color + depth attachments per frame slot
pub struct RasterizationSystem {
    stage: RenderStage,
    pipeline: Pipeline,
    clear_color: [f32; 4],
}

impl RasterizationSystem {
    /// Build the color+depth render stage and its pipeline
    pub fn new(
        context: &VulkanContext,
        resources: &Resources,
        shaders: &ShaderSet,
        config: &RendererConfig,
    ) -> VulkanResult<Self> {
        let color = resources.raster_color();
        let depth = resources.raster_depth();

        let attachments = vec![
            vk::AttachmentDescription::builder()
                .format(color.format())
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .build(),
            vk::AttachmentDescription::builder()
                .format(depth.format())
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        ];

        let framebuffer_views = (0..context.frames_in_flight())
            .map(|frame| vec![color.layer_view(frame), depth.layer_view(frame)])
            .collect();

        let stage = RenderStage::new(
            context.raw_device(),
            &RenderStageDesc {
                attachments,
                color_refs: vec![vk::AttachmentReference {
                    attachment: 0,
                    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                }],
                depth_ref: Some(vk::AttachmentReference {
                    attachment: 1,
                    layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                }),
                framebuffer_views,
                extent: color.extent(),
            },
        )?;

        let (vertex_bindings, vertex_attributes) = geometry_vertex_layout();
        let pipeline = Pipeline::new_graphics(
            context.raw_device(),
            resources.empty_set_layout(),
            context.max_bound_descriptor_sets(),
            &PipelineDesc {
                vertex_spirv: &shaders.rasterization_vertex,
                fragment_spirv: &shaders.rasterization_fragment,
                vertex_bindings,
                vertex_attributes,
                set_layouts: vec![
                    (resources.uniform_group().set_index(), resources.uniform_group().layout()),
                    (resources.scene_group().set_index(), resources.scene_group().layout()),
                    (resources.pass_input_group().set_index(), resources.pass_input_group().layout()),
                ],
                push_constant_ranges: vec![FramePushConstants::range()],
                color_attachment_count: 1,
                depth_attachment: true,
                render_pass: stage.render_pass(),
            },
        )?;

        Ok(Self {
            stage,
            pipeline,
            clear_color: config.clear_color,
        })
    }

    /// Record the rasterization pass into this frame's framebuffer
    pub fn record(
        &self,
        context: &VulkanContext,
        command_buffer: vk::CommandBuffer,
        resources: &Resources,
        _image_index: usize,
        frame_index: usize,
        push: &FramePushConstants,
    ) {
        let device = &context.device().device;

        cmd_set_dynamic_state(device, command_buffer, self.stage.extent());

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: self.clear_color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.stage.render_pass())
            .framebuffer(self.stage.framebuffer(frame_index))
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
            &[
                resources.uniform_group(),
                resources.scene_group(),
                resources.pass_input_group(),
            ],
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
        }

        if let Some(vertex_buffers) = resources.vertex_buffers() {
            let vertex_count = resources.vertex_count() as u32;
            if vertex_count > 0 {
                unsafe {
                    device.cmd_bind_vertex_buffers(command_buffer, 0, &vertex_buffers, &[0, 0, 0]);
                    device.cmd_draw(command_buffer, vertex_count, 1, 0, 0);
                }
            }
        }

        unsafe {
            device.cmd_end_render_pass(command_buffer);
        }
    }
}
