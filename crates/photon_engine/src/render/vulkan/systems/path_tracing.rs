//! Path-tracing render system
//!
//! Full-screen pass whose fragment shader walks the BVH in the scene buffer
//! and writes a new accumulation sample and random state into this frame
//! slot's layers, reading the history of every slot through the combined
//! array views. The image accesses are wrapped in explicit layout
//! transitions: shader-read-only for sampling outside the pass, general
//! while the pass both reads history and writes new layers.

use ash::vk;

use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::pipeline::{Pipeline, PipelineDesc};
use crate::render::vulkan::render_stage::{RenderStage, RenderStageDesc};
use crate::render::vulkan::resources::Resources;
use crate::render::vulkan::scene::{FramePushConstants, ShaderSet};
use crate::render::vulkan::sync::cmd_transition_image_layout;
use crate::render::vulkan::systems::{cmd_bind_groups, cmd_set_dynamic_state, quad_vertex_layout, QuadGeometry};

/// Path-tracing pass: accumulate + random color attachments per frame slot
pub struct PathTracingSystem {
    stage: RenderStage,
    pipeline: Pipeline,
    quad: QuadGeometry,
}

impl PathTracingSystem {
    /// Build the two-attachment render stage, pipeline, and quad geometry
    pub fn new(context: &VulkanContext, resources: &Resources, shaders: &ShaderSet) -> VulkanResult<Self> {
        let accumulate = resources.pt_accumulate();
        let random = resources.pt_random();

        let attachment = |format: vk::Format| {
            vk::AttachmentDescription::builder()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                // The wrapping barriers own the layout; inside the pass the
                // attachments stay general
                .initial_layout(vk::ImageLayout::GENERAL)
                .final_layout(vk::ImageLayout::GENERAL)
                .build()
        };
        let attachments = vec![attachment(accumulate.format()), attachment(random.format())];

        let framebuffer_views = (0..context.frames_in_flight())
            .map(|frame| vec![accumulate.layer_view(frame), random.layer_view(frame)])
            .collect();

        let stage = RenderStage::new(
            context.raw_device(),
            &RenderStageDesc {
                attachments,
                color_refs: vec![
                    vk::AttachmentReference {
                        attachment: 0,
                        layout: vk::ImageLayout::GENERAL,
                    },
                    vk::AttachmentReference {
                        attachment: 1,
                        layout: vk::ImageLayout::GENERAL,
                    },
                ],
                depth_ref: None,
                framebuffer_views,
                extent: accumulate.extent(),
            },
        )?;

        let (vertex_bindings, vertex_attributes) = quad_vertex_layout();
        let pipeline = Pipeline::new_graphics(
            context.raw_device(),
            resources.empty_set_layout(),
            context.max_bound_descriptor_sets(),
            &PipelineDesc {
                vertex_spirv: &shaders.path_tracing_vertex,
                fragment_spirv: &shaders.path_tracing_fragment,
                vertex_bindings,
                vertex_attributes,
                set_layouts: vec![
                    (resources.uniform_group().set_index(), resources.uniform_group().layout()),
                    (resources.scene_group().set_index(), resources.scene_group().layout()),
                    (resources.pass_input_group().set_index(), resources.pass_input_group().layout()),
                ],
                push_constant_ranges: vec![FramePushConstants::range()],
                color_attachment_count: 2,
                depth_attachment: false,
                render_pass: stage.render_pass(),
            },
        )?;

        let quad = QuadGeometry::new(context, resources)?;

        Ok(Self {
            stage,
            pipeline,
            quad,
        })
    }

    fn transition_targets(
        &self,
        context: &VulkanContext,
        command_buffer: vk::CommandBuffer,
        resources: &Resources,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    ) {
        for image in [resources.pt_accumulate(), resources.pt_random()] {
            cmd_transition_image_layout(
                &context.device().device,
                command_buffer,
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                image.layer_count(),
                old_layout,
                new_layout,
                src_stage,
                dst_stage,
            );
        }
    }

    /// Record the path-tracing pass into this frame's framebuffer
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

        self.transition_targets(
            context,
            command_buffer,
            resources,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::GENERAL,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::FRAGMENT_SHADER,
        );

        cmd_set_dynamic_state(device, command_buffer, self.stage.extent());

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0; 4] },
            },
            vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0; 4] },
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

            device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.quad.vertex_buffer()], &[0]);
            device.cmd_bind_index_buffer(command_buffer, self.quad.index_buffer(), 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(command_buffer, self.quad.index_count(), 1, 0, 0, 0);

            device.cmd_end_render_pass(command_buffer);
        }

        self.transition_targets(
            context,
            command_buffer,
            resources,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        );
    }
}
