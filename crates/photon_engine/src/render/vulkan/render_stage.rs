//! Render stages
//!
//! A render stage pairs one render pass with one framebuffer per swapchain
//! image, the declarative unit every render system is built from.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Creation parameters for a [`RenderStage`]
pub struct RenderStageDesc {
    /// Attachment descriptions in reference order
    pub attachments: Vec<vk::AttachmentDescription>,
    /// Color attachment references for the single subpass
    pub color_refs: Vec<vk::AttachmentReference>,
    /// Optional depth attachment reference
    pub depth_ref: Option<vk::AttachmentReference>,
    /// One attachment-view list per swapchain image
    pub framebuffer_views: Vec<Vec<vk::ImageView>>,
    /// Framebuffer extent; must match the attachment images
    pub extent: vk::Extent2D,
}

/// One render pass plus per-swapchain-image framebuffers
pub struct RenderStage {
    device: Device,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl RenderStage {
    /// Build the render pass and its framebuffers
    pub fn new(device: Device, desc: &RenderStageDesc) -> VulkanResult<Self> {
        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&desc.color_refs);
        if let Some(depth_ref) = &desc.depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass.build()];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&desc.attachments)
            .subpasses(&subpasses);

        let render_pass = unsafe {
            device
                .create_render_pass(&render_pass_info, None)
                .map_err(VulkanError::Api)?
        };

        let framebuffers = Self::build_framebuffers(&device, render_pass, &desc.framebuffer_views, desc.extent)?;

        Ok(Self {
            device,
            render_pass,
            framebuffers,
            extent: desc.extent,
        })
    }

    fn build_framebuffers(
        device: &Device,
        render_pass: vk::RenderPass,
        views: &[Vec<vk::ImageView>],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        views
            .iter()
            .map(|attachments| {
                let framebuffer_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                unsafe {
                    device
                        .create_framebuffer(&framebuffer_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    /// Destroy and rebuild the framebuffers against new views (swapchain
    /// recreation); the render pass itself is format-stable and kept
    pub fn recreate_framebuffers(
        &mut self,
        views: &[Vec<vk::ImageView>],
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
        self.framebuffers = Self::build_framebuffers(&self.device, self.render_pass, views, extent)?;
        self.extent = extent;
        Ok(())
    }

    /// Get the render pass handle
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for one swapchain image
    pub fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index]
    }

    /// Number of framebuffers (== swapchain image count)
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Framebuffer extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for RenderStage {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
