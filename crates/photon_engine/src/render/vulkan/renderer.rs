//! Renderer facade
//!
//! `PhotonRenderer` is the dependency-injected owner of the whole backend:
//! context, resources, render systems, and frame orchestrator, constructed
//! once at process start and passed by reference to collaborators. Scene
//! updates arrive here and fan out to the resource update entry points and
//! the dirty flags.

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::RendererConfig;
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::frame::FrameOrchestrator;
use crate::render::vulkan::resources::Resources;
use crate::render::vulkan::scene::{FrameUniforms, SceneDescription, SceneGeometry, ShaderSet};
use crate::render::vulkan::systems::RenderSystems;
use crate::render::{ConsoleOverlay, FrameProfiler, LogProfiler};

/// The hybrid path-tracing/rasterization renderer
pub struct PhotonRenderer {
    // Declaration order is drop order: sync objects and pipelines go before
    // the resources they reference, the context last
    orchestrator: FrameOrchestrator,
    systems: RenderSystems,
    resources: Resources,
    context: VulkanContext,
}

impl PhotonRenderer {
    /// Bootstrap the full backend from config, window handles, and the
    /// externally compiled shader set. Every failure here is fatal to
    /// startup.
    pub fn new(
        config: &RendererConfig,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        shaders: ShaderSet,
    ) -> VulkanResult<Self> {
        Self::with_profiler(config, display, window, shaders, Box::new(LogProfiler))
    }

    /// Bootstrap with a caller-supplied GPU frame-time profiler sink
    pub fn with_profiler(
        config: &RendererConfig,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        shaders: ShaderSet,
        profiler: Box<dyn FrameProfiler>,
    ) -> VulkanResult<Self> {
        log::debug!("Creating PhotonRenderer");

        let context = VulkanContext::new(config, display, window)?;
        let resources = Resources::new(&context, config)?;
        let systems = RenderSystems::new(&context, &resources, &shaders, config)?;
        let orchestrator = FrameOrchestrator::new(&context, profiler)?;

        log::debug!("PhotonRenderer created");
        Ok(Self {
            orchestrator,
            systems,
            resources,
            context,
        })
    }

    /// Replace the scene geometry. Recreates the three vertex attribute
    /// buffers iff the vertex count changed and forces re-recording of all
    /// conditional passes.
    pub fn update_scene_geometry(&mut self, geometry: &SceneGeometry) -> VulkanResult<()> {
        // In-flight frames may still reference the old buffers; geometry
        // replacement is rare enough to serialize against the GPU
        if geometry.vertex_count() != self.resources.vertex_count() {
            self.context.wait_idle()?;
        }

        let invalidate = self.resources.update_vertex_input_buffers(geometry)?;
        self.orchestrator.apply_invalidation(invalidate);
        Ok(())
    }

    /// Replace the structured scene description (BVH nodes + materials)
    pub fn update_scene_description(&mut self, scene: &SceneDescription) -> VulkanResult<()> {
        let invalidate = self.resources.update_scene_buffer(scene)?;
        self.orchestrator.apply_invalidation(invalidate);
        Ok(())
    }

    /// Update the per-frame uniform block; shading or visibility may have
    /// changed, so all conditional passes re-record
    pub fn update_uniforms(&mut self, uniforms: &FrameUniforms) -> VulkanResult<()> {
        let invalidate = self.resources.update_uniforms(uniforms)?;
        self.orchestrator.apply_invalidation(invalidate);
        Ok(())
    }

    /// Camera rotation: new uniforms plus a path-tracing accumulation
    /// restart
    pub fn rotate_camera(&mut self, uniforms: &FrameUniforms) -> VulkanResult<()> {
        self.orchestrator.reset_accumulation();
        self.update_uniforms(uniforms)
    }

    /// Draw one frame: acquire, conditionally record, submit, present.
    ///
    /// Acquire failures are fatal and propagate. Submit/present failures
    /// abandon the frame with the dirty flags re-armed; the same work is
    /// retried next frame and the process keeps running.
    pub fn draw_frame(&mut self, console: &mut dyn ConsoleOverlay) -> VulkanResult<()> {
        let image_index = self.orchestrator.frame_prepare(&self.context)?;

        if let Err(e) = self.orchestrator.frame_run(
            &self.context,
            &self.resources,
            &self.systems,
            console,
            image_index,
        ) {
            log::error!("Frame submit failed, abandoning frame: {e}");
            return Ok(());
        }

        if let Err(e) = self.orchestrator.frame_present(&self.context, image_index) {
            log::error!("Frame present failed, abandoning frame: {e}");
        }
        Ok(())
    }

    /// Recreate the swapchain and output framebuffers at a new extent
    pub fn resize(&mut self, width: u32, height: u32) -> VulkanResult<()> {
        log::debug!("Resizing swapchain to {width}x{height}");
        self.context
            .recreate_swapchain(vk::Extent2D { width, height })?;
        self.systems.output.recreate_framebuffers(&self.context)
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// The backend context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// The resource owner
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// The frame orchestrator
    pub fn orchestrator(&self) -> &FrameOrchestrator {
        &self.orchestrator
    }
}
