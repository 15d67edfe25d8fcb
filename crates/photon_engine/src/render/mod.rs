//! Rendering layer
//!
//! The Vulkan backend plus the collaborator contracts it consumes: the
//! developer-console overlay hook and the GPU frame-time profiler sink.

use ash::vk;

/// Vulkan rendering backend
pub mod vulkan;

pub use vulkan::{PhotonRenderer, VulkanError, VulkanResult};

/// Developer-console overlay collaborator.
///
/// Invoked once per frame inside the output pass's render-pass scope with an
/// open command buffer; the implementation records its own draw commands and
/// returns nothing. The core treats it as opaque.
pub trait ConsoleOverlay {
    /// Record overlay draw commands into the active output render pass
    fn record(&mut self, command_buffer: vk::CommandBuffer, image_index: usize, frame_index: usize);
}

/// Console overlay that draws nothing
pub struct NullConsole;

impl ConsoleOverlay for NullConsole {
    fn record(&mut self, _: vk::CommandBuffer, _: usize, _: usize) {}
}

/// Profiler collaborator receiving GPU frame times derived from the
/// per-frame timestamp queries.
pub trait FrameProfiler {
    /// Report one completed frame's GPU time in milliseconds
    fn record_gpu_frame_time(&mut self, millis: f64);
}

/// Profiler sink that forwards frame times to the log facade
#[derive(Default)]
pub struct LogProfiler;

impl FrameProfiler for LogProfiler {
    fn record_gpu_frame_time(&mut self, millis: f64) {
        log::debug!("GPU frame time: {millis:.3} ms");
    }
}
