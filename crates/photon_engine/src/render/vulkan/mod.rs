//! Vulkan rendering backend
//!
//! Low-level Vulkan implementation owning the full GPU resource lifecycle:
//! bootstrap, buffers/images/descriptors, render stages and pipelines, the
//! four render systems, and the per-frame-in-flight orchestrator.

pub mod arena;
pub mod buffer;
pub mod command_unit;
pub mod context;
pub mod descriptor;
pub mod frame;
pub mod image;
pub mod pipeline;
pub mod render_stage;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod systems;

// Re-export commonly used types
pub use arena::ArenaAllocator;
pub use buffer::GpuBuffer;
pub use command_unit::{CommandUnit, CommandUnits};
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use descriptor::{DescriptorGroup, DescriptorGroupDesc};
pub use frame::{FrameOrchestrator, FrameStatus, PassKind, PassState};
pub use image::{GpuImage, Sampler};
pub use pipeline::{Pipeline, PipelineDesc};
pub use render_stage::{RenderStage, RenderStageDesc};
pub use renderer::PhotonRenderer;
pub use resources::{Invalidate, Resources};
pub use shader::{ShaderModule, ShaderSet};
pub use swapchain::Swapchain;
pub use sync::{Fence, Semaphore};
pub use systems::RenderSystems;
