//! Render systems
//!
//! Each system pairs one render stage + pipeline with the draw-call
//! recording specific to its pass. The fixed recording order within a frame
//! is shadow map, path tracing, rasterization, then the unconditional
//! output composite.

pub mod output;
pub mod path_tracing;
pub mod rasterization;
pub mod shadow_map;

pub use output::OutputSystem;
pub use path_tracing::PathTracingSystem;
pub use rasterization::RasterizationSystem;
pub use shadow_map::ShadowMappingSystem;

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};

use crate::config::RendererConfig;
use crate::render::vulkan::buffer::GpuBuffer;
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::descriptor::DescriptorGroup;
use crate::render::vulkan::pipeline::Pipeline;
use crate::render::vulkan::resources::Resources;
use crate::render::vulkan::shader::ShaderSet;

/// The four render systems in one bundle
pub struct RenderSystems {
    /// Shadow-map depth pass
    pub shadow_mapping: ShadowMappingSystem,
    /// Forward rasterization pass
    pub rasterization: RasterizationSystem,
    /// Path-tracing accumulation pass
    pub path_tracing: PathTracingSystem,
    /// Swapchain composite pass
    pub output: OutputSystem,
}

impl RenderSystems {
    /// Build all four systems
    pub fn new(
        context: &VulkanContext,
        resources: &Resources,
        shaders: &ShaderSet,
        config: &RendererConfig,
    ) -> VulkanResult<Self> {
        Ok(Self {
            shadow_mapping: ShadowMappingSystem::new(context, resources, shaders)?,
            rasterization: RasterizationSystem::new(context, resources, shaders, config)?,
            path_tracing: PathTracingSystem::new(context, resources, shaders)?,
            output: OutputSystem::new(context, resources, shaders, config)?,
        })
    }
}

/// Vertex of the full-screen quad used by the output and path-tracing passes
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct QuadVertex {
    /// Clip-space position
    pub position: [f32; 2],
    /// Texture coordinate
    pub uv: [f32; 2],
}

/// Full-screen quad corners, front-facing under counter-clockwise winding
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 0.0] },
    QuadVertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 1.0] },
];

/// Index list drawing the quad as two triangles
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Private full-screen-quad geometry owned by a render system
pub struct QuadGeometry {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
}

impl QuadGeometry {
    /// Create and upload the quad's vertex and index buffers
    pub fn new(context: &VulkanContext, resources: &Resources) -> VulkanResult<Self> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&QUAD_INDICES);

        let vertex_buffer = GpuBuffer::new(
            context.raw_device(),
            context.memory_properties(),
            vertex_bytes.len() as u64,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let index_buffer = GpuBuffer::new(
            context.raw_device(),
            context.memory_properties(),
            index_bytes.len() as u64,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        resources.staged_upload(&vertex_buffer, vertex_bytes)?;
        resources.staged_upload(&index_buffer, index_bytes)?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        QUAD_INDICES.len() as u32
    }
}

/// Vertex input layout of the quad passes
pub fn quad_vertex_layout() -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let bindings = vec![vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<QuadVertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let attributes = vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: 8,
        },
    ];
    (bindings, attributes)
}

/// Vertex input layout of the geometry passes: separate position, normal,
/// and material-id streams
pub fn geometry_vertex_layout() -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let bindings = vec![
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<[f32; 3]>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
        vk::VertexInputBindingDescription {
            binding: 1,
            stride: std::mem::size_of::<[f32; 3]>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
        vk::VertexInputBindingDescription {
            binding: 2,
            stride: std::mem::size_of::<u32>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
    ];
    let attributes = vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 1,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 2,
            format: vk::Format::R32_UINT,
            offset: 0,
        },
    ];
    (bindings, attributes)
}

/// Set the three dynamic states every pipeline leaves to draw time
pub fn cmd_set_dynamic_state(device: &Device, command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    unsafe {
        device.cmd_set_viewport(command_buffer, 0, &[viewport]);
        device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        device.cmd_set_line_width(command_buffer, 1.0);
    }
}

/// Bind each descriptor group's set for this frame at its declared index,
/// picking the shared or frame-indexed set per group
pub fn cmd_bind_groups(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    pipeline: &Pipeline,
    groups: &[&DescriptorGroup],
    frame_index: usize,
) {
    for group in groups {
        unsafe {
            device.cmd_bind_descriptor_sets(
                command_buffer,
                pipeline.bind_point(),
                pipeline.layout(),
                group.set_index(),
                &[group.set_for_frame(frame_index)],
                &[],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_two_whole_triangles() {
        assert_eq!(QUAD_INDICES.len(), 6);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn quad_vertex_matches_shader_stride() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        let (bindings, attributes) = quad_vertex_layout();
        assert_eq!(bindings[0].stride, 16);
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn geometry_streams_are_separate_bindings() {
        let (bindings, attributes) = geometry_vertex_layout();
        assert_eq!(bindings.len(), 3);
        assert_eq!(attributes.len(), 3);
        // Every attribute reads its own stream from offset zero
        assert!(attributes.iter().all(|a| a.offset == 0));
        assert!(attributes.iter().enumerate().all(|(i, a)| a.binding == i as u32));
    }
}
