//! GPU resource ownership
//!
//! `Resources` owns every long-lived buffer, image, sampler, and descriptor
//! group in the engine and exposes the typed update entry points. Geometry
//! buffers are destroyed and recreated when the vertex
//! count changes, never resized in place; device-local updates go through
//! staged uploads; the small per-frame uniform block is written by direct
//! map.

use ash::{vk, Device};
use bitflags::bitflags;

use crate::render::vulkan::buffer::GpuBuffer;
use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::descriptor::{BindingDesc, DescriptorGroup, DescriptorGroupDesc, EmptySetLayout};
use crate::render::vulkan::image::{GpuImage, GpuImageDesc, Sampler};
use crate::render::vulkan::scene::{FrameUniforms, SceneDescription, SceneGeometry};
use crate::render::vulkan::sync::cmd_transition_image_layout;

bitflags! {
    /// Which conditional passes an update invalidated. Returned by the
    /// update entry points; the facade maps it onto every frame slot's
    /// dirty flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Invalidate: u32 {
        /// Shadow-map pass must re-record
        const SHADOW_MAPPING = 1;
        /// Rasterization pass must re-record
        const RASTERIZATION = 1 << 1;
        /// Path-tracing pass must re-record
        const PATH_TRACING = 1 << 2;
    }
}

/// Descriptor set index of the shared uniform-block group
pub const SET_UNIFORMS: u32 = 0;
/// Descriptor set index of the shared scene-description group
pub const SET_SCENE: u32 = 1;
/// Descriptor set index of the per-frame pass-input group
pub const SET_PASS_INPUTS: u32 = 2;

/// Binding indices within the pass-input group
pub mod pass_input_binding {
    /// Rasterization color result for this frame slot
    pub const RASTER_COLOR: u32 = 0;
    /// Shadow map depth for this frame slot
    pub const SHADOW_DEPTH: u32 = 1;
    /// Accumulation history across all frame slots
    pub const ACCUMULATE_HISTORY: u32 = 2;
    /// Accumulation result for this frame slot
    pub const ACCUMULATE_RESULT: u32 = 3;
    /// Random-state history across all frame slots
    pub const RANDOM_HISTORY: u32 = 4;
}

/// The three per-vertex attribute buffers, recreated together on any vertex
/// count change
struct GeometryBuffers {
    position: GpuBuffer,
    normal: GpuBuffer,
    material_id: GpuBuffer,
    vertex_count: usize,
}

/// Byte sizes of the three vertex attribute buffers for a vertex count
fn geometry_buffer_sizes(vertex_count: usize) -> (u64, u64, u64) {
    let positions = (vertex_count * std::mem::size_of::<[f32; 3]>()) as u64;
    let normals = (vertex_count * std::mem::size_of::<[f32; 3]>()) as u64;
    let material_ids = (vertex_count * std::mem::size_of::<u32>()) as u64;
    (positions, normals, material_ids)
}

/// Owner of all long-lived GPU resources
pub struct Resources {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    frames_in_flight: usize,

    geometry: Option<GeometryBuffers>,
    uniform_buffer: GpuBuffer,
    scene_buffer: GpuBuffer,

    raster_color: GpuImage,
    raster_depth: GpuImage,
    shadow_depth: GpuImage,
    pt_accumulate: GpuImage,
    pt_random: GpuImage,

    linear_sampler: Sampler,
    nearest_sampler: Sampler,

    uniform_group: DescriptorGroup,
    scene_group: DescriptorGroup,
    pass_input_group: DescriptorGroup,
    empty_layout: EmptySetLayout,

    transfer_pool: vk::CommandPool,
    transfer_queue: vk::Queue,
}

impl Resources {
    /// Create all startup-sized resources: images at the configured
    /// framebuffer/shadow resolution with one layer per frame slot, the
    /// uniform block, the scene buffer, samplers, and descriptor groups.
    pub fn new(context: &VulkanContext, config: &crate::config::RendererConfig) -> VulkanResult<Self> {
        log::debug!("Creating resources");

        let device = context.raw_device();
        let memory_properties = *context.memory_properties();
        let frames_in_flight = context.frames_in_flight();
        let layers = frames_in_flight as u32;

        let frame_extent = vk::Extent2D {
            width: config.framebuffer_width,
            height: config.framebuffer_height,
        };
        let shadow_extent = vk::Extent2D {
            width: config.shadow_map_resolution,
            height: config.shadow_map_resolution,
        };

        let raster_color = GpuImage::new(
            device.clone(),
            &memory_properties,
            &GpuImageDesc {
                format: vk::Format::B8G8R8A8_UNORM,
                extent: frame_extent,
                layers,
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
                combined_view: false,
            },
        )?;
        let raster_depth = GpuImage::new(
            device.clone(),
            &memory_properties,
            &GpuImageDesc {
                format: context.depth_format(),
                extent: frame_extent,
                layers,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
                combined_view: false,
            },
        )?;
        let shadow_depth = GpuImage::new(
            device.clone(),
            &memory_properties,
            &GpuImageDesc {
                format: context.depth_format(),
                extent: shadow_extent,
                layers,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::DEPTH,
                combined_view: false,
            },
        )?;
        // History images carry a combined array view so the path-tracing
        // shader can sample every frame slot at once
        let pt_accumulate = GpuImage::new(
            device.clone(),
            &memory_properties,
            &GpuImageDesc {
                format: vk::Format::R32G32B32A32_SFLOAT,
                extent: frame_extent,
                layers,
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
                combined_view: true,
            },
        )?;
        let pt_random = GpuImage::new(
            device.clone(),
            &memory_properties,
            &GpuImageDesc {
                format: vk::Format::R32G32B32A32_SFLOAT,
                extent: frame_extent,
                layers,
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
                combined_view: true,
            },
        )?;

        let max_anisotropy = context
            .physical_device()
            .properties
            .limits
            .max_sampler_anisotropy;
        let linear_sampler = Sampler::linear(device.clone(), max_anisotropy)?;
        let nearest_sampler = Sampler::nearest(device.clone())?;

        let uniform_buffer = GpuBuffer::new_preferring(
            device.clone(),
            &memory_properties,
            std::mem::size_of::<FrameUniforms>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL
                | vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        uniform_buffer.write_bytes(bytemuck::bytes_of(&FrameUniforms::default()))?;

        let scene_buffer = GpuBuffer::new(
            device.clone(),
            &memory_properties,
            SceneDescription::buffer_size() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let empty_layout = EmptySetLayout::new(device.clone())?;

        let uniform_group = DescriptorGroup::new(
            device.clone(),
            &DescriptorGroupDesc {
                set_index: SET_UNIFORMS,
                single_set: true,
                bindings: vec![BindingDesc {
                    binding: 0,
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    stages: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                }],
            },
            frames_in_flight,
        )?;
        let scene_group = DescriptorGroup::new(
            device.clone(),
            &DescriptorGroupDesc {
                set_index: SET_SCENE,
                single_set: true,
                bindings: vec![BindingDesc {
                    binding: 0,
                    ty: vk::DescriptorType::STORAGE_BUFFER,
                    stages: vk::ShaderStageFlags::FRAGMENT,
                }],
            },
            frames_in_flight,
        )?;
        let pass_input_group = DescriptorGroup::new(
            device.clone(),
            &DescriptorGroupDesc {
                set_index: SET_PASS_INPUTS,
                single_set: false,
                bindings: [
                    pass_input_binding::RASTER_COLOR,
                    pass_input_binding::SHADOW_DEPTH,
                    pass_input_binding::ACCUMULATE_HISTORY,
                    pass_input_binding::ACCUMULATE_RESULT,
                    pass_input_binding::RANDOM_HISTORY,
                ]
                .iter()
                .map(|&binding| BindingDesc {
                    binding,
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    stages: vk::ShaderStageFlags::FRAGMENT,
                })
                .collect(),
            },
            frames_in_flight,
        )?;

        uniform_group.write_buffer(
            0,
            vk::DescriptorType::UNIFORM_BUFFER,
            uniform_buffer.handle(),
            uniform_buffer.size(),
        );
        scene_group.write_buffer(
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            scene_buffer.handle(),
            scene_buffer.size(),
        );
        pass_input_group.write_image_per_frame(
            pass_input_binding::RASTER_COLOR,
            linear_sampler.handle(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            |frame| raster_color.layer_view(frame),
        );
        pass_input_group.write_image_per_frame(
            pass_input_binding::SHADOW_DEPTH,
            nearest_sampler.handle(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            |frame| shadow_depth.layer_view(frame),
        );
        pass_input_group.write_image_per_frame(
            pass_input_binding::ACCUMULATE_HISTORY,
            linear_sampler.handle(),
            vk::ImageLayout::GENERAL,
            |_| pt_accumulate.combined_view().expect("accumulate image has a combined view"),
        );
        pass_input_group.write_image_per_frame(
            pass_input_binding::ACCUMULATE_RESULT,
            linear_sampler.handle(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            |frame| pt_accumulate.layer_view(frame),
        );
        pass_input_group.write_image_per_frame(
            pass_input_binding::RANDOM_HISTORY,
            nearest_sampler.handle(),
            vk::ImageLayout::GENERAL,
            |_| pt_random.combined_view().expect("random image has a combined view"),
        );

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(context.physical_device().primary_family);
        let transfer_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let resources = Self {
            device,
            memory_properties,
            frames_in_flight,
            geometry: None,
            uniform_buffer,
            scene_buffer,
            raster_color,
            raster_depth,
            shadow_depth,
            pt_accumulate,
            pt_random,
            linear_sampler,
            nearest_sampler,
            uniform_group,
            scene_group,
            pass_input_group,
            empty_layout,
            transfer_pool,
            transfer_queue: context.graphics_queue(),
        };

        // The path-tracing barriers assume a shader-read layout on entry;
        // establish it before the first frame
        resources.initialize_path_tracing_layouts()?;

        Ok(resources)
    }

    fn initialize_path_tracing_layouts(&self) -> VulkanResult<()> {
        self.one_shot_commands(|device, cmd| {
            for image in [&self.pt_accumulate, &self.pt_random] {
                cmd_transition_image_layout(
                    device,
                    cmd,
                    image.handle(),
                    vk::ImageAspectFlags::COLOR,
                    image.layer_count(),
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                );
            }
        })
    }

    /// Destroy and recreate the three vertex attribute buffers for a new
    /// vertex count
    pub fn create_vertex_input_buffers(&mut self, vertex_count: usize) -> VulkanResult<Invalidate> {
        log::debug!("Recreating vertex input buffers for {vertex_count} vertices");

        let (position_size, normal_size, material_size) = geometry_buffer_sizes(vertex_count);
        let usage = vk::BufferUsageFlags::VERTEX_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::TRANSFER_SRC;

        // Old buffers drop here; callers wait the slot fences before reuse
        self.geometry = Some(GeometryBuffers {
            position: GpuBuffer::new(
                self.device.clone(),
                &self.memory_properties,
                position_size,
                usage,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?,
            normal: GpuBuffer::new(
                self.device.clone(),
                &self.memory_properties,
                normal_size,
                usage,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?,
            material_id: GpuBuffer::new(
                self.device.clone(),
                &self.memory_properties,
                material_size,
                usage,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?,
            vertex_count,
        });

        Ok(Invalidate::all())
    }

    /// Upload new triangle-soup geometry, recreating the buffers iff the
    /// vertex count changed
    pub fn update_vertex_input_buffers(&mut self, geometry: &SceneGeometry) -> VulkanResult<Invalidate> {
        geometry.validate()?;

        let vertex_count = geometry.vertex_count();
        let needs_recreate = self
            .geometry
            .as_ref()
            .map_or(true, |buffers| buffers.vertex_count != vertex_count);
        if needs_recreate {
            self.create_vertex_input_buffers(vertex_count)?;
        }

        let buffers = self.geometry.as_ref().expect("geometry buffers exist after creation");
        self.staged_upload(&buffers.position, bytemuck::cast_slice(&geometry.positions))?;
        self.staged_upload(&buffers.normal, bytemuck::cast_slice(&geometry.normals))?;
        self.staged_upload(&buffers.material_id, bytemuck::cast_slice(&geometry.material_ids))?;

        Ok(Invalidate::all())
    }

    /// Destroy and recreate the structured scene buffer at a new byte size,
    /// re-pointing its descriptor binding
    pub fn create_scene_buffer(&mut self, size: u64) -> VulkanResult<Invalidate> {
        log::debug!("Recreating scene buffer at {size} bytes");

        self.scene_buffer = GpuBuffer::new(
            self.device.clone(),
            &self.memory_properties,
            size,
            vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        self.scene_group.write_buffer(
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            self.scene_buffer.handle(),
            self.scene_buffer.size(),
        );
        Ok(Invalidate::all())
    }

    /// Copy a scene description (BVH nodes + materials) verbatim into the
    /// structured scene buffer
    pub fn update_scene_buffer(&mut self, scene: &SceneDescription) -> VulkanResult<Invalidate> {
        let bytes = scene.encode()?;
        if bytes.len() as u64 > self.scene_buffer.size() {
            self.create_scene_buffer(bytes.len() as u64)?;
        }
        self.staged_upload(&self.scene_buffer, &bytes)?;
        Ok(Invalidate::all())
    }

    /// Write the per-frame uniform block by direct map; it is small and
    /// updated every frame, so no staging
    pub fn update_uniforms(&self, uniforms: &FrameUniforms) -> VulkanResult<Invalidate> {
        self.uniform_buffer.write_bytes(bytemuck::bytes_of(uniforms))?;
        Ok(Invalidate::all())
    }

    /// Staged upload: host-visible staging buffer, map/copy, one-shot
    /// staging-to-device copy, blocking on queue idle before the staging
    /// buffer is freed
    pub fn staged_upload(&self, dst: &GpuBuffer, data: &[u8]) -> VulkanResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() as u64 > dst.size() {
            return Err(VulkanError::InvalidOperation {
                reason: format!("upload of {} bytes into {}-byte buffer", data.len(), dst.size()),
            });
        }

        let staging = GpuBuffer::new(
            self.device.clone(),
            &self.memory_properties,
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(data)?;

        self.one_shot_commands(|device, cmd| {
            let host_to_transfer = vk::MemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::HOST_WRITE)
                .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
                .build();
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::HOST,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[host_to_transfer],
                    &[],
                    &[],
                );
            }

            let region = vk::BufferCopy::builder()
                .src_offset(0)
                .dst_offset(0)
                .size(data.len() as u64)
                .build();
            unsafe {
                device.cmd_copy_buffer(cmd, staging.handle(), dst.handle(), &[region]);
            }

            let transfer_to_read = vk::MemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(
                    vk::AccessFlags::VERTEX_ATTRIBUTE_READ
                        | vk::AccessFlags::INDEX_READ
                        | vk::AccessFlags::SHADER_READ,
                )
                .build();
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::VERTEX_INPUT | vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[transfer_to_read],
                    &[],
                    &[],
                );
            }
        })
        // Staging buffer drops after the queue went idle
    }

    /// Staged download, the reverse of [`Self::staged_upload`]; used for
    /// verification readbacks
    pub fn read_back_buffer(&self, src: &GpuBuffer, size: usize) -> VulkanResult<Vec<u8>> {
        if size as u64 > src.size() {
            return Err(VulkanError::InvalidOperation {
                reason: format!("readback of {size} bytes from {}-byte buffer", src.size()),
            });
        }

        let staging = GpuBuffer::new(
            self.device.clone(),
            &self.memory_properties,
            size as u64,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        self.one_shot_commands(|device, cmd| {
            let region = vk::BufferCopy::builder()
                .src_offset(0)
                .dst_offset(0)
                .size(size as u64)
                .build();
            unsafe {
                device.cmd_copy_buffer(cmd, src.handle(), staging.handle(), &[region]);
            }

            let transfer_to_host = vk::MemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::HOST_READ)
                .build();
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::HOST,
                    vk::DependencyFlags::empty(),
                    &[transfer_to_host],
                    &[],
                    &[],
                );
            }
        })?;

        let mut bytes = vec![0u8; size];
        staging.read_bytes(&mut bytes)?;
        Ok(bytes)
    }

    /// Record and submit a one-shot command buffer, blocking on queue idle
    fn one_shot_commands(&self, record: impl FnOnce(&Device, vk::CommandBuffer)) -> VulkanResult<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.transfer_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffers = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        };
        let cmd = command_buffers[0];

        let result = (|| {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe {
                self.device
                    .begin_command_buffer(cmd, &begin_info)
                    .map_err(VulkanError::Api)?;
            }

            record(&self.device, cmd);

            unsafe {
                self.device.end_command_buffer(cmd).map_err(VulkanError::Api)?;

                let command_buffers = [cmd];
                let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                self.device
                    .queue_submit(self.transfer_queue, &[submit_info.build()], vk::Fence::null())
                    .map_err(VulkanError::Api)?;
                self.device
                    .queue_wait_idle(self.transfer_queue)
                    .map_err(VulkanError::Api)?;
            }
            Ok(())
        })();

        unsafe {
            self.device.free_command_buffers(self.transfer_pool, &[cmd]);
        }
        result
    }

    /// Current vertex count, 0 before the first geometry upload
    pub fn vertex_count(&self) -> usize {
        self.geometry.as_ref().map_or(0, |buffers| buffers.vertex_count)
    }

    /// The three vertex buffer handles (position, normal, material id)
    pub fn vertex_buffers(&self) -> Option<[vk::Buffer; 3]> {
        self.geometry.as_ref().map(|buffers| {
            [
                buffers.position.handle(),
                buffers.normal.handle(),
                buffers.material_id.handle(),
            ]
        })
    }

    /// The structured scene buffer
    pub fn scene_buffer(&self) -> &GpuBuffer {
        &self.scene_buffer
    }

    /// The uniform block buffer
    pub fn uniform_buffer(&self) -> &GpuBuffer {
        &self.uniform_buffer
    }

    /// Rasterization color target
    pub fn raster_color(&self) -> &GpuImage {
        &self.raster_color
    }

    /// Rasterization depth target
    pub fn raster_depth(&self) -> &GpuImage {
        &self.raster_depth
    }

    /// Shadow-map depth target
    pub fn shadow_depth(&self) -> &GpuImage {
        &self.shadow_depth
    }

    /// Path-tracing accumulation target/history
    pub fn pt_accumulate(&self) -> &GpuImage {
        &self.pt_accumulate
    }

    /// Path-tracing random-state target/history
    pub fn pt_random(&self) -> &GpuImage {
        &self.pt_random
    }

    /// Linear clamp-to-edge sampler with anisotropy
    pub fn linear_sampler(&self) -> &Sampler {
        &self.linear_sampler
    }

    /// Nearest clamp-to-edge sampler
    pub fn nearest_sampler(&self) -> &Sampler {
        &self.nearest_sampler
    }

    /// Shared uniform-block descriptor group (set 0)
    pub fn uniform_group(&self) -> &DescriptorGroup {
        &self.uniform_group
    }

    /// Shared scene-description descriptor group (set 1)
    pub fn scene_group(&self) -> &DescriptorGroup {
        &self.scene_group
    }

    /// Per-frame pass-input descriptor group (set 2)
    pub fn pass_input_group(&self) -> &DescriptorGroup {
        &self.pass_input_group
    }

    /// The shared empty set layout for unused pipeline-layout slots
    pub fn empty_set_layout(&self) -> vk::DescriptorSetLayout {
        self.empty_layout.handle()
    }

    /// Frames-in-flight count the resources were sized for
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.transfer_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_sizes_scale_with_vertex_count() {
        let (positions, normals, material_ids) = geometry_buffer_sizes(6);
        assert_eq!(positions, 72);
        assert_eq!(normals, 72);
        assert_eq!(material_ids, 24);

        // A 6 -> 30 vertex update grows all three buffers to the new size
        let (positions, normals, material_ids) = geometry_buffer_sizes(30);
        assert_eq!(positions, 360);
        assert_eq!(normals, 360);
        assert_eq!(material_ids, 120);
    }

    #[test]
    fn every_update_invalidates_all_three_passes() {
        assert_eq!(
            Invalidate::all(),
            Invalidate::SHADOW_MAPPING | Invalidate::RASTERIZATION | Invalidate::PATH_TRACING
        );
    }
}
