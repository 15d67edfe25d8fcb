//! GPU image management
//!
//! Images are created once at startup, sized to the configured framebuffer
//! resolution, with one array layer per frame slot. Each layer gets an
//! individual view for per-frame-slot rendering; images whose history must
//! be sampled across all slots additionally carry one combined array view.

use ash::{vk, Device};

use crate::render::vulkan::buffer::find_memory_type;
use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Creation parameters for a [`GpuImage`]
pub struct GpuImageDesc {
    /// Pixel format
    pub format: vk::Format,
    /// Width and height; never implicitly resized
    pub extent: vk::Extent2D,
    /// Array layer count (one per frame slot for per-frame targets)
    pub layers: u32,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Aspect for the views (color or depth)
    pub aspect: vk::ImageAspectFlags,
    /// Whether to also build one combined view across all layers
    pub combined_view: bool,
}

/// GPU image with per-layer views and an optional combined array view
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
    aspect: vk::ImageAspectFlags,
    layer_views: Vec<vk::ImageView>,
    combined_view: Option<vk::ImageView>,
}

impl GpuImage {
    /// Create the image, bind device-local memory, and build its views
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &GpuImageDesc,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(desc.layers)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe {
            match device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_image_memory(image, memory, 0) {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        // One individual view per layer
        let mut layer_views = Vec::with_capacity(desc.layers as usize);
        for layer in 0..desc.layers {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(desc.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: desc.aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: layer,
                    layer_count: 1,
                });
            let view = unsafe {
                device
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)?
            };
            layer_views.push(view);
        }

        let combined_view = if desc.combined_view {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D_ARRAY)
                .format(desc.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: desc.aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: desc.layers,
                });
            let view = unsafe {
                device
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)?
            };
            Some(view)
        } else {
            None
        };

        Ok(Self {
            device,
            image,
            memory,
            format: desc.format,
            extent: desc.extent,
            aspect: desc.aspect,
            layer_views,
            combined_view,
        })
    }

    /// Get the image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get the image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get the view aspect
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    /// Number of array layers
    pub fn layer_count(&self) -> u32 {
        self.layer_views.len() as u32
    }

    /// Individual view for one layer (one per frame slot)
    pub fn layer_view(&self, layer: usize) -> vk::ImageView {
        self.layer_views[layer]
    }

    /// All individual layer views
    pub fn layer_views(&self) -> &[vk::ImageView] {
        &self.layer_views
    }

    /// Combined view across all layers, if requested at creation
    pub fn combined_view(&self) -> Option<vk::ImageView> {
        self.combined_view
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if let Some(view) = self.combined_view {
                self.device.destroy_image_view(view, None);
            }
            for &view in &self.layer_views {
                self.device.destroy_image_view(view, None);
            }
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Texture sampler with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create a linear clamp-to-edge sampler with anisotropy
    pub fn linear(device: Device, max_anisotropy: f32) -> VulkanResult<Self> {
        Self::create(device, vk::Filter::LINEAR, max_anisotropy)
    }

    /// Create a nearest clamp-to-edge sampler
    pub fn nearest(device: Device) -> VulkanResult<Self> {
        Self::create(device, vk::Filter::NEAREST, 1.0)
    }

    fn create(device: Device, filter: vk::Filter, max_anisotropy: f32) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .anisotropy_enable(max_anisotropy > 1.0)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe {
            device
                .create_sampler(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, sampler })
    }

    /// Get the sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
