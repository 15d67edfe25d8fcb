//! Descriptor set and resource binding management
//!
//! A descriptor group is one (set layout, pool, N sets) triple bound at a
//! fixed `set` index. Groups shared identically across all frame slots hold
//! exactly one set; per-frame groups hold one set per swapchain image.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// One binding within a descriptor group
pub struct BindingDesc {
    /// Binding index within the set
    pub binding: u32,
    /// Descriptor type
    pub ty: vk::DescriptorType,
    /// Shader stages that read the binding
    pub stages: vk::ShaderStageFlags,
}

/// Creation parameters for a [`DescriptorGroup`]
pub struct DescriptorGroupDesc {
    /// The fixed `set` index this group binds at
    pub set_index: u32,
    /// One shared set for all frame slots, or one set per slot
    pub single_set: bool,
    /// Bindings at fixed indices
    pub bindings: Vec<BindingDesc>,
}

/// Number of descriptor sets a group allocates
fn set_count_for(single_set: bool, frames_in_flight: usize) -> usize {
    if single_set {
        1
    } else {
        frames_in_flight
    }
}

/// Descriptor group: layout, pool, and sets at a fixed set index
pub struct DescriptorGroup {
    device: Device,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
    set_index: u32,
    single_set: bool,
}

impl DescriptorGroup {
    /// Create the layout, pool, and sets for one group
    pub fn new(device: Device, desc: &DescriptorGroupDesc, frames_in_flight: usize) -> VulkanResult<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.ty)
                    .descriptor_count(1)
                    .stage_flags(b.stages)
                    .build()
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let set_count = set_count_for(desc.single_set, frames_in_flight) as u32;

        let pool_sizes: Vec<vk::DescriptorPoolSize> = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorPoolSize::builder()
                    .ty(b.ty)
                    .descriptor_count(set_count)
                    .build()
            })
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(set_count)
            .pool_sizes(&pool_sizes);
        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let layouts = vec![layout; set_count as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            layout,
            pool,
            sets,
            set_index: desc.set_index,
            single_set: desc.single_set,
        })
    }

    /// The layout handle
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// The fixed `set` index this group binds at
    pub fn set_index(&self) -> u32 {
        self.set_index
    }

    /// Whether one shared set serves every frame slot
    pub fn is_single_set(&self) -> bool {
        self.single_set
    }

    /// Number of allocated sets
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// The set to bind for a frame slot: the shared set, or this slot's own
    pub fn set_for_frame(&self, frame_slot: usize) -> vk::DescriptorSet {
        if self.single_set {
            self.sets[0]
        } else {
            self.sets[frame_slot]
        }
    }

    /// Point a buffer binding at a buffer, in every set of the group
    pub fn write_buffer(
        &self,
        binding: u32,
        ty: vk::DescriptorType,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) {
        for &set in &self.sets {
            let buffer_info = [vk::DescriptorBufferInfo::builder()
                .buffer(buffer)
                .offset(0)
                .range(range)
                .build()];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(0)
                .descriptor_type(ty)
                .buffer_info(&buffer_info)
                .build();
            unsafe {
                self.device.update_descriptor_sets(&[write], &[]);
            }
        }
    }

    /// Point an image binding at a view+sampler, one view per frame slot.
    ///
    /// `view_for_frame` receives the frame index of each set; single-set
    /// groups pass 0.
    pub fn write_image_per_frame(
        &self,
        binding: u32,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
        mut view_for_frame: impl FnMut(usize) -> vk::ImageView,
    ) {
        for (frame, &set) in self.sets.iter().enumerate() {
            let image_info = [vk::DescriptorImageInfo::builder()
                .image_view(view_for_frame(frame))
                .sampler(sampler)
                .image_layout(layout)
                .build()];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info)
                .build();
            unsafe {
                self.device.update_descriptor_sets(&[write], &[]);
            }
        }
    }
}

impl Drop for DescriptorGroup {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// An empty descriptor set layout used to fill unused pipeline-layout slots
pub struct EmptySetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl EmptySetLayout {
    /// Create the empty layout (once per context)
    pub fn new(device: Device) -> VulkanResult<Self> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder();
        let layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, layout })
    }

    /// Get the layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for EmptySetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_frame_groups_get_one_set_per_swapchain_image() {
        assert_eq!(set_count_for(false, 3), 3);
        assert_eq!(set_count_for(false, 2), 2);
    }

    #[test]
    fn shared_groups_get_exactly_one_set() {
        assert_eq!(set_count_for(true, 3), 1);
        assert_eq!(set_count_for(true, 1), 1);
    }
}
