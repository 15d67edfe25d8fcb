//! GPU buffer management
//!
//! RAII buffers with explicit memory-type selection. Buffers are destroyed
//! and recreated, never resized in place, when their logical size changes.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// GPU buffer with its backing memory
///
/// # Memory Management
/// Each buffer owns one dedicated allocation, selected from the device's
/// memory types by usage requirements, and frees it on drop.
pub struct GpuBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    host_visible: bool,
}

impl GpuBuffer {
    /// Create a buffer with the exact requested memory properties
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
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
                    device.destroy_buffer(buffer, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        let host_visible = properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            host_visible,
        })
    }

    /// Create a buffer preferring one property set but accepting a fallback.
    ///
    /// Used for the uniform block, which wants device-local + host-visible
    /// memory but settles for plain host-visible when no such type exists.
    pub fn new_preferring(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        preferred: vk::MemoryPropertyFlags,
        fallback: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        match Self::new(device.clone(), memory_properties, size, usage, preferred) {
            Ok(buffer) => Ok(buffer),
            Err(VulkanError::NoSuitableMemoryType) => {
                log::debug!("Preferred memory properties unavailable, using fallback");
                Self::new(device, memory_properties, size, usage, fallback)
            }
            Err(e) => Err(e),
        }
    }

    /// Write bytes through a map/copy/unmap cycle (host-visible only)
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        if !self.host_visible {
            return Err(VulkanError::InvalidOperation {
                reason: "write_bytes on non-host-visible buffer".to_string(),
            });
        }
        if data.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes into {}-byte buffer", data.len(), self.size),
            });
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Read bytes back through a map (host-visible only)
    pub fn read_bytes(&self, out: &mut [u8]) -> VulkanResult<()> {
        if !self.host_visible {
            return Err(VulkanError::InvalidOperation {
                reason: "read_bytes on non-host-visible buffer".to_string(),
            });
        }
        if out.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("read of {} bytes from {}-byte buffer", out.len(), self.size),
            });
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(mapped.cast::<u8>(), out.as_mut_ptr(), out.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get buffer byte size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Whether the buffer's memory is host-visible
    pub fn is_host_visible(&self) -> bool {
        self.host_visible
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find a memory type satisfying the filter and property flags
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
        {
            return Ok(i);
        }
    }
    Err(VulkanError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = flags.len() as u32;
        for (i, &property_flags) in flags.iter().enumerate() {
            properties.memory_types[i].property_flags = property_flags;
        }
        properties
    }

    #[test]
    fn picks_first_matching_type() {
        let properties = synthetic_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(
            &properties,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn respects_the_type_filter() {
        let properties = synthetic_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Type 0 is masked out by the filter
        let index = find_memory_type(&properties, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn missing_type_is_an_error() {
        let properties = synthetic_memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let result = find_memory_type(&properties, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }
}
