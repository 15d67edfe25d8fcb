//! Command units
//!
//! A command unit is one graphics+compute queue with its reset-capable
//! command pool, a fixed pool of reusable primary command buffers (one per
//! frame slot), and a timestamp query pool (start/end pair per frame slot)
//! for GPU frame timing.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// One queue plus its command pool, command buffers, and timestamp queries
pub struct CommandUnit {
    device: Device,
    queue: vk::Queue,
    family_index: u32,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    query_pool: vk::QueryPool,
}

impl CommandUnit {
    /// Create a command unit for one queue family
    pub fn new(device: Device, family_index: u32, frame_slots: usize) -> VulkanResult<Self> {
        log::debug!("Creating command unit for queue family {family_index}");

        let queue = unsafe { device.get_device_queue(family_index, 0) };

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family_index);
        let command_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frame_slots as u32);
        let command_buffers = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        // Start/end timestamp pair per frame slot
        let query_info = vk::QueryPoolCreateInfo::builder()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count((frame_slots * 2) as u32);
        let query_pool = unsafe {
            device
                .create_query_pool(&query_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            queue,
            family_index,
            command_pool,
            command_buffers,
            query_pool,
        })
    }

    /// Get the queue handle
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Get the queue family index
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// Command buffer assigned to a frame slot
    pub fn command_buffer(&self, frame_slot: usize) -> vk::CommandBuffer {
        self.command_buffers[frame_slot]
    }

    /// Reset this slot's timestamp pair; recorded into the command buffer so
    /// it is ordered against the writes by queue order
    pub fn cmd_reset_slot_timestamps(&self, command_buffer: vk::CommandBuffer, frame_slot: usize) {
        unsafe {
            self.device
                .cmd_reset_query_pool(command_buffer, self.query_pool, (frame_slot * 2) as u32, 2);
        }
    }

    /// Write the frame-start timestamp
    pub fn cmd_write_start_timestamp(&self, command_buffer: vk::CommandBuffer, frame_slot: usize) {
        unsafe {
            self.device.cmd_write_timestamp(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                self.query_pool,
                (frame_slot * 2) as u32,
            );
        }
    }

    /// Write the frame-end timestamp
    pub fn cmd_write_end_timestamp(&self, command_buffer: vk::CommandBuffer, frame_slot: usize) {
        unsafe {
            self.device.cmd_write_timestamp(
                command_buffer,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                self.query_pool,
                (frame_slot * 2) as u32 + 1,
            );
        }
    }

    /// Read back a slot's GPU frame time in milliseconds.
    ///
    /// Callers wait the slot fence first, so the results are available
    /// without `WAIT`; `None` means the queries were not ready anyway.
    pub fn read_frame_time_ms(&self, frame_slot: usize, timestamp_period_ns: f32) -> VulkanResult<Option<f64>> {
        let mut timestamps = [0u64; 2];
        let result = unsafe {
            self.device.get_query_pool_results(
                self.query_pool,
                (frame_slot * 2) as u32,
                2,
                &mut timestamps,
                vk::QueryResultFlags::TYPE_64,
            )
        };

        match result {
            Ok(()) => {
                let ticks = timestamps[1].saturating_sub(timestamps[0]);
                let nanos = ticks as f64 * f64::from(timestamp_period_ns);
                Ok(Some(nanos / 1_000_000.0))
            }
            Err(vk::Result::NOT_READY) => Ok(None),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }
}

impl Drop for CommandUnit {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_query_pool(self.query_pool, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Fixed array of command units, one per graphics+compute queue family
pub struct CommandUnits {
    units: Vec<CommandUnit>,
}

impl CommandUnits {
    /// Create one command unit per queue family
    pub fn new(device: Device, families: &[u32], frame_slots: usize) -> VulkanResult<Self> {
        if families.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "No graphics+compute queue families".to_string(),
            ));
        }

        let units = families
            .iter()
            .map(|&family| CommandUnit::new(device.clone(), family, frame_slots))
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self { units })
    }

    /// First command unit
    pub fn front(&self) -> &CommandUnit {
        &self.units[0]
    }

    /// Last command unit
    pub fn back(&self) -> &CommandUnit {
        &self.units[self.units.len() - 1]
    }

    /// Command unit at an index
    pub fn at(&self, index: usize) -> &CommandUnit {
        &self.units[index]
    }

    /// Number of command units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether there are no units (never true after construction)
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit assigned to a frame slot
    pub fn unit_for_frame(&self, frame_slot: usize) -> &CommandUnit {
        &self.units[frame_slot % self.units.len()]
    }
}

#[cfg(test)]
mod tests {
    /// Frame slots spread over the available units round-robin
    #[test]
    fn frame_slot_assignment_is_round_robin() {
        let unit_count = 2;
        let assignments: Vec<usize> = (0..6).map(|frame| frame % unit_count).collect();
        assert_eq!(assignments, vec![0, 1, 0, 1, 0, 1]);
    }

    /// Timestamp query indices never collide between slots
    #[test]
    fn slot_query_ranges_are_disjoint() {
        let ranges: Vec<(usize, usize)> = (0..3).map(|slot| (slot * 2, slot * 2 + 1)).collect();
        assert_eq!(ranges, vec![(0, 1), (2, 3), (4, 5)]);
    }
}
