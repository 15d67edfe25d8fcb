//! Frame orchestration
//!
//! Per-frame-in-flight synchronization objects and dirty tracking. Each
//! frame slot walks Idle → Acquiring → Recording → Submitted → Presented;
//! the slot fence bounds CPU-ahead-of-GPU skew to the frames-in-flight
//! count, and the `PassState` flags decide which conditional passes must
//! re-record. A flag goes `Clean` immediately after its pass is recorded;
//! safety against reuse comes from the fence, not the flag.

use ash::vk;

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::resources::{Invalidate, Resources};
use crate::render::vulkan::scene::FramePushConstants;
use crate::render::vulkan::sync::{Fence, Semaphore};
use crate::render::vulkan::systems::RenderSystems;
use crate::render::{ConsoleOverlay, FrameProfiler};

/// The three conditionally recorded passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Shadow-map depth pass
    ShadowMapping,
    /// Forward rasterization pass
    Rasterization,
    /// Path-tracing accumulation pass
    PathTracing,
}

/// Recording state of one pass in one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// The slot's recording of this pass is up to date
    Clean,
    /// The pass must be re-recorded before the next present
    Dirty,
}

/// Dirty flags for one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStatus {
    shadow_mapping: PassState,
    rasterization: PassState,
    path_tracing: PassState,
}

impl FrameStatus {
    /// All passes dirty; the state of a fresh slot
    pub const fn all_dirty() -> Self {
        Self {
            shadow_mapping: PassState::Dirty,
            rasterization: PassState::Dirty,
            path_tracing: PassState::Dirty,
        }
    }

    /// Whether a pass must re-record
    pub fn is_dirty(&self, pass: PassKind) -> bool {
        self.state(pass) == PassState::Dirty
    }

    /// The state of one pass
    pub fn state(&self, pass: PassKind) -> PassState {
        match pass {
            PassKind::ShadowMapping => self.shadow_mapping,
            PassKind::Rasterization => self.rasterization,
            PassKind::PathTracing => self.path_tracing,
        }
    }

    /// Mark one pass clean, immediately after recording it
    pub fn set_clean(&mut self, pass: PassKind) {
        *self.state_mut(pass) = PassState::Clean;
    }

    /// Re-arm every pass
    pub fn mark_all_dirty(&mut self) {
        *self = Self::all_dirty();
    }

    /// Re-arm the passes an update invalidated
    pub fn apply(&mut self, invalidate: Invalidate) {
        if invalidate.contains(Invalidate::SHADOW_MAPPING) {
            self.shadow_mapping = PassState::Dirty;
        }
        if invalidate.contains(Invalidate::RASTERIZATION) {
            self.rasterization = PassState::Dirty;
        }
        if invalidate.contains(Invalidate::PATH_TRACING) {
            self.path_tracing = PassState::Dirty;
        }
    }

    fn state_mut(&mut self, pass: PassKind) -> &mut PassState {
        match pass {
            PassKind::ShadowMapping => &mut self.shadow_mapping,
            PassKind::Rasterization => &mut self.rasterization,
            PassKind::PathTracing => &mut self.path_tracing,
        }
    }
}

impl Default for FrameStatus {
    fn default() -> Self {
        Self::all_dirty()
    }
}

/// Lifecycle phase of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presented,
}

/// One reusable set of per-frame synchronization objects and scratch state
struct FrameSlot {
    fence: Fence,
    image_acquired: Semaphore,
    // One completion semaphore per render system; the output one gates
    // presentation, since all four passes share a command buffer
    _shadow_complete: Semaphore,
    _rasterization_complete: Semaphore,
    _path_tracing_complete: Semaphore,
    output_complete: Semaphore,
    push: FramePushConstants,
    status: FrameStatus,
    phase: SlotPhase,
    timestamps_valid: bool,
    // False between a fence reset and a successful submit; waiting on the
    // fence then would never return
    fence_armed: bool,
}

impl FrameSlot {
    fn new(device: ash::Device) -> VulkanResult<Self> {
        Ok(Self {
            fence: Fence::new(device.clone(), true)?,
            image_acquired: Semaphore::new(device.clone())?,
            _shadow_complete: Semaphore::new(device.clone())?,
            _rasterization_complete: Semaphore::new(device.clone())?,
            _path_tracing_complete: Semaphore::new(device.clone())?,
            output_complete: Semaphore::new(device)?,
            push: FramePushConstants::default(),
            status: FrameStatus::all_dirty(),
            phase: SlotPhase::Idle,
            timestamps_valid: false,
            fence_armed: true,
        })
    }
}

/// Index of the slot after this one
const fn next_frame(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight
}

/// Drives acquire → conditional record → submit → present across the frame
/// slots
pub struct FrameOrchestrator {
    slots: Vec<FrameSlot>,
    current_frame: usize,
    sample_index: u32,
    start_time: std::time::Instant,
    profiler: Box<dyn FrameProfiler>,
}

impl FrameOrchestrator {
    /// Create one slot per frame in flight
    pub fn new(context: &VulkanContext, profiler: Box<dyn FrameProfiler>) -> VulkanResult<Self> {
        let slots = (0..context.frames_in_flight())
            .map(|_| FrameSlot::new(context.raw_device()))
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self {
            slots,
            current_frame: 0,
            sample_index: 0,
            start_time: std::time::Instant::now(),
            profiler,
        })
    }

    /// Wait on this slot's fence, report the slot's last GPU frame time,
    /// and acquire the next presentable image. Any acquire failure is
    /// fatal.
    pub fn frame_prepare(&mut self, context: &VulkanContext) -> VulkanResult<u32> {
        let slot = &mut self.slots[self.current_frame];
        if slot.fence_armed {
            slot.fence.wait()?;
        }

        if slot.timestamps_valid {
            let unit = context.command_units().unit_for_frame(self.current_frame);
            if let Some(millis) = unit.read_frame_time_ms(self.current_frame, context.timestamp_period())? {
                self.profiler.record_gpu_frame_time(millis);
            }
        }

        slot.phase = SlotPhase::Acquiring;
        let (image_index, _suboptimal) = unsafe {
            context
                .swapchain_loader()
                .acquire_next_image(
                    context.swapchain().handle(),
                    u64::MAX,
                    slot.image_acquired.handle(),
                    vk::Fence::null(),
                )
                .map_err(VulkanError::Api)?
        };

        slot.phase = SlotPhase::Recording;
        Ok(image_index)
    }

    /// Record this frame's command buffer (conditional passes only when
    /// dirty, output always) and submit it.
    pub fn frame_run(
        &mut self,
        context: &VulkanContext,
        resources: &Resources,
        systems: &RenderSystems,
        console: &mut dyn ConsoleOverlay,
        image_index: u32,
    ) -> VulkanResult<()> {
        let frame = self.current_frame;
        let image = image_index as usize;
        debug_assert_eq!(self.slots[frame].phase, SlotPhase::Recording);

        let push = FramePushConstants {
            sample_index: self.sample_index,
            frame_index: frame as u32,
            time_seconds: self.start_time.elapsed().as_secs_f32(),
            vertex_count: resources.vertex_count() as u32,
        };
        self.slots[frame].push = push;

        let unit = context.command_units().unit_for_frame(frame);
        let command_buffer = unit.command_buffer(frame);
        let device = &context.device().device;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        unit.cmd_reset_slot_timestamps(command_buffer, frame);
        unit.cmd_write_start_timestamp(command_buffer, frame);

        if self.slots[frame].status.is_dirty(PassKind::ShadowMapping) {
            systems
                .shadow_mapping
                .record(context, command_buffer, resources, image, frame, &push);
            self.slots[frame].status.set_clean(PassKind::ShadowMapping);
        }
        if self.slots[frame].status.is_dirty(PassKind::PathTracing) {
            systems
                .path_tracing
                .record(context, command_buffer, resources, image, frame, &push);
            self.slots[frame].status.set_clean(PassKind::PathTracing);
            // Each recorded path-tracing pass contributes one more
            // accumulation sample
            self.sample_index = self.sample_index.wrapping_add(1);
        }
        if self.slots[frame].status.is_dirty(PassKind::Rasterization) {
            systems
                .rasterization
                .record(context, command_buffer, resources, image, frame, &push);
            self.slots[frame].status.set_clean(PassKind::Rasterization);
        }

        systems
            .output
            .record(context, command_buffer, resources, image, frame, &push, console);

        unit.cmd_write_end_timestamp(command_buffer, frame);

        unsafe {
            device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let slot = &mut self.slots[frame];
        slot.fence.reset()?;
        slot.fence_armed = false;

        let wait_semaphores = [slot.image_acquired.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [slot.output_complete.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let submit_result = unsafe {
            device.queue_submit(unit.queue(), &[submit_info.build()], slot.fence.handle())
        };
        if let Err(e) = submit_result {
            // Re-arm so the abandoned work is retried next frame
            slot.status.mark_all_dirty();
            return Err(VulkanError::Api(e));
        }

        slot.fence_armed = true;
        slot.timestamps_valid = true;
        slot.phase = SlotPhase::Submitted;
        Ok(())
    }

    /// Present the acquired image and advance to the next frame slot
    pub fn frame_present(&mut self, context: &VulkanContext, image_index: u32) -> VulkanResult<()> {
        let slot = &mut self.slots[self.current_frame];
        debug_assert_eq!(slot.phase, SlotPhase::Submitted);

        let wait_semaphores = [slot.output_complete.handle()];
        let swapchains = [context.swapchain().handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let unit = context.command_units().unit_for_frame(self.current_frame);
        let result = unsafe {
            context
                .swapchain_loader()
                .queue_present(unit.queue(), &present_info)
        };

        slot.phase = SlotPhase::Presented;
        let outcome = match result {
            Ok(_) => Ok(()),
            Err(e) => {
                slot.status.mark_all_dirty();
                Err(VulkanError::Api(e))
            }
        };

        slot.phase = SlotPhase::Idle;
        self.current_frame = next_frame(self.current_frame, self.slots.len());
        outcome
    }

    /// Re-arm the passes an update invalidated, for every frame slot
    pub fn apply_invalidation(&mut self, invalidate: Invalidate) {
        for slot in &mut self.slots {
            slot.status.apply(invalidate);
        }
    }

    /// Re-arm all passes for every frame slot
    pub fn mark_all_dirty(&mut self) {
        self.apply_invalidation(Invalidate::all());
    }

    /// Reset the path-tracing accumulation counter (camera moved)
    pub fn reset_accumulation(&mut self) {
        self.sample_index = 0;
    }

    /// Current accumulation sample index
    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    /// Current frame slot index
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Dirty flags of one frame slot
    pub fn frame_status(&self, frame_slot: usize) -> FrameStatus {
        self.slots[frame_slot].status
    }

    /// Push-constant scratch last recorded for one frame slot
    pub fn frame_push_constants(&self, frame_slot: usize) -> FramePushConstants {
        self.slots[frame_slot].push
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_status_has_every_pass_dirty() {
        let status = FrameStatus::all_dirty();
        assert!(status.is_dirty(PassKind::ShadowMapping));
        assert!(status.is_dirty(PassKind::Rasterization));
        assert!(status.is_dirty(PassKind::PathTracing));
    }

    #[test]
    fn flags_converge_after_one_recording() {
        let mut status = FrameStatus::all_dirty();

        // One recording cycle cleans each pass exactly once
        for pass in [PassKind::ShadowMapping, PassKind::PathTracing, PassKind::Rasterization] {
            assert!(status.is_dirty(pass));
            status.set_clean(pass);
        }

        // With no further updates, nothing re-records
        for pass in [PassKind::ShadowMapping, PassKind::PathTracing, PassKind::Rasterization] {
            assert!(!status.is_dirty(pass));
        }
    }

    #[test]
    fn update_re_arms_only_invalidated_passes() {
        let mut status = FrameStatus::all_dirty();
        status.set_clean(PassKind::ShadowMapping);
        status.set_clean(PassKind::Rasterization);
        status.set_clean(PassKind::PathTracing);

        status.apply(Invalidate::RASTERIZATION);
        assert!(!status.is_dirty(PassKind::ShadowMapping));
        assert!(status.is_dirty(PassKind::Rasterization));
        assert!(!status.is_dirty(PassKind::PathTracing));

        status.apply(Invalidate::all());
        assert!(status.is_dirty(PassKind::ShadowMapping));
        assert!(status.is_dirty(PassKind::PathTracing));
    }

    #[test]
    fn frame_index_wraps_at_frames_in_flight() {
        assert_eq!(next_frame(0, 3), 1);
        assert_eq!(next_frame(1, 3), 2);
        assert_eq!(next_frame(2, 3), 0);
        assert_eq!(next_frame(0, 1), 0);
    }
}
