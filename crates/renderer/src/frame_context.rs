//! Device-side half of a frame: recording into a slot's command buffer and
//! submitting it.
//!
//! Each [`FrameSlot`] carries a fence created signaled. `wait` blocks on it,
//! which is where the CPU stops once it is N frames ahead of the GPU. The
//! slot also owns the semaphore its swapchain acquire signals, so that
//! semaphore is never handed out again while a submission still waits on it.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use shadertoy_rhi::RhiResult;
use shadertoy_rhi::command::{CommandBuffer, CommandPool};
use shadertoy_rhi::device::Device;
use shadertoy_rhi::sync::{Fence, Semaphore};

use crate::cyclic::CyclicQueue;
use crate::error::RenderResult;
use crate::state_tracker::BarrierSink;

/// Records and submits the command buffer of a frame slot.
pub trait FrameContext {
    /// Per-frame state owned by the slot ring.
    type Slot;

    /// Blocks until the slot's previous submission has completed. Runs
    /// before anything owned by the slot is reused, dropped frames included.
    fn wait(&mut self, slot: &mut Self::Slot) -> RenderResult<()>;

    /// Semaphore the swapchain acquire for this slot signals.
    fn image_available(&self, slot: &Self::Slot) -> vk::Semaphore;

    /// Resets and begins the slot's command buffer.
    fn begin(&mut self, slot: &mut Self::Slot) -> RenderResult<vk::CommandBuffer>;

    fn end(&mut self, slot: &mut Self::Slot) -> RenderResult<()>;

    /// Submits the slot's command buffer. Color output waits on `wait`;
    /// `signal` fires when the work completes.
    fn submit(
        &mut self,
        slot: &mut Self::Slot,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    ) -> RenderResult<()>;

    fn barrier_sink(&mut self) -> &mut dyn BarrierSink;

    fn wait_idle(&self) -> RenderResult<()>;
}

/// One entry of the frames-in-flight ring.
pub struct FrameSlot {
    index: usize,
    command_buffer: CommandBuffer,
    image_available: Semaphore,
    in_flight: Fence,
}

impl FrameSlot {
    pub fn new(device: Arc<Device>, pool: &CommandPool, index: usize) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), pool)?;
        let image_available = Semaphore::new(device.clone())?;
        // Signaled so the first wait returns at once
        let in_flight = Fence::new(device, true)?;
        debug!("Created frame slot {}", index);
        Ok(Self {
            index,
            command_buffer,
            image_available,
            in_flight,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }
}

/// Records barriers straight into a command buffer.
pub struct VulkanBarrierSink {
    device: Arc<Device>,
}

impl VulkanBarrierSink {
    pub fn new(device: Arc<Device>) -> Self {
        Self { device }
    }
}

impl BarrierSink for VulkanBarrierSink {
    fn pipeline_barrier(
        &mut self,
        cmd: vk::CommandBuffer,
        barriers: &[vk::ImageMemoryBarrier2<'_>],
    ) {
        CommandBuffer::from_handle(self.device.clone(), cmd).pipeline_barrier2(barriers);
    }
}

/// [`FrameContext`] on the graphics queue.
pub struct VulkanFrameContext {
    device: Arc<Device>,
    // Owns the slots' command buffers
    command_pool: CommandPool,
    sink: VulkanBarrierSink,
}

impl VulkanFrameContext {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        Ok(Self {
            sink: VulkanBarrierSink::new(device.clone()),
            device,
            command_pool,
        })
    }

    /// Builds the ring of `frames_in_flight` slots.
    pub fn create_slots(&self, frames_in_flight: usize) -> RhiResult<CyclicQueue<FrameSlot>> {
        let slots = CyclicQueue::try_new(frames_in_flight, |index| {
            FrameSlot::new(self.device.clone(), &self.command_pool, index)
        })?;
        info!("Created {} frame slots", slots.len());
        Ok(slots)
    }
}

impl FrameContext for VulkanFrameContext {
    type Slot = FrameSlot;

    fn wait(&mut self, slot: &mut FrameSlot) -> RenderResult<()> {
        slot.in_flight.wait(u64::MAX)?;
        Ok(())
    }

    fn image_available(&self, slot: &FrameSlot) -> vk::Semaphore {
        slot.image_available.handle()
    }

    fn begin(&mut self, slot: &mut FrameSlot) -> RenderResult<vk::CommandBuffer> {
        slot.command_buffer.reset()?;
        slot.command_buffer.begin()?;
        Ok(slot.command_buffer.handle())
    }

    fn end(&mut self, slot: &mut FrameSlot) -> RenderResult<()> {
        slot.command_buffer.end()?;
        Ok(())
    }

    fn submit(
        &mut self,
        slot: &mut FrameSlot,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    ) -> RenderResult<()> {
        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(wait)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let command_buffer_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(slot.command_buffer.handle())];
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(signal)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        // Reset only now, so a failure while recording never leaves the
        // fence unsignaled with nothing queued to signal it
        slot.in_flight.reset()?;
        // SAFETY: the command buffer was ended by `end`, the wait semaphore
        // was signaled by this frame's acquire and the fence was just reset.
        unsafe {
            self.device
                .submit_graphics(&[submit], slot.in_flight.handle())?;
        }
        Ok(())
    }

    fn barrier_sink(&mut self) -> &mut dyn BarrierSink {
        &mut self.sink
    }

    fn wait_idle(&self) -> RenderResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }
}
