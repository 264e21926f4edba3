//! Per-image state tracking and barrier batching.
//!
//! The tracker keeps the last state every image was *recorded* into, not the
//! state the GPU has reached. A transition compares against that record,
//! queues a barrier if needed and updates the record at once, so a later
//! transition in the same command buffer starts from the queued target.
//! Queued barriers are emitted together by [`ResourceStateTracker::flush`].

use std::collections::HashMap;

use ash::vk;
use tracing::trace;

use crate::error::{RenderError, RenderResult};

/// Accesses that modify memory. Anything else is a read.
const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::SHADER_WRITE.as_raw()
        | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
        | vk::AccessFlags2::HOST_WRITE.as_raw()
        | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
);

/// Pipeline stage, access mask and layout an image was last used with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

impl ResourceState {
    /// Contents undefined; nothing to wait for.
    pub const UNDEFINED: Self = Self::new(
        vk::PipelineStageFlags2::NONE,
        vk::AccessFlags2::NONE,
        vk::ImageLayout::UNDEFINED,
    );

    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    pub const FRAGMENT_SHADER_READ: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// Handed to the presentation engine. The stage matches the submit's
    /// wait stage so the next acquire orders against it.
    pub const PRESENT: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::NONE,
        vk::ImageLayout::PRESENT_SRC_KHR,
    );

    pub const fn new(
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        layout: vk::ImageLayout,
    ) -> Self {
        Self {
            stage,
            access,
            layout,
        }
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        !self.access.intersects(WRITE_ACCESS)
    }

    /// True if moving from `self` to `target` needs no barrier: the states
    /// are equal, or both are reads in the same layout and `target` is
    /// already covered by `self`.
    pub fn satisfies(&self, target: &ResourceState) -> bool {
        if self == target {
            return true;
        }
        self.layout == target.layout
            && self.is_read_only()
            && target.is_read_only()
            && self.stage.contains(target.stage)
            && self.access.contains(target.access)
    }
}

/// A queued transition of one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingBarrier {
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub from: ResourceState,
    pub to: ResourceState,
}

impl PendingBarrier {
    pub fn to_vk(&self) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(self.from.stage)
            .src_access_mask(self.from.access)
            .dst_stage_mask(self.to.stage)
            .dst_access_mask(self.to.access)
            .old_layout(self.from.layout)
            .new_layout(self.to.layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(self.aspect)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
            )
    }
}

/// Destination for flushed barriers, normally a command buffer.
pub trait BarrierSink {
    /// Records every barrier in `barriers` as one pipeline barrier.
    fn pipeline_barrier(
        &mut self,
        cmd: vk::CommandBuffer,
        barriers: &[vk::ImageMemoryBarrier2<'_>],
    );
}

/// Last recorded state of every known image, plus the barriers queued since
/// the previous flush.
#[derive(Debug, Default)]
pub struct ResourceStateTracker {
    states: HashMap<vk::Image, ResourceState>,
    pending: Vec<PendingBarrier>,
}

impl ResourceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the state an image is in without queueing a barrier.
    pub fn register(&mut self, image: vk::Image, initial: ResourceState) {
        self.states.insert(image, initial);
    }

    /// Drops the record of an image that no longer exists.
    pub fn forget(&mut self, image: vk::Image) {
        self.states.remove(&image);
        self.pending.retain(|barrier| barrier.image != image);
    }

    /// Queues a barrier that takes `image` to the given state, unless it is
    /// already there. Returns whether a barrier was queued.
    ///
    /// Unknown images are treated as [`ResourceState::UNDEFINED`].
    pub fn transition(
        &mut self,
        image: vk::Image,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        layout: vk::ImageLayout,
        aspect: vk::ImageAspectFlags,
    ) -> bool {
        self.transition_to(image, ResourceState::new(stage, access, layout), aspect)
    }

    /// [`ResourceStateTracker::transition`] with a named state.
    pub fn transition_to(
        &mut self,
        image: vk::Image,
        target: ResourceState,
        aspect: vk::ImageAspectFlags,
    ) -> bool {
        let current = self.state_of(image);
        if current.satisfies(&target) {
            return false;
        }

        trace!(
            "Queue barrier for {:?}: {:?} -> {:?}",
            image, current.layout, target.layout
        );

        self.pending.push(PendingBarrier {
            image,
            aspect,
            from: current,
            to: target,
        });
        self.states.insert(image, target);
        true
    }

    /// Brings a swapchain image to the presentable layout. Every frame ends
    /// with this, whether or not anything rendered into the image.
    pub fn transition_to_present(&mut self, image: vk::Image) -> bool {
        self.transition_to(image, ResourceState::PRESENT, vk::ImageAspectFlags::COLOR)
    }

    /// Emits every queued barrier in a single call and clears the queue.
    /// Returns how many barriers were emitted.
    pub fn flush(&mut self, sink: &mut dyn BarrierSink, cmd: vk::CommandBuffer) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let barriers: Vec<vk::ImageMemoryBarrier2<'static>> =
            self.pending.iter().map(PendingBarrier::to_vk).collect();
        sink.pipeline_barrier(cmd, &barriers);

        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Fails if barriers were queued but not flushed. Checked before a
    /// command buffer is closed.
    pub fn assert_drained(&self) -> RenderResult<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(RenderError::PendingBarriers {
                count: self.pending.len(),
            })
        }
    }

    pub fn state_of(&self, image: vk::Image) -> ResourceState {
        self.states
            .get(&image)
            .copied()
            .unwrap_or(ResourceState::UNDEFINED)
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &[PendingBarrier] {
        &self.pending
    }
}
