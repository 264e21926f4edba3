//! The per-frame control loop.
//!
//! [`FrameOrchestrator::run_frame`] takes one frame through:
//!
//! 1. Take the next slot from the ring and wait for its previous submission.
//! 2. Acquire the next presentable image, signaling the slot's
//!    `image_available` semaphore. With no image the frame is dropped:
//!    nothing is recorded or submitted.
//! 3. Begin recording and run the render passes in order.
//! 4. Bring the image to the presentable layout, flush, end recording.
//! 5. Submit, waiting on `image_available` and signaling the image's
//!    `rendering_done` semaphore.
//! 6. Present, waiting on `rendering_done`.
//! 7. If nothing was presented and the window has area, rebuild the surface
//!    at the established resolution. Any other resolution is fatal.

use std::time::Duration;

use ash::vk;
use tracing::{debug, error, info, trace, warn};

use crate::cyclic::CyclicQueue;
use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::state_tracker::{BarrierSink, ResourceStateTracker};
use crate::surface::{PresentSurface, SurfaceConfig};

/// Window queries the frame loop needs.
pub trait WindowState {
    /// Current drawable size in pixels; `(0, 0)` while minimized.
    fn resolution(&self) -> (u32, u32);

    fn has_area(&self) -> bool {
        let (width, height) = self.resolution();
        width > 0 && height > 0
    }
}

impl WindowState for shadertoy_platform::Window {
    fn resolution(&self) -> (u32, u32) {
        shadertoy_platform::Window::resolution(self)
    }
}

/// What happened to a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Recorded, submitted and presented.
    Presented,
    /// No presentable image; nothing was recorded.
    Dropped,
    /// Submitted, but presentation reported the surface unusable.
    PresentFailed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub presented: u64,
    pub dropped: u64,
    pub present_failed: u64,
    pub surface_rebuilds: u64,
}

/// State a render pass records against.
pub struct PassContext<'a> {
    pub cmd: vk::CommandBuffer,
    pub target: vk::Image,
    pub target_view: vk::ImageView,
    pub target_extent: vk::Extent2D,
    pub target_format: vk::Format,
    /// Index of the frame slot being recorded.
    pub slot: usize,
    pub tracker: &'a mut ResourceStateTracker,
    pub sink: &'a mut dyn BarrierSink,
}

impl PassContext<'_> {
    /// Emits the barriers queued so far into `cmd`.
    pub fn flush(&mut self) -> usize {
        self.tracker.flush(&mut *self.sink, self.cmd)
    }
}

/// A rendering collaborator. Passes run in a fixed order each frame and
/// must transition every resource they touch before using it.
pub trait RenderPass {
    fn name(&self) -> &str;

    fn record(&mut self, ctx: &mut PassContext<'_>) -> RenderResult<()>;
}

pub struct FrameOrchestrator<C: FrameContext, S: PresentSurface> {
    context: C,
    slots: CyclicQueue<C::Slot>,
    surface: S,
    tracker: ResourceStateTracker,
    // Resolution and vsync fixed at startup, used for every rebuild
    desired: SurfaceConfig,
    stats: FrameStats,
    simulated_cpu_work: Option<Duration>,
}

impl<C: FrameContext, S: PresentSurface> FrameOrchestrator<C, S> {
    /// The surface must already be configured; its resolution becomes the
    /// one every rebuild has to reproduce.
    pub fn new(context: C, slots: CyclicQueue<C::Slot>, surface: S) -> Self {
        let granted = surface.config();
        let desired = SurfaceConfig {
            image_count: 0,
            ..granted
        };
        info!(
            "Frame orchestrator: {} frame(s) in flight, established resolution {}x{}",
            slots.len(),
            desired.resolution.width,
            desired.resolution.height
        );

        Self {
            context,
            slots,
            surface,
            tracker: ResourceStateTracker::new(),
            desired,
            stats: FrameStats::default(),
            simulated_cpu_work: None,
        }
    }

    /// Sleeps this long on every recorded frame, after the passes and
    /// before the command buffer is closed.
    pub fn with_simulated_cpu_work(mut self, work: Option<Duration>) -> Self {
        self.simulated_cpu_work = work;
        self
    }

    /// Runs one frame. Only fatal conditions are errors.
    pub fn run_frame(
        &mut self,
        window: &dyn WindowState,
        passes: &mut [&mut dyn RenderPass],
    ) -> RenderResult<FrameOutcome> {
        self.stats.frames += 1;

        // The slot is consumed whatever happens to the frame
        let (slot_index, slot) = self.slots.acquire_next();

        // Nothing the slot owns may be reused before its last submission
        // completes, including the semaphore the acquire is about to signal
        self.context.wait(slot)?;
        let available = self.context.image_available(slot);

        let outcome = match self.surface.acquire_next(available)? {
            None => {
                debug!(slot = slot_index, "No presentable image, frame dropped");
                self.stats.dropped += 1;
                FrameOutcome::Dropped
            }
            Some(image) => {
                let cmd = self.context.begin(slot)?;
                let config = self.surface.config();

                let mut ctx = PassContext {
                    cmd,
                    target: image.image,
                    target_view: image.view,
                    target_extent: config.resolution,
                    target_format: self.surface.format(),
                    slot: slot_index,
                    tracker: &mut self.tracker,
                    sink: self.context.barrier_sink(),
                };
                for pass in passes.iter_mut() {
                    trace!(slot = slot_index, pass = pass.name(), "Recording pass");
                    if let Err(e) = pass.record(&mut ctx) {
                        error!("Render pass '{}' failed: {}", pass.name(), e);
                        return Err(e);
                    }
                }

                self.tracker.transition_to_present(image.image);
                self.tracker.flush(self.context.barrier_sink(), cmd);
                self.tracker.assert_drained()?;

                if let Some(work) = self.simulated_cpu_work {
                    std::thread::sleep(work);
                }

                self.context.end(slot)?;
                self.context
                    .submit(slot, image.available, image.rendering_done)?;

                if self.surface.present(image.rendering_done, &image)? {
                    self.stats.presented += 1;
                    FrameOutcome::Presented
                } else {
                    debug!(slot = slot_index, image = image.index, "Present failed");
                    self.stats.present_failed += 1;
                    FrameOutcome::PresentFailed
                }
            }
        };

        if outcome != FrameOutcome::Presented && window.has_area() {
            self.rebuild_surface()?;
        }

        Ok(outcome)
    }

    fn rebuild_surface(&mut self) -> RenderResult<()> {
        // New images start undefined, even if the driver reuses handles
        for image in self.surface.images() {
            self.tracker.forget(image);
        }

        let actual = self.surface.recreate(self.desired)?;
        if actual.width == 0 || actual.height == 0 {
            debug!("Surface not rebuilt yet, still without area");
            return Ok(());
        }

        self.stats.surface_rebuilds += 1;

        let expected = self.desired.resolution;
        if actual != expected {
            warn!(
                "Surface rebuilt at {}x{} instead of {}x{}",
                actual.width, actual.height, expected.width, expected.height
            );
            return Err(RenderError::ResolutionMismatch { expected, actual });
        }

        info!(
            "Surface rebuilt at {}x{} (rebuild #{})",
            actual.width, actual.height, self.stats.surface_rebuilds
        );
        Ok(())
    }

    /// Waits for the GPU to finish everything, then releases the surface.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        self.context.wait_idle()?;
        self.surface.teardown();
        info!(
            "Frame loop stopped: {} presented, {} dropped, {} surface rebuild(s)",
            self.stats.presented, self.stats.dropped, self.stats.surface_rebuilds
        );
        Ok(())
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    #[inline]
    pub fn tracker(&self) -> &ResourceStateTracker {
        &self.tracker
    }

    #[inline]
    pub fn tracker_mut(&mut self) -> &mut ResourceStateTracker {
        &mut self.tracker
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[inline]
    pub fn established_resolution(&self) -> vk::Extent2D {
        self.desired.resolution
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }
}
