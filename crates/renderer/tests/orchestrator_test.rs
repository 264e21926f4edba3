//! Frame loop tests against in-memory fakes.
//!
//! The fakes log every call into a shared event list, so tests can check
//! both what happened and in which order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ash::vk::{self, Handle};

use shadertoy_renderer::{
    BarrierSink, CyclicQueue, FrameContext, FrameOrchestrator, FrameOutcome, PassContext,
    PresentSurface, PresentableImage, RenderError, RenderPass, RenderResult, ResourceState,
    SurfaceConfig, SurfaceState, WindowState,
};

const IMAGE_COUNT: u64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Event {
    Wait(usize),
    Acquire(vk::Semaphore),
    Begin(usize),
    Barriers(Vec<(vk::Image, vk::ImageLayout)>),
    End(usize),
    Submit {
        slot: usize,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    },
    Present {
        image: u32,
        wait: vk::Semaphore,
    },
    Recreate,
    WaitIdle,
    Teardown,
}

type Log = Rc<RefCell<Vec<Event>>>;

fn count(log: &Log, pred: impl Fn(&Event) -> bool) -> usize {
    log.borrow().iter().filter(|e| pred(e)).count()
}

// =============================================================================
// Fakes
// =============================================================================

struct FakeSink {
    log: Log,
}

impl BarrierSink for FakeSink {
    fn pipeline_barrier(
        &mut self,
        _cmd: vk::CommandBuffer,
        barriers: &[vk::ImageMemoryBarrier2<'_>],
    ) {
        let entries = barriers.iter().map(|b| (b.image, b.new_layout)).collect();
        self.log.borrow_mut().push(Event::Barriers(entries));
    }
}

struct FakeContext {
    log: Log,
    sink: FakeSink,
}

impl FakeContext {
    fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            sink: FakeSink { log: log.clone() },
        }
    }
}

fn image_available(slot: usize) -> vk::Semaphore {
    vk::Semaphore::from_raw(300 + slot as u64)
}

impl FrameContext for FakeContext {
    type Slot = usize;

    fn wait(&mut self, slot: &mut usize) -> RenderResult<()> {
        self.log.borrow_mut().push(Event::Wait(*slot));
        Ok(())
    }

    fn image_available(&self, slot: &usize) -> vk::Semaphore {
        image_available(*slot)
    }

    fn begin(&mut self, slot: &mut usize) -> RenderResult<vk::CommandBuffer> {
        self.log.borrow_mut().push(Event::Begin(*slot));
        Ok(vk::CommandBuffer::from_raw(1000 + *slot as u64))
    }

    fn end(&mut self, slot: &mut usize) -> RenderResult<()> {
        self.log.borrow_mut().push(Event::End(*slot));
        Ok(())
    }

    fn submit(
        &mut self,
        slot: &mut usize,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    ) -> RenderResult<()> {
        self.log.borrow_mut().push(Event::Submit {
            slot: *slot,
            wait,
            signal,
        });
        Ok(())
    }

    fn barrier_sink(&mut self) -> &mut dyn BarrierSink {
        &mut self.sink
    }

    fn wait_idle(&self) -> RenderResult<()> {
        self.log.borrow_mut().push(Event::WaitIdle);
        Ok(())
    }
}

/// Drawable size shared by the fake window and the fake surface, as the
/// real surface reads it from the OS window.
type Area = Rc<Cell<(u32, u32)>>;

struct FakeWindow {
    area: Area,
}

impl WindowState for FakeWindow {
    fn resolution(&self) -> (u32, u32) {
        self.area.get()
    }
}

struct FakeSurface {
    log: Log,
    area: Area,
    config: SurfaceConfig,
    state: SurfaceState,
    next_image: u32,
    // Handle offset of the current image set, bumped on every rebuild
    generation: u64,
    fail_next_present: bool,
    // Extent granted by the next rebuild instead of the requested one
    grant_override: Option<vk::Extent2D>,
}

impl FakeSurface {
    fn new(log: &Log, area: &Area) -> Self {
        let (width, height) = area.get();
        Self {
            log: log.clone(),
            area: area.clone(),
            config: SurfaceConfig {
                image_count: IMAGE_COUNT as u32,
                ..SurfaceConfig::new(width, height, true)
            },
            state: SurfaceState::Ready,
            next_image: 0,
            generation: 0,
            fail_next_present: false,
            grant_override: None,
        }
    }

    fn image(&self, index: u32) -> vk::Image {
        vk::Image::from_raw(100 + self.generation * 10 + index as u64)
    }
}

impl PresentSurface for FakeSurface {
    fn acquire_next(
        &mut self,
        available: vk::Semaphore,
    ) -> RenderResult<Option<PresentableImage>> {
        self.log.borrow_mut().push(Event::Acquire(available));

        let (width, height) = self.area.get();
        if width == 0 || height == 0 {
            self.state = SurfaceState::Stale;
        }
        if self.state != SurfaceState::Ready {
            return Ok(None);
        }

        let index = self.next_image;
        self.next_image = (self.next_image + 1) % IMAGE_COUNT as u32;
        Ok(Some(PresentableImage {
            index,
            image: self.image(index),
            view: vk::ImageView::from_raw(200 + index as u64),
            available,
            rendering_done: vk::Semaphore::from_raw(400 + index as u64),
        }))
    }

    fn present(&mut self, wait: vk::Semaphore, image: &PresentableImage) -> RenderResult<bool> {
        self.log.borrow_mut().push(Event::Present {
            image: image.index,
            wait,
        });
        if std::mem::take(&mut self.fail_next_present) {
            self.state = SurfaceState::Stale;
            return Ok(false);
        }
        Ok(true)
    }

    fn recreate(&mut self, desired: SurfaceConfig) -> RenderResult<vk::Extent2D> {
        self.log.borrow_mut().push(Event::Recreate);

        let (width, height) = self.area.get();
        if width == 0 || height == 0 {
            return Ok(vk::Extent2D::default());
        }

        let granted = self.grant_override.unwrap_or(desired.resolution);
        self.config = SurfaceConfig {
            resolution: granted,
            vsync: desired.vsync,
            image_count: IMAGE_COUNT as u32,
        };
        self.generation += 1;
        self.next_image = 0;
        self.state = SurfaceState::Ready;
        Ok(granted)
    }

    fn state(&self) -> SurfaceState {
        self.state
    }

    fn config(&self) -> SurfaceConfig {
        self.config
    }

    fn format(&self) -> vk::Format {
        vk::Format::B8G8R8A8_SRGB
    }

    fn images(&self) -> Vec<vk::Image> {
        (0..IMAGE_COUNT as u32).map(|i| self.image(i)).collect()
    }

    fn teardown(&mut self) {
        self.log.borrow_mut().push(Event::Teardown);
        self.state = SurfaceState::Unconfigured;
    }
}

/// Renders into the target, the way the toy pass does.
#[derive(Default)]
struct DrawToTarget {
    slots_seen: Vec<usize>,
}

impl RenderPass for DrawToTarget {
    fn name(&self) -> &str {
        "draw-to-target"
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        self.slots_seen.push(ctx.slot);
        ctx.tracker.transition_to(
            ctx.target,
            ResourceState::COLOR_ATTACHMENT_WRITE,
            vk::ImageAspectFlags::COLOR,
        );
        ctx.flush();
        Ok(())
    }
}

/// Fails on every frame.
struct FailingPass;

impl RenderPass for FailingPass {
    fn name(&self) -> &str {
        "failing"
    }

    fn record(&mut self, _ctx: &mut PassContext<'_>) -> RenderResult<()> {
        Err(RenderError::UnknownProgram("missing".to_string()))
    }
}

struct Harness {
    log: Log,
    area: Area,
    window: FakeWindow,
    orchestrator: FrameOrchestrator<FakeContext, FakeSurface>,
    pass: DrawToTarget,
}

impl Harness {
    fn new(frames_in_flight: usize) -> Self {
        let log: Log = Rc::default();
        let area: Area = Rc::new(Cell::new((1280, 720)));
        let orchestrator = FrameOrchestrator::new(
            FakeContext::new(&log),
            CyclicQueue::new(frames_in_flight, |index| index),
            FakeSurface::new(&log, &area),
        );
        Self {
            window: FakeWindow { area: area.clone() },
            log,
            area,
            orchestrator,
            pass: DrawToTarget::default(),
        }
    }

    fn frame(&mut self) -> RenderResult<FrameOutcome> {
        let mut passes: [&mut dyn RenderPass; 1] = [&mut self.pass];
        self.orchestrator.run_frame(&self.window, &mut passes)
    }

    fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_steady_state_frames_present() {
    let mut h = Harness::new(2);

    for _ in 0..4 {
        assert_eq!(h.frame().unwrap(), FrameOutcome::Presented);
    }

    let stats = h.orchestrator.stats();
    assert_eq!(stats.frames, 4);
    assert_eq!(stats.presented, 4);
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.surface_rebuilds, 0);
}

#[test]
fn test_frame_protocol_order() {
    let mut h = Harness::new(2);
    h.frame().unwrap();

    let log = h.log.borrow();
    let target = vk::Image::from_raw(100);
    assert_eq!(
        *log,
        vec![
            Event::Wait(0),
            Event::Acquire(image_available(0)),
            Event::Begin(0),
            Event::Barriers(vec![(target, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)]),
            Event::Barriers(vec![(target, vk::ImageLayout::PRESENT_SRC_KHR)]),
            Event::End(0),
            Event::Submit {
                slot: 0,
                wait: image_available(0),
                signal: vk::Semaphore::from_raw(400),
            },
            Event::Present {
                image: 0,
                wait: vk::Semaphore::from_raw(400),
            },
        ]
    );
}

#[test]
fn test_target_ends_presentable_with_nothing_pending() {
    let mut h = Harness::new(2);
    h.frame().unwrap();

    let tracker = h.orchestrator.tracker();
    assert_eq!(tracker.pending_len(), 0);
    assert_eq!(
        tracker.state_of(vk::Image::from_raw(100)),
        ResourceState::PRESENT
    );
}

#[test]
fn test_untouched_target_still_transitions_to_present() {
    let mut h = Harness::new(2);
    let mut passes: [&mut dyn RenderPass; 0] = [];
    h.orchestrator.run_frame(&h.window, &mut passes).unwrap();

    assert_eq!(
        h.orchestrator.tracker().state_of(vk::Image::from_raw(100)),
        ResourceState::PRESENT
    );
    assert_eq!(count(&h.log, |e| matches!(e, Event::Barriers(_))), 1);
}

#[test]
fn test_slots_cycle_round_robin() {
    let mut h = Harness::new(3);
    for _ in 0..7 {
        h.frame().unwrap();
    }
    assert_eq!(h.pass.slots_seen, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_minimized_window_drops_frames_then_recovers_once() {
    let mut h = Harness::new(2);
    h.frame().unwrap();
    h.clear_log();

    h.area.set((0, 0));
    for _ in 0..5 {
        assert_eq!(h.frame().unwrap(), FrameOutcome::Dropped);
    }
    // No area: nothing recorded and no rebuild attempted
    assert_eq!(count(&h.log, |e| matches!(e, Event::Begin(_))), 0);
    assert_eq!(count(&h.log, |e| *e == Event::Recreate), 0);

    h.area.set((1280, 720));
    assert_eq!(h.frame().unwrap(), FrameOutcome::Dropped);
    assert_eq!(h.frame().unwrap(), FrameOutcome::Presented);
    assert_eq!(h.frame().unwrap(), FrameOutcome::Presented);

    assert_eq!(count(&h.log, |e| *e == Event::Recreate), 1);
    let stats = h.orchestrator.stats();
    assert_eq!(stats.dropped, 6);
    assert_eq!(stats.surface_rebuilds, 1);
}

#[test]
fn test_dropped_frame_records_nothing() {
    let mut h = Harness::new(2);
    h.frame().unwrap();
    let tracker_before: Vec<_> = h
        .orchestrator
        .surface()
        .images()
        .into_iter()
        .map(|image| h.orchestrator.tracker().state_of(image))
        .collect();
    h.clear_log();

    h.area.set((0, 0));
    assert_eq!(h.frame().unwrap(), FrameOutcome::Dropped);

    assert_eq!(
        *h.log.borrow(),
        vec![Event::Wait(1), Event::Acquire(image_available(1))]
    );
    let tracker_after: Vec<_> = h
        .orchestrator
        .surface()
        .images()
        .into_iter()
        .map(|image| h.orchestrator.tracker().state_of(image))
        .collect();
    assert_eq!(tracker_before, tracker_after);
}

#[test]
fn test_dropped_frames_still_advance_slots() {
    let mut h = Harness::new(3);
    h.frame().unwrap();

    h.area.set((0, 0));
    h.frame().unwrap();
    h.area.set((1280, 720));
    h.frame().unwrap(); // dropped, triggers the rebuild
    h.frame().unwrap();

    assert_eq!(h.pass.slots_seen, vec![0, 0]);
    assert_eq!(count(&h.log, |e| matches!(e, Event::Begin(0))), 2);
}

#[test]
fn test_failed_present_rebuilds_surface() {
    let mut h = Harness::new(2);
    h.frame().unwrap();

    h.orchestrator_surface_fails_next_present();
    assert_eq!(h.frame().unwrap(), FrameOutcome::PresentFailed);
    assert_eq!(count(&h.log, |e| *e == Event::Recreate), 1);

    assert_eq!(h.frame().unwrap(), FrameOutcome::Presented);
    let stats = h.orchestrator.stats();
    assert_eq!(stats.present_failed, 1);
    assert_eq!(stats.surface_rebuilds, 1);
}

#[test]
fn test_rebuild_forgets_old_images() {
    let mut h = Harness::new(2);
    h.frame().unwrap();
    let old = vk::Image::from_raw(100);
    assert_eq!(h.orchestrator.tracker().state_of(old), ResourceState::PRESENT);

    h.orchestrator_surface_fails_next_present();
    h.frame().unwrap();

    assert_eq!(
        h.orchestrator.tracker().state_of(old),
        ResourceState::UNDEFINED
    );
}

#[test]
fn test_rebuild_at_other_resolution_is_fatal() {
    let mut h = Harness::new(2);
    h.frame().unwrap();

    h.orchestrator_surface_grants(vk::Extent2D {
        width: 800,
        height: 600,
    });
    h.orchestrator_surface_fails_next_present();

    match h.frame() {
        Err(RenderError::ResolutionMismatch { expected, actual }) => {
            assert_eq!((expected.width, expected.height), (1280, 720));
            assert_eq!((actual.width, actual.height), (800, 600));
        }
        other => panic!("expected a resolution mismatch, got {:?}", other),
    }
}

#[test]
fn test_fence_wait_precedes_every_acquire() {
    let mut h = Harness::new(3);
    h.frame().unwrap();
    h.area.set((0, 0));
    h.frame().unwrap();
    h.area.set((1280, 720));
    for _ in 0..4 {
        h.frame().unwrap();
    }

    let log = h.log.borrow();
    let acquires: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Acquire(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(acquires.len(), 6);
    for i in acquires {
        match (&log[i - 1], &log[i]) {
            (Event::Wait(slot), Event::Acquire(signal)) => {
                assert_eq!(*signal, image_available(*slot));
            }
            other => panic!("acquire not preceded by its slot's wait: {:?}", other),
        }
    }
}

#[test]
fn test_acquire_semaphore_never_reused_while_pending() {
    // More slots than images (4 > 3) as well as fewer and equal
    for frames_in_flight in [2, 3, 4] {
        let mut h = Harness::new(frames_in_flight);
        for frame in 0..12 {
            if frame == 5 {
                h.orchestrator_surface_fails_next_present();
            }
            if frame == 8 {
                h.area.set((0, 0));
            }
            if frame == 9 {
                h.area.set((1280, 720));
            }
            h.frame().unwrap();
        }

        // Replays the log: a submission stays pending on its wait semaphore
        // until its slot's fence is waited on again
        let mut pending: Vec<(usize, vk::Semaphore)> = Vec::new();
        for event in h.log.borrow().iter() {
            match event {
                Event::Submit { slot, wait, .. } => pending.push((*slot, *wait)),
                Event::Wait(slot) => pending.retain(|(s, _)| s != slot),
                Event::Acquire(signal) => assert!(
                    pending.iter().all(|(_, wait)| wait != signal),
                    "{} slot(s): semaphore {:?} acquired while a submission waits on it",
                    frames_in_flight,
                    signal
                ),
                _ => {}
            }
        }
    }
}

#[test]
fn test_failing_pass_aborts_frame_before_submit() {
    let mut h = Harness::new(2);
    let mut failing = FailingPass;
    let mut passes: [&mut dyn RenderPass; 2] = [&mut h.pass, &mut failing];

    match h.orchestrator.run_frame(&h.window, &mut passes) {
        Err(RenderError::UnknownProgram(name)) => assert_eq!(name, "missing"),
        other => panic!("expected the pass error, got {:?}", other),
    }
    assert_eq!(h.pass.slots_seen, vec![0]);
    assert_eq!(count(&h.log, |e| matches!(e, Event::Submit { .. })), 0);
    assert_eq!(count(&h.log, |e| matches!(e, Event::Present { .. })), 0);
}

#[test]
fn test_shutdown_waits_then_tears_down() {
    let mut h = Harness::new(2);
    h.frame().unwrap();
    h.clear_log();

    h.orchestrator.shutdown().unwrap();

    assert_eq!(*h.log.borrow(), vec![Event::WaitIdle, Event::Teardown]);
    assert_eq!(
        h.orchestrator.surface().state(),
        SurfaceState::Unconfigured
    );
}

#[test]
fn test_established_resolution_comes_from_surface() {
    let h = Harness::new(4);
    assert_eq!(h.orchestrator.frames_in_flight(), 4);
    let resolution = h.orchestrator.established_resolution();
    assert_eq!((resolution.width, resolution.height), (1280, 720));
}

impl Harness {
    fn orchestrator_surface_fails_next_present(&mut self) {
        self.orchestrator.surface_mut().fail_next_present = true;
    }

    fn orchestrator_surface_grants(&mut self, extent: vk::Extent2D) {
        self.orchestrator.surface_mut().grant_override = Some(extent);
    }
}
