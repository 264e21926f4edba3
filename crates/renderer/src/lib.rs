//! Frames-in-flight rendering for the shadertoy.
//!
//! The frame loop is split into four parts:
//! - [`cyclic`]: the ring of per-frame resources
//! - [`state_tracker`]: image layouts and the barriers between them
//! - [`surface`]: the swapchain and its recovery from resizes and minimization
//! - [`orchestrator`]: one frame from acquisition to presentation
//!
//! The orchestrator only sees the [`FrameContext`] and [`PresentSurface`]
//! traits. [`ShadertoyRenderer`] wires it to Vulkan and the two render passes.

pub mod cyclic;
mod error;
pub mod frame_context;
pub mod orchestrator;
pub mod passes;
pub mod programs;
mod renderer;
pub mod state_tracker;
pub mod surface;
pub mod textures;
pub mod uniforms;

pub use cyclic::CyclicQueue;
pub use error::{RenderError, RenderResult};
pub use frame_context::{FrameContext, FrameSlot, VulkanFrameContext};
pub use orchestrator::{
    FrameOrchestrator, FrameOutcome, FrameStats, PassContext, RenderPass, WindowState,
};
pub use renderer::ShadertoyRenderer;
pub use state_tracker::{BarrierSink, ResourceState, ResourceStateTracker};
pub use surface::{PresentSurface, PresentableImage, SurfaceConfig, SurfaceState};
