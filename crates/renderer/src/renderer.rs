//! Vulkan wiring of the frame loop.
//!
//! [`ShadertoyRenderer`] creates every GPU object a session needs and hands
//! the per-frame work to a [`FrameOrchestrator`].
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle and release the swapchain
//! 2. Frame slots, command pool and surface
//! 3. Passes, uniform buffers, programs and the sampler
//! 4. Device
//! 5. Instance
//!
//! ManuallyDrop is used to enforce this order.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::{error, info};

use shadertoy_core::{AppConfig, Timer};
use shadertoy_platform::{InputState, Window};
use shadertoy_rhi::command::CommandPool;
use shadertoy_rhi::device::Device;
use shadertoy_rhi::instance::Instance;
use shadertoy_rhi::physical_device::select_physical_device;
use shadertoy_rhi::sampler::Sampler;

use crate::error::RenderResult;
use crate::frame_context::VulkanFrameContext;
use crate::orchestrator::{FrameOrchestrator, FrameOutcome, FrameStats, RenderPass};
use crate::passes::{GeneratorPass, ToyInputs, ToyPass};
use crate::programs::ProgramLibrary;
use crate::surface::{PresentSurface, SurfaceConfig, SwapchainSurface};
use crate::textures::upload_texture;
use crate::uniforms::{FrameUniforms, UniformParams};

type VulkanOrchestrator = FrameOrchestrator<VulkanFrameContext, SwapchainSurface>;

/// Renders the shadertoy scene into a window.
pub struct ShadertoyRenderer {
    orchestrator: ManuallyDrop<VulkanOrchestrator>,
    toy: ManuallyDrop<ToyPass>,
    generator: ManuallyDrop<GeneratorPass>,
    uniforms: ManuallyDrop<FrameUniforms>,
    programs: ManuallyDrop<ProgramLibrary>,
    sampler: ManuallyDrop<Sampler>,
    device: ManuallyDrop<Arc<Device>>,
    instance: ManuallyDrop<Instance>,
    timer: Timer,
    shut_down: bool,
}

impl ShadertoyRenderer {
    /// Brings up Vulkan for `window` and builds both passes.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: missing GPU, missing shader or texture,
    /// swapchain creation.
    pub fn new(window: &Window, config: &AppConfig) -> RenderResult<Self> {
        info!(
            "Initializing renderer ({}x{}, vsync {}, {} frame(s) in flight)",
            config.width(),
            config.height(),
            config.vsync,
            config.frames_in_flight
        );

        let extensions = window.required_extensions()?;
        let instance = Instance::new(&config.title, &extensions, config.validation)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            config.physical_device_index,
        )?;
        let device = Device::new(&instance, &physical_device)?;

        let desired = SurfaceConfig::new(config.width(), config.height(), config.vsync);
        let surface = SwapchainSurface::new(&instance, device.clone(), surface, desired)?;
        let target_format = surface.format();

        let context = VulkanFrameContext::new(device.clone())?;
        let slots = context.create_slots(config.frames_in_flight)?;
        let mut orchestrator = FrameOrchestrator::new(context, slots, surface)
            .with_simulated_cpu_work(config.simulated_cpu_work());

        let upload_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let torus = upload_texture(
            &device,
            &upload_pool,
            orchestrator.tracker_mut(),
            &config.textures.torus,
            "torus",
        )?;
        let skybox = upload_texture(
            &device,
            &upload_pool,
            orchestrator.tracker_mut(),
            &config.textures.skybox,
            "skybox",
        )?;
        drop(upload_pool);

        let sampler = Sampler::new_linear_repeat(device.clone())?;
        let uniforms = FrameUniforms::new(device.clone(), config.frames_in_flight)?;
        let mut programs = ProgramLibrary::new(device.clone(), &config.shader_dir);

        let generator = GeneratorPass::new(device.clone(), &mut programs, &uniforms)?;
        let toy = ToyPass::new(
            device.clone(),
            &mut programs,
            &uniforms,
            ToyInputs {
                generated: generator.texture(),
                torus,
                skybox,
            },
            sampler.handle(),
            target_format,
        )?;

        info!("Renderer initialized");

        Ok(Self {
            orchestrator: ManuallyDrop::new(orchestrator),
            toy: ManuallyDrop::new(toy),
            generator: ManuallyDrop::new(generator),
            uniforms: ManuallyDrop::new(uniforms),
            programs: ManuallyDrop::new(programs),
            sampler: ManuallyDrop::new(sampler),
            device: ManuallyDrop::new(device),
            instance: ManuallyDrop::new(instance),
            timer: Timer::new(),
            shut_down: false,
        })
    }

    /// Renders one frame with the current time and pointer position.
    ///
    /// # Errors
    ///
    /// Only fatal conditions are returned. Dropped frames and failed
    /// presents are reported through the outcome.
    pub fn render_frame(
        &mut self,
        window: &Window,
        input: &InputState,
    ) -> RenderResult<FrameOutcome> {
        let params = UniformParams::new(
            self.orchestrator.established_resolution(),
            self.timer.elapsed_secs(),
            input.pointer_position(),
        );
        self.uniforms.set(params);

        let mut passes: [&mut dyn RenderPass; 3] = [
            &mut *self.uniforms,
            &mut *self.generator,
            &mut *self.toy,
        ];
        self.orchestrator.run_frame(window, &mut passes)
    }

    /// Waits for the GPU and releases the swapchain. Called once; later
    /// calls do nothing.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.orchestrator.shutdown()
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.orchestrator.stats()
    }
}

impl Drop for ShadertoyRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down renderer cleanly: {}", e);
        }

        unsafe {
            ManuallyDrop::drop(&mut self.orchestrator);
            ManuallyDrop::drop(&mut self.toy);
            ManuallyDrop::drop(&mut self.generator);
            ManuallyDrop::drop(&mut self.uniforms);
            ManuallyDrop::drop(&mut self.programs);
            ManuallyDrop::drop(&mut self.sampler);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
