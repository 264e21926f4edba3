//! Presentation surface management.
//!
//! [`PresentSurface`] is what the frame loop sees: hand out the next
//! presentable image, present it, rebuild on demand. [`SwapchainSurface`]
//! implements it over a Vulkan swapchain.
//!
//! ```text
//!   new ──> Ready ──(zero extent / out of date / failed present)──> Stale
//!             ^                                                      │
//!             └───────────────────── recreate ───────────────────────┘
//!   teardown (from any state) ──> Unconfigured (terminal)
//! ```
//!
//! Out-of-date and suboptimal results are not errors here. They show up as
//! `None` from [`PresentSurface::acquire_next`] and `false` from
//! [`PresentSurface::present`].

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use shadertoy_platform::Surface;
use shadertoy_rhi::RhiError;
use shadertoy_rhi::device::Device;
use shadertoy_rhi::instance::Instance;
use shadertoy_rhi::swapchain::Swapchain;
use shadertoy_rhi::sync::Semaphore;

use crate::error::{RenderError, RenderResult};

/// Resolution, vsync and image count of a surface. Always replaced as a
/// whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub resolution: vk::Extent2D,
    pub vsync: bool,
    /// Requested minimum image count when asking for a configuration, 0 for
    /// the surface default. The granted configuration holds the real count.
    pub image_count: u32,
}

impl SurfaceConfig {
    pub fn new(width: u32, height: u32, vsync: bool) -> Self {
        Self {
            resolution: vk::Extent2D { width, height },
            vsync,
            image_count: 0,
        }
    }

    #[inline]
    pub fn has_area(&self) -> bool {
        self.resolution.width > 0 && self.resolution.height > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// Torn down. Nothing can be acquired or rebuilt.
    Unconfigured,
    /// Images can be acquired.
    Ready,
    /// Must be rebuilt before the next image is acquired.
    Stale,
}

/// A swapchain image handed out for one frame.
///
/// The image belongs to the presentation engine and is never destroyed by
/// the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentableImage {
    pub index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
    /// The semaphore passed to [`PresentSurface::acquire_next`]. Signaled
    /// once the presentation engine releases the image.
    pub available: vk::Semaphore,
    /// Signaled by the frame's submission; presentation waits on it.
    pub rendering_done: vk::Semaphore,
}

/// The swapchain seen by the frame loop.
pub trait PresentSurface {
    /// Next image to render into, or `None` while the surface is unusable.
    /// `available` is signaled when the image can be written. The caller
    /// must know that no pending submission still waits on it.
    fn acquire_next(
        &mut self,
        available: vk::Semaphore,
    ) -> RenderResult<Option<PresentableImage>>;

    /// Queues `image` for display after `wait` signals. `false` means the
    /// surface has to be rebuilt before the next acquisition.
    fn present(&mut self, wait: vk::Semaphore, image: &PresentableImage) -> RenderResult<bool>;

    /// Tears down and rebuilds the swapchain and returns the granted
    /// resolution. A zero extent means the surface still has no area and
    /// stays stale.
    fn recreate(&mut self, desired: SurfaceConfig) -> RenderResult<vk::Extent2D>;

    fn state(&self) -> SurfaceState;

    /// The configuration granted by the last (re)build.
    fn config(&self) -> SurfaceConfig;

    fn format(&self) -> vk::Format;

    /// Handles of the current swapchain images.
    fn images(&self) -> Vec<vk::Image>;

    /// Releases the swapchain. The surface cannot be used afterwards.
    fn teardown(&mut self);
}

/// Swapchain plus the semaphores tied to its images.
struct LiveSwapchain {
    swapchain: Swapchain,
    // Indexed by image, so a semaphore is only reused once its image is
    // acquired again
    rendering_done: Vec<Semaphore>,
}

impl LiveSwapchain {
    fn new(device: &Arc<Device>, swapchain: Swapchain) -> RenderResult<Self> {
        let count = swapchain.image_count() as usize;
        Ok(Self {
            swapchain,
            rendering_done: Semaphore::many(device, count)?,
        })
    }

    fn granted(&self, vsync: bool) -> SurfaceConfig {
        SurfaceConfig {
            resolution: self.swapchain.extent(),
            vsync,
            image_count: self.swapchain.image_count(),
        }
    }
}

/// [`PresentSurface`] over a `VkSwapchainKHR`.
pub struct SwapchainSurface {
    device: Arc<Device>,
    // Declared before `surface` so the swapchain is destroyed first
    live: Option<LiveSwapchain>,
    surface: Surface,
    config: SurfaceConfig,
    state: SurfaceState,
}

impl SwapchainSurface {
    /// Configures the swapchain for `desired` and takes ownership of the
    /// window surface.
    ///
    /// # Errors
    ///
    /// Fails if the swapchain or its semaphores cannot be created.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: Surface,
        desired: SurfaceConfig,
    ) -> RenderResult<Self> {
        let swapchain = Swapchain::new(
            instance,
            device.clone(),
            surface.handle(),
            desired.resolution,
            desired.vsync,
            desired.image_count,
        )?;
        let live = LiveSwapchain::new(&device, swapchain)?;
        let config = live.granted(desired.vsync);

        info!(
            "Surface configured: {}x{}, {:?}, {} images",
            config.resolution.width,
            config.resolution.height,
            live.swapchain.present_mode(),
            config.image_count
        );

        Ok(Self {
            device,
            live: Some(live),
            surface,
            config,
            state: SurfaceState::Ready,
        })
    }

    fn current_surface_extent(&self) -> RenderResult<vk::Extent2D> {
        let capabilities = unsafe {
            self.surface
                .loader()
                .get_physical_device_surface_capabilities(
                    self.device.physical_device(),
                    self.surface.handle(),
                )
                .map_err(RhiError::from)?
        };
        Ok(capabilities.current_extent)
    }

    fn mark_stale(&mut self, reason: &str) {
        if self.state == SurfaceState::Ready {
            debug!("Surface stale: {}", reason);
            self.state = SurfaceState::Stale;
        }
    }
}

impl PresentSurface for SwapchainSurface {
    fn acquire_next(
        &mut self,
        available: vk::Semaphore,
    ) -> RenderResult<Option<PresentableImage>> {
        match self.state {
            SurfaceState::Unconfigured => return Err(RenderError::SurfaceUnconfigured),
            SurfaceState::Stale => return Ok(None),
            SurfaceState::Ready => {}
        }

        let extent = self.current_surface_extent()?;
        if extent.width == 0 || extent.height == 0 {
            self.mark_stale("zero-area surface");
            return Ok(None);
        }

        let Some(live) = self.live.as_ref() else {
            return Err(RenderError::SurfaceUnconfigured);
        };

        match live.swapchain.acquire_next_image(available) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    debug!("Acquired image {} from a suboptimal swapchain", index);
                }
                let i = index as usize;
                Ok(Some(PresentableImage {
                    index,
                    image: live.swapchain.image(i),
                    view: live.swapchain.image_view(i),
                    available,
                    rendering_done: live.rendering_done[i].handle(),
                }))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.mark_stale("out of date on acquire");
                Ok(None)
            }
            Err(e) => Err(RhiError::from(e).into()),
        }
    }

    fn present(&mut self, wait: vk::Semaphore, image: &PresentableImage) -> RenderResult<bool> {
        let Some(live) = self.live.as_ref() else {
            return Err(RenderError::SurfaceUnconfigured);
        };

        match live
            .swapchain
            .present(self.device.present_queue(), image.index, wait)
        {
            Ok(false) => Ok(true),
            Ok(true) => {
                self.mark_stale("suboptimal on present");
                Ok(false)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.mark_stale("out of date on present");
                Ok(false)
            }
            Err(e) => Err(RhiError::from(e).into()),
        }
    }

    fn recreate(&mut self, desired: SurfaceConfig) -> RenderResult<vk::Extent2D> {
        if self.state == SurfaceState::Unconfigured {
            return Err(RenderError::SurfaceUnconfigured);
        }

        let extent = self.current_surface_extent()?;
        if extent.width == 0 || extent.height == 0 {
            debug!("Surface has no area, rebuild deferred");
            self.state = SurfaceState::Stale;
            return Ok(vk::Extent2D::default());
        }

        let Some(live) = self.live.as_mut() else {
            return Err(RenderError::SurfaceUnconfigured);
        };

        // Waits for the device to go idle, so the old semaphores are unused
        live.swapchain.recreate(
            self.surface.handle(),
            desired.resolution,
            desired.vsync,
            desired.image_count,
        )?;

        let count = live.swapchain.image_count() as usize;
        live.rendering_done = Semaphore::many(&self.device, count)?;

        self.config = live.granted(desired.vsync);
        self.state = SurfaceState::Ready;

        if self.config.resolution != desired.resolution {
            warn!(
                "Surface granted {}x{} for a {}x{} request",
                self.config.resolution.width,
                self.config.resolution.height,
                desired.resolution.width,
                desired.resolution.height
            );
        }
        info!(
            "Surface rebuilt: {}x{}, {} images",
            self.config.resolution.width, self.config.resolution.height, self.config.image_count
        );

        Ok(self.config.resolution)
    }

    fn state(&self) -> SurfaceState {
        self.state
    }

    fn config(&self) -> SurfaceConfig {
        self.config
    }

    fn format(&self) -> vk::Format {
        self.live
            .as_ref()
            .map_or(vk::Format::UNDEFINED, |live| live.swapchain.format())
    }

    fn images(&self) -> Vec<vk::Image> {
        self.live
            .as_ref()
            .map(|live| live.swapchain.images().to_vec())
            .unwrap_or_default()
    }

    fn teardown(&mut self) {
        if self.live.take().is_some() {
            info!("Surface torn down");
        }
        self.state = SurfaceState::Unconfigured;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_config_area() {
        assert!(SurfaceConfig::new(1280, 720, true).has_area());
        assert!(!SurfaceConfig::new(0, 720, true).has_area());
        assert!(!SurfaceConfig::new(1280, 0, false).has_area());
    }

    #[test]
    fn test_surface_config_defaults_image_count() {
        let config = SurfaceConfig::new(1280, 720, false);
        assert_eq!(config.image_count, 0);
        assert!(!config.vsync);
    }
}
