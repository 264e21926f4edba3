//! Renderer error type.

use ash::vk;
use thiserror::Error;

use shadertoy_resources::ResourceError;
use shadertoy_rhi::RhiError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Platform(#[from] shadertoy_core::Error),

    /// The rebuilt surface does not match the resolution established at
    /// startup. Mid-session resolution changes are unsupported.
    #[error(
        "Surface rebuilt at {}x{}, expected {}x{}",
        actual.width, actual.height, expected.width, expected.height
    )]
    ResolutionMismatch {
        expected: vk::Extent2D,
        actual: vk::Extent2D,
    },

    /// Barriers were queued but never flushed into the command buffer.
    #[error("{count} barrier(s) still pending at end of recording")]
    PendingBarriers { count: usize },

    #[error("Unknown program '{0}'")]
    UnknownProgram(String),

    /// The surface was used before `recreate` configured it, or after teardown.
    #[error("Surface is not configured")]
    SurfaceUnconfigured,
}

impl RenderError {
    /// Whether the session must end.
    ///
    /// Out-of-date and suboptimal surfaces are reported as `None`/`false`
    /// by the surface manager and only reach this type if a lower layer
    /// leaks them.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RenderError::Rhi(RhiError::VulkanError(
                vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR
            ))
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
