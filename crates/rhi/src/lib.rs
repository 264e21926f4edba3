//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! A thin, owning wrapper over `ash`:
//! - Instance, GPU selection and logical device creation
//! - Swapchain creation, acquisition and presentation
//! - Command pools and buffers (synchronization2, dynamic rendering)
//! - Buffers and images backed by gpu-allocator
//! - Shaders, pipelines and descriptors

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
