//! Platform abstraction layer for the shadertoy renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation and required instance extensions
//! - Polled keyboard and pointer input

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{Surface, Window};
