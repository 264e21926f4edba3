//! Asset loading for the shadertoy renderer.
//!
//! Only textures are loaded from disk; everything else the frame needs is
//! generated on the GPU.

mod error;
mod texture;

pub use error::{ResourceError, ResourceResult};
pub use texture::{TextureData, load_rgba8};
