//! Core utilities for the shadertoy renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Application configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, TextureConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
