//! Per-frame shader parameters.
//!
//! [`UniformParams`] must match the `Params` cbuffer in the HLSL shaders.
//! Scalars only, so HLSL packing and std140 agree on every offset.

use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use shadertoy_rhi::buffer::{Buffer, BufferUsage};
use shadertoy_rhi::device::Device;

use crate::error::{RenderError, RenderResult};
use crate::orchestrator::{PassContext, RenderPass};

/// Shader parameters, bound at `b0` by both passes.
///
/// # Memory Layout
///
/// - Offset 0: resolution x, y (8 bytes)
/// - Offset 8: time in seconds (4 bytes)
/// - Offset 12: pointer x, y (8 bytes)
/// - Offset 20: padding (12 bytes)
/// - Total size: 32 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformParams {
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub time: f32,
    pub mouse_x: u32,
    pub mouse_y: u32,
    pub _padding: [u32; 3],
}

impl UniformParams {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the parameters for one frame. The pointer is clamped to the
    /// surface, so it never goes negative or past the edge.
    pub fn new(resolution: vk::Extent2D, time: f32, pointer: Vec2) -> Self {
        let max = Vec2::new(
            resolution.width.saturating_sub(1) as f32,
            resolution.height.saturating_sub(1) as f32,
        );
        let pointer = pointer.clamp(Vec2::ZERO, max);

        Self {
            resolution_x: resolution.width,
            resolution_y: resolution.height,
            time,
            mouse_x: pointer.x as u32,
            mouse_y: pointer.y as u32,
            _padding: [0; 3],
        }
    }
}

/// One uniform buffer per frame slot.
///
/// Runs as the first pass of a frame: by then the slot's fence has been
/// waited on, so its buffer is no longer read by the GPU.
pub struct FrameUniforms {
    buffers: Vec<Buffer>,
    params: UniformParams,
}

impl FrameUniforms {
    pub fn new(device: Arc<Device>, frames_in_flight: usize) -> RenderResult<Self> {
        let buffers = (0..frames_in_flight)
            .map(|_| {
                Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    UniformParams::SIZE as vk::DeviceSize,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            buffers,
            params: UniformParams::default(),
        })
    }

    /// Parameters written by the next recorded frame.
    pub fn set(&mut self, params: UniformParams) {
        self.params = params;
    }

    /// Buffer read by frames recorded into `slot`.
    pub fn buffer(&self, slot: usize) -> vk::Buffer {
        self.buffers[slot].handle()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl RenderPass for FrameUniforms {
    fn name(&self) -> &str {
        "uniforms"
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let buffer = self.buffers.get(ctx.slot).ok_or_else(|| {
            RenderError::Rhi(shadertoy_rhi::RhiError::InvalidHandle(format!(
                "No uniform buffer for frame slot {}",
                ctx.slot
            )))
        })?;
        buffer.write(bytemuck::bytes_of(&self.params))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_uniform_params_size() {
        assert_eq!(UniformParams::SIZE, 32);
        assert_eq!(std::mem::align_of::<UniformParams>(), 4);
    }

    #[test]
    fn test_uniform_params_offsets() {
        let params = UniformParams::new(extent(1280, 720), 2.5, Vec2::new(10.0, 20.0));
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&params));
        assert_eq!(words[0], 1280);
        assert_eq!(words[1], 720);
        assert_eq!(f32::from_bits(words[2]), 2.5);
        assert_eq!(words[3], 10);
        assert_eq!(words[4], 20);
    }

    #[test]
    fn test_pointer_is_clamped_to_surface() {
        let params = UniformParams::new(extent(1280, 720), 0.0, Vec2::new(-30.0, 9000.0));
        assert_eq!(params.mouse_x, 0);
        assert_eq!(params.mouse_y, 719);
    }

    #[test]
    fn test_zero_extent_does_not_underflow() {
        let params = UniformParams::new(extent(0, 0), 1.0, Vec2::new(5.0, 5.0));
        assert_eq!((params.mouse_x, params.mouse_y), (0, 0));
    }
}
