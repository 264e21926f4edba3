//! Texture upload.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use shadertoy_resources::load_rgba8;
use shadertoy_rhi::buffer::{Buffer, BufferUsage};
use shadertoy_rhi::command::{CommandPool, submit_one_shot};
use shadertoy_rhi::device::Device;
use shadertoy_rhi::image::{Image, ImageDesc};

use crate::error::RenderResult;
use crate::frame_context::VulkanBarrierSink;
use crate::state_tracker::{ResourceState, ResourceStateTracker};

/// Format of uploaded textures. Texels are sampled as stored, with no sRGB
/// decode, since some inputs (metallic-roughness maps) hold linear data.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Decodes `path` and uploads it into a new sampled image, leaving it in
/// [`ResourceState::FRAGMENT_SHADER_READ`].
///
/// Blocks until the copy completes.
///
/// # Errors
///
/// Decode failures are returned as-is; there is no fallback texture.
pub fn upload_texture(
    device: &Arc<Device>,
    pool: &CommandPool,
    tracker: &mut ResourceStateTracker,
    path: &Path,
    name: &str,
) -> RenderResult<Image> {
    let data = load_rgba8(path)?;
    let extent = vk::Extent2D {
        width: data.width,
        height: data.height,
    };

    let image = Image::new(
        device.clone(),
        &ImageDesc {
            name,
            extent,
            format: TEXTURE_FORMAT,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        },
    )?;
    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, &data.pixels)?;

    let mut sink = VulkanBarrierSink::new(device.clone());
    submit_one_shot(device, pool, |cmd| {
        tracker.transition_to(
            image.handle(),
            ResourceState::TRANSFER_DST,
            vk::ImageAspectFlags::COLOR,
        );
        tracker.flush(&mut sink, cmd.handle());

        cmd.copy_buffer_to_image(staging.handle(), image.handle(), extent);

        tracker.transition_to(
            image.handle(),
            ResourceState::FRAGMENT_SHADER_READ,
            vk::ImageAspectFlags::COLOR,
        );
        tracker.flush(&mut sink, cmd.handle());
        Ok(())
    })?;

    info!(
        "Uploaded texture '{}' ({}x{}, {} bytes)",
        name,
        extent.width,
        extent.height,
        data.byte_len()
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_format_is_not_srgb_decoded() {
        assert_eq!(TEXTURE_FORMAT, vk::Format::R8G8B8A8_UNORM);
        assert_ne!(TEXTURE_FORMAT, vk::Format::R8G8B8A8_SRGB);
    }
}
