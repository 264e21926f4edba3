//! Procedural texture pass.
//!
//! Renders a small texture from the frame parameters each frame. The toy
//! pass samples it afterwards.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use shadertoy_rhi::command::CommandBuffer;
use shadertoy_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info,
    update_descriptor_sets,
};
use shadertoy_rhi::device::Device;
use shadertoy_rhi::image::{Image, ImageDesc};

use super::FullscreenDraw;
use crate::error::{RenderError, RenderResult};
use crate::orchestrator::{PassContext, RenderPass};
use crate::programs::ProgramLibrary;
use crate::state_tracker::ResourceState;
use crate::uniforms::{FrameUniforms, UniformParams};

pub const GENERATED_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 256,
    height: 256,
};
pub const GENERATED_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

pub struct GeneratorPass {
    device: Arc<Device>,
    draw: FullscreenDraw,
    texture: Image,
    // One per frame slot, each pointing at that slot's uniform buffer
    sets: Vec<vk::DescriptorSet>,
    _pool: DescriptorPool,
    _set_layout: DescriptorSetLayout,
}

impl GeneratorPass {
    pub fn new(
        device: Arc<Device>,
        programs: &mut ProgramLibrary,
        uniforms: &FrameUniforms,
    ) -> RenderResult<Self> {
        let bindings = Self::bindings();
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let program = programs.create_graphics(
            "generator",
            "rect",
            "gen",
            GENERATED_FORMAT,
            set_layout.handle(),
        )?;
        let draw = FullscreenDraw::new(program);

        let texture = Image::new(
            device.clone(),
            &ImageDesc {
                name: "generated",
                extent: GENERATED_EXTENT,
                format: GENERATED_FORMAT,
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            },
        )?;

        let set_count = uniforms.len() as u32;
        let pool = DescriptorPool::for_bindings(device.clone(), &bindings, set_count)?;
        let layouts = vec![set_layout.handle(); uniforms.len()];
        let sets = pool.allocate(&layouts)?;

        for (slot, &set) in sets.iter().enumerate() {
            let params = [buffer_info(
                uniforms.buffer(slot),
                0,
                UniformParams::SIZE as vk::DeviceSize,
            )];
            let writes = [vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&params)];
            update_descriptor_sets(&device, &writes);
        }

        info!(
            "Generator pass ready: {}x{} {:?}, {} descriptor set(s)",
            GENERATED_EXTENT.width,
            GENERATED_EXTENT.height,
            GENERATED_FORMAT,
            sets.len()
        );

        Ok(Self {
            device,
            draw,
            texture,
            sets,
            _pool: pool,
            _set_layout: set_layout,
        })
    }

    fn bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 1] {
        [DescriptorBindingBuilder::uniform_buffer(
            0,
            vk::ShaderStageFlags::FRAGMENT,
        )]
    }

    /// The generated texture, sampled by the toy pass.
    #[inline]
    pub fn texture(&self) -> &Image {
        &self.texture
    }
}

impl RenderPass for GeneratorPass {
    fn name(&self) -> &str {
        "generator"
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let set = *self.sets.get(ctx.slot).ok_or_else(|| {
            RenderError::Rhi(shadertoy_rhi::RhiError::InvalidHandle(format!(
                "No generator descriptor set for frame slot {}",
                ctx.slot
            )))
        })?;
        let image = self.texture.handle();

        ctx.tracker.transition_to(
            image,
            ResourceState::COLOR_ATTACHMENT_WRITE,
            vk::ImageAspectFlags::COLOR,
        );
        ctx.flush();

        let cmd = CommandBuffer::from_handle(self.device.clone(), ctx.cmd);
        self.draw
            .record(&cmd, self.texture.view(), GENERATED_EXTENT, set);

        // Flushed by whichever pass samples it next
        ctx.tracker.transition_to(
            image,
            ResourceState::FRAGMENT_SHADER_READ,
            vk::ImageAspectFlags::COLOR,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_texture_is_small_and_square() {
        assert_eq!(GENERATED_EXTENT.width, 256);
        assert_eq!(GENERATED_EXTENT.height, 256);
    }

    #[test]
    fn test_bindings_expose_params_to_fragment_stage() {
        let bindings = GeneratorPass::bindings();
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(
            bindings[0].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }
}
