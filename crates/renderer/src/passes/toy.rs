//! The full-resolution shadertoy pass.
//!
//! Draws straight into the presentable image, sampling the generated
//! texture and the two loaded textures.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use shadertoy_rhi::command::CommandBuffer;
use shadertoy_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info, image_info,
    update_descriptor_sets,
};
use shadertoy_rhi::device::Device;
use shadertoy_rhi::image::Image;

use super::FullscreenDraw;
use crate::error::{RenderError, RenderResult};
use crate::orchestrator::{PassContext, RenderPass};
use crate::programs::ProgramLibrary;
use crate::state_tracker::ResourceState;
use crate::uniforms::{FrameUniforms, UniformParams};

/// Binding slots of the sampled inputs, in the order of `ToyInputs`.
const INPUT_BINDINGS: [u32; 3] = [1, 2, 3];

/// Images the toy pass samples.
pub struct ToyInputs<'a> {
    pub generated: &'a Image,
    pub torus: Image,
    pub skybox: Image,
}

pub struct ToyPass {
    device: Arc<Device>,
    draw: FullscreenDraw,
    // Read every frame, so transitioned before drawing
    inputs: [vk::Image; 3],
    sets: Vec<vk::DescriptorSet>,
    _torus: Image,
    _skybox: Image,
    _pool: DescriptorPool,
    _set_layout: DescriptorSetLayout,
}

impl ToyPass {
    /// Builds the pass for targets of `target_format`. The loaded textures
    /// are owned by the pass from here on.
    pub fn new(
        device: Arc<Device>,
        programs: &mut ProgramLibrary,
        uniforms: &FrameUniforms,
        inputs: ToyInputs<'_>,
        sampler: vk::Sampler,
        target_format: vk::Format,
    ) -> RenderResult<Self> {
        let bindings = Self::bindings();
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let program = programs.create_graphics(
            "toy",
            "rect",
            "toy",
            target_format,
            set_layout.handle(),
        )?;
        let draw = FullscreenDraw::new(program);

        let pool =
            DescriptorPool::for_bindings(device.clone(), &bindings, uniforms.len() as u32)?;
        let layouts = vec![set_layout.handle(); uniforms.len()];
        let sets = pool.allocate(&layouts)?;

        let sampled = [
            image_info(
                sampler,
                inputs.generated.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            image_info(
                sampler,
                inputs.torus.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            image_info(
                sampler,
                inputs.skybox.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
        ];

        for (slot, &set) in sets.iter().enumerate() {
            let params = [buffer_info(
                uniforms.buffer(slot),
                0,
                UniformParams::SIZE as vk::DeviceSize,
            )];

            let mut writes = vec![
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&params),
            ];
            for (binding, info) in INPUT_BINDINGS.iter().zip(sampled.iter()) {
                writes.push(
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(info)),
                );
            }
            update_descriptor_sets(&device, &writes);
        }

        info!(
            "Toy pass ready: target {:?}, inputs '{}', '{}', '{}'",
            target_format,
            inputs.generated.name(),
            inputs.torus.name(),
            inputs.skybox.name()
        );

        Ok(Self {
            device,
            draw,
            inputs: [
                inputs.generated.handle(),
                inputs.torus.handle(),
                inputs.skybox.handle(),
            ],
            sets,
            _torus: inputs.torus,
            _skybox: inputs.skybox,
            _pool: pool,
            _set_layout: set_layout,
        })
    }

    fn bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 4] {
        let fragment = vk::ShaderStageFlags::FRAGMENT;
        [
            DescriptorBindingBuilder::uniform_buffer(0, fragment),
            DescriptorBindingBuilder::combined_image_sampler(INPUT_BINDINGS[0], fragment),
            DescriptorBindingBuilder::combined_image_sampler(INPUT_BINDINGS[1], fragment),
            DescriptorBindingBuilder::combined_image_sampler(INPUT_BINDINGS[2], fragment),
        ]
    }
}

impl RenderPass for ToyPass {
    fn name(&self) -> &str {
        "toy"
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let set = *self.sets.get(ctx.slot).ok_or_else(|| {
            RenderError::Rhi(shadertoy_rhi::RhiError::InvalidHandle(format!(
                "No toy descriptor set for frame slot {}",
                ctx.slot
            )))
        })?;

        ctx.tracker.transition_to(
            ctx.target,
            ResourceState::COLOR_ATTACHMENT_WRITE,
            vk::ImageAspectFlags::COLOR,
        );
        for &input in &self.inputs {
            ctx.tracker.transition_to(
                input,
                ResourceState::FRAGMENT_SHADER_READ,
                vk::ImageAspectFlags::COLOR,
            );
        }
        ctx.flush();

        let cmd = CommandBuffer::from_handle(self.device.clone(), ctx.cmd);
        self.draw
            .record(&cmd, ctx.target_view, ctx.target_extent, set);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_layout() {
        let bindings = ToyPass::bindings();
        assert_eq!(bindings.len(), 4);
        assert_eq!(
            bindings[0].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
        for (i, binding) in bindings.iter().enumerate().skip(1) {
            assert_eq!(binding.binding, i as u32);
            assert_eq!(
                binding.descriptor_type,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            );
        }
        assert!(
            bindings
                .iter()
                .all(|b| b.stage_flags == vk::ShaderStageFlags::FRAGMENT)
        );
    }
}
