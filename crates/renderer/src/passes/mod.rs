//! The two render passes of a shadertoy frame.
//!
//! Both draw one fullscreen triangle with no vertex input; the vertex shader
//! derives positions from the vertex index.

mod generator;
mod toy;

pub use generator::{GENERATED_EXTENT, GENERATED_FORMAT, GeneratorPass};
pub use toy::{ToyInputs, ToyPass};

use ash::vk;

use shadertoy_rhi::command::CommandBuffer;

use crate::programs::Program;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Handles needed to draw with a program from the library.
#[derive(Clone, Copy, Debug)]
struct FullscreenDraw {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
}

impl FullscreenDraw {
    fn new(program: &Program) -> Self {
        Self {
            pipeline: program.pipeline(),
            layout: program.layout(),
            bind_point: program.bind_point(),
        }
    }

    /// Clears `view` and covers it with one triangle. The image must already
    /// be in `COLOR_ATTACHMENT_OPTIMAL`.
    fn record(
        &self,
        cmd: &CommandBuffer,
        view: vk::ImageView,
        extent: vk::Extent2D,
        set: vk::DescriptorSet,
    ) {
        cmd.begin_color_rendering(view, extent, CLEAR_COLOR);
        cmd.set_viewport_and_scissor(extent);
        cmd.bind_pipeline(self.bind_point, self.pipeline);
        cmd.bind_descriptor_sets(self.bind_point, self.layout, 0, &[set]);
        cmd.draw(3, 1, 0, 0);
        cmd.end_rendering();
    }
}
