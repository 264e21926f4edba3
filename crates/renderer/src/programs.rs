//! Named graphics programs.
//!
//! A program is a pipeline plus its layout, built once at startup from
//! SPIR-V in the shader directory. Shader files are looked up as
//! `<dir>/<name>.vert.spv` and `<dir>/<name>.frag.spv`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::info;

use shadertoy_rhi::device::Device;
use shadertoy_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use shadertoy_rhi::shader::{Shader, ShaderStage};

use crate::error::{RenderError, RenderResult};

pub struct Program {
    // Destroyed before its layout
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl Program {
    #[inline]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.pipeline.bind_point()
    }
}

pub struct ProgramLibrary {
    device: Arc<Device>,
    shader_dir: PathBuf,
    programs: HashMap<String, Program>,
}

impl ProgramLibrary {
    pub fn new(device: Arc<Device>, shader_dir: &Path) -> Self {
        Self {
            device,
            shader_dir: shader_dir.to_path_buf(),
            programs: HashMap::new(),
        }
    }

    /// Builds the program `name` from the `vertex` and `fragment` shaders,
    /// rendering into `color_format` with one descriptor set.
    ///
    /// # Errors
    ///
    /// Fails if a shader is missing or invalid, or pipeline creation fails.
    pub fn create_graphics(
        &mut self,
        name: &str,
        vertex: &str,
        fragment: &str,
        color_format: vk::Format,
        set_layout: vk::DescriptorSetLayout,
    ) -> RenderResult<&Program> {
        let vertex_shader = Shader::from_spirv_file(
            self.device.clone(),
            &self.shader_path(vertex, ShaderStage::Vertex),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            self.device.clone(),
            &self.shader_path(fragment, ShaderStage::Fragment),
            ShaderStage::Fragment,
            "main",
        )?;

        let layout = PipelineLayout::new(self.device.clone(), &[set_layout], &[])?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .color_attachment_format(color_format)
            .build(self.device.clone(), &layout)?;

        info!(
            "Program '{}' built from {} + {} for {:?}",
            name, vertex, fragment, color_format
        );

        self.programs
            .insert(name.to_string(), Program { pipeline, layout });
        self.get(name)
    }

    pub fn get(&self, name: &str) -> RenderResult<&Program> {
        self.programs
            .get(name)
            .ok_or_else(|| RenderError::UnknownProgram(name.to_string()))
    }

    pub fn shader_path(&self, name: &str, stage: ShaderStage) -> PathBuf {
        let extension = match stage {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        };
        self.shader_dir.join(format!("{}.{}.spv", name, extension))
    }
}
