//! Graphics pipeline management.
//!
//! [`PipelineLayout`] wraps VkPipelineLayout; [`GraphicsPipelineBuilder`]
//! assembles the fixed-function state for the forward pass. Viewport and
//! scissor are always dynamic so the pipeline survives swapchain resizes.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a layout from descriptor set layouts and push constant ranges.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
        debug!(
            "Created pipeline layout ({} push constant range(s))",
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Vulkan graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Builder for graphics pipelines targeting the forward pass.
///
/// Defaults: triangle list, no culling, depth test and write with LESS,
/// no blending, dynamic viewport and scissor.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: vk::CullModeFlags,
    depth_test: bool,
}

impl<'a> Default for GraphicsPipelineBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: vk::CullModeFlags::NONE,
            depth_test: true,
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    pub fn vertex_attributes(
        mut self,
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    pub fn cull_mode(mut self, cull_mode: vk::CullModeFlags) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn depth_test(mut self, enabled: bool) -> Self {
        self.depth_test = enabled;
        self
    }

    /// Builds the pipeline against subpass 0 of the given render pass.
    pub fn build(
        self,
        device: Arc<Device>,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
    ) -> RhiResult<Pipeline> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("Missing vertex shader".to_string()))?;
        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Missing fragment shader".to_string()))?;

        let stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; actual values are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        let color_blend_attachments = [color_blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?[0]
        };

        info!("Graphics pipeline created");

        Ok(Pipeline { device, pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = GraphicsPipelineBuilder::new();
        assert_eq!(builder.cull_mode, vk::CullModeFlags::NONE);
        assert!(builder.depth_test);
        assert!(builder.vertex_shader.is_none());
    }
}
