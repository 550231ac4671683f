//! Vulkan renderer orchestration.
//!
//! [`Renderer`] owns every GPU resource and implements [`FrameBackend`] so
//! the frame loop can drive it. Destruction order matters: the frame loop's
//! guard fence, pipeline, frame resources, and swapchain all go before the
//! device, and the surface goes before the instance. ManuallyDrop makes
//! that order explicit in [`Drop`].

use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::{debug, error, info};

use prism_core::FrameArena;
use prism_platform::{Surface, Window};
use prism_rhi::buffer::{Buffer, BufferUsage};
use prism_rhi::command::{CommandBuffer, CommandPool};
use prism_rhi::device::Device;
use prism_rhi::instance::Instance;
use prism_rhi::physical_device::select_physical_device;
use prism_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use prism_rhi::render_pass::RenderPass;
use prism_rhi::shader::{Shader, ShaderStage};
use prism_rhi::swapchain::{PresentState, Swapchain, DEFAULT_ACQUIRE_TIMEOUT_NS};
use prism_rhi::vertex::Vertex;
use prism_rhi::{RhiError, RhiResult};

use crate::frame_loop::{FrameBackend, InFlightGuard};
use crate::frame_resources::FrameResources;
use crate::overlay::{NullOverlay, Overlay};

/// Per-draw data pushed to the vertex stage.
///
/// 128 bytes, the guaranteed minimum push constant budget.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PushConstants {
    model: Mat4,
    view_proj: Mat4,
}

const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// Environment variable overriding where compiled shaders are loaded from.
const SHADER_DIR_ENV: &str = "PRISM_SHADER_DIR";

/// Directory holding the compiled SPIR-V shaders.
///
/// `PRISM_SHADER_DIR` wins when set (installed builds); otherwise the
/// workspace `shaders/spirv/` directory is resolved from the crate
/// manifest, so launching from any working directory finds the shaders.
fn shader_dir() -> PathBuf {
    std::env::var_os(SHADER_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(default_shader_dir)
}

fn default_shader_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shaders/spirv")
}

/// Owns the Vulkan stack and renders one frame per backend call.
pub struct Renderer {
    // Dropped manually, in dependency order; see Drop below.
    guard: ManuallyDrop<InFlightGuard>,
    command_buffer: CommandBuffer,
    command_pool: ManuallyDrop<CommandPool>,
    vertex_buffer: ManuallyDrop<Buffer>,
    index_buffer: ManuallyDrop<Buffer>,
    index_count: u32,
    pipeline: ManuallyDrop<Pipeline>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    frame_resources: ManuallyDrop<FrameResources>,
    render_pass: ManuallyDrop<RenderPass>,
    swapchain: ManuallyDrop<Swapchain>,
    surface: ManuallyDrop<Surface>,
    device: Arc<Device>,
    instance: ManuallyDrop<Instance>,

    overlay: Box<dyn Overlay>,
    arena: FrameArena,
    model: Mat4,
    view_proj: Mat4,
}

impl Renderer {
    /// Brings up the full Vulkan stack for the given window.
    pub fn new(window: &Window) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();
        info!("Initializing renderer ({}x{})", width, height);

        let enable_validation = cfg!(debug_assertions);
        let instance = Instance::new(enable_validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceLost(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let render_pass = RenderPass::new(
            device.clone(),
            swapchain.format(),
            crate::depth_buffer::DEFAULT_DEPTH_FORMAT,
        )?;

        let frame_resources = FrameResources::new(device.clone(), &swapchain, &render_pass)?;

        let (pipeline, pipeline_layout) = Self::create_pipeline(device.clone(), &render_pass)?;

        let (vertex_buffer, index_buffer, index_count) = Self::create_cube_buffers(&device)?;

        let graphics_family = device.queue_families().graphics_family.unwrap();
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffer = command_pool.allocate_command_buffer()?;

        let guard = InFlightGuard::new(device.clone())?;

        let overlay = Box::new(NullOverlay::new(width as f32, height as f32));

        info!(
            "Renderer initialized: {} swapchain images, {} indices",
            swapchain.image_count(),
            index_count
        );

        Ok(Self {
            guard: ManuallyDrop::new(guard),
            command_buffer,
            command_pool: ManuallyDrop::new(command_pool),
            vertex_buffer: ManuallyDrop::new(vertex_buffer),
            index_buffer: ManuallyDrop::new(index_buffer),
            index_count,
            pipeline: ManuallyDrop::new(pipeline),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            frame_resources: ManuallyDrop::new(frame_resources),
            render_pass: ManuallyDrop::new(render_pass),
            swapchain: ManuallyDrop::new(swapchain),
            surface: ManuallyDrop::new(surface),
            device,
            instance: ManuallyDrop::new(instance),
            overlay,
            arena: FrameArena::default(),
            model: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
        })
    }

    fn create_pipeline(
        device: Arc<Device>,
        render_pass: &RenderPass,
    ) -> RhiResult<(Pipeline, PipelineLayout)> {
        let shader_dir = shader_dir();
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("scene.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("scene.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        let push_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(std::mem::size_of::<PushConstants>() as u32);

        let pipeline_layout = PipelineLayout::new(device.clone(), &[], &[push_range])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(vk::CullModeFlags::NONE)
            .depth_test(true)
            .build(device, &pipeline_layout, render_pass)?;

        Ok((pipeline, pipeline_layout))
    }

    /// Uploads a unit cube with per-vertex colors through the staging path.
    fn create_cube_buffers(device: &Arc<Device>) -> RhiResult<(Buffer, Buffer, u32)> {
        let vertices = [
            Vertex::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(1.0, 0.0, 0.0)),
            Vertex::new(Vec3::new(0.5, -0.5, -0.5), Vec3::new(0.0, 1.0, 0.0)),
            Vertex::new(Vec3::new(0.5, 0.5, -0.5), Vec3::new(0.0, 0.0, 1.0)),
            Vertex::new(Vec3::new(-0.5, 0.5, -0.5), Vec3::new(1.0, 1.0, 0.0)),
            Vertex::new(Vec3::new(-0.5, -0.5, 0.5), Vec3::new(1.0, 0.0, 1.0)),
            Vertex::new(Vec3::new(0.5, -0.5, 0.5), Vec3::new(0.0, 1.0, 1.0)),
            Vertex::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 1.0, 1.0)),
            Vertex::new(Vec3::new(-0.5, 0.5, 0.5), Vec3::new(0.2, 0.2, 0.2)),
        ];

        #[rustfmt::skip]
        let indices: [u32; 36] = [
            0, 1, 2, 2, 3, 0, // back
            4, 6, 5, 6, 4, 7, // front
            4, 0, 3, 3, 7, 4, // left
            1, 5, 6, 6, 2, 1, // right
            3, 2, 6, 6, 7, 3, // top
            4, 5, 1, 1, 0, 4, // bottom
        ];

        let vertex_buffer = Buffer::new_device_local(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_device_local(
            device.clone(),
            BufferUsage::Index,
            bytemuck::cast_slice(&indices),
        )?;

        Ok((vertex_buffer, index_buffer, indices.len() as u32))
    }

    /// Sets the combined view-projection matrix for the next frame.
    pub fn set_view_proj(&mut self, view_proj: Mat4) {
        self.view_proj = view_proj;
    }

    /// Sets the model transform for the next frame.
    pub fn set_model_transform(&mut self, model: Mat4) {
        self.model = model;
    }

    /// Replaces the overlay implementation.
    pub fn set_overlay(&mut self, overlay: Box<dyn Overlay>) {
        self.overlay = overlay;
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn record_commands(&mut self, image_index: u32) -> RhiResult<()> {
        let cmd = &self.command_buffer;
        let framebuffer = self.frame_resources.framebuffer(image_index as usize);
        debug_assert_eq!(
            (framebuffer.extent().width, framebuffer.extent().height),
            (self.swapchain.extent().width, self.swapchain.extent().height),
        );

        cmd.begin()?;
        cmd.begin_render_pass(&self.render_pass, framebuffer, CLEAR_COLOR);
        cmd.set_viewport_scissor(self.swapchain.extent());
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        cmd.bind_vertex_buffer(self.vertex_buffer.handle());
        cmd.bind_index_buffer(self.index_buffer.handle());

        let push = PushConstants {
            model: self.model,
            view_proj: self.view_proj,
        };
        let layout = self.pipeline_layout.handle();
        // Per-draw constants are staged in the frame arena, which is reset
        // once per iteration in finish_frame; the bytes only need to live
        // until the command buffer copies them.
        let bytes = bytemuck::bytes_of(&push);
        match self
            .arena
            .alloc(bytes.len(), std::mem::align_of::<PushConstants>())
        {
            Some(staged) => {
                staged.copy_from_slice(bytes);
                cmd.push_constants(layout, vk::ShaderStageFlags::VERTEX, staged);
            }
            None => cmd.push_constants(layout, vk::ShaderStageFlags::VERTEX, bytes),
        }
        cmd.draw_indexed(self.index_count);

        self.overlay.record(cmd)?;

        cmd.end_render_pass();
        cmd.end()?;
        Ok(())
    }
}

impl FrameBackend for Renderer {
    fn wait_guard(&mut self) -> RhiResult<()> {
        self.guard.wait()
    }

    fn acquire_image(&mut self) -> RhiResult<Option<u32>> {
        self.swapchain.acquire_next_image(DEFAULT_ACQUIRE_TIMEOUT_NS)
    }

    fn overlay_size(&self) -> (f32, f32) {
        self.overlay.display_size()
    }

    fn record_and_submit(&mut self, image_index: u32) -> RhiResult<()> {
        // Reset only now that a submission is certain to follow
        self.guard.reset()?;
        self.record_commands(image_index)?;

        // The acquired image is first touched at the top of the pipe; the
        // render pass dependency handles the attachment write ordering.
        let wait_semaphores = [self.swapchain.armed_semaphore()];
        let wait_stages = [vk::PipelineStageFlags::TOP_OF_PIPE];
        let signal_semaphores = [self.frame_resources.render_finished(image_index as usize)];
        let command_buffers = [self.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.submit_graphics(&[submit_info], self.guard.fence())?;
        }
        Ok(())
    }

    fn present_image(&mut self, image_index: u32) -> RhiResult<PresentState> {
        self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.frame_resources.render_finished(image_index as usize),
        )
    }

    fn rebuild(&mut self, width: u32, height: u32) -> RhiResult<()> {
        // recreate waits for device idle before touching anything
        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)?;
        self.frame_resources
            .rebuild(&self.swapchain, &self.render_pass)?;
        self.overlay.on_resize(width as f32, height as f32);
        debug!("Renderer rebuilt for {}x{}", width, height);
        Ok(())
    }

    fn finish_frame(&mut self) {
        self.arena.reset();
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {:?}", e);
        }

        // Reverse creation order; surface before instance, device kept
        // alive by the Arc until every wrapper has dropped.
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.vertex_buffer);
            ManuallyDrop::drop(&mut self.index_buffer);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.frame_resources);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constants_fit_guaranteed_budget() {
        // maxPushConstantsSize is at least 128 bytes on every device
        assert_eq!(std::mem::size_of::<PushConstants>(), 128);
    }

    #[test]
    fn test_default_shader_dir_is_absolute() {
        // Resolved from the crate manifest, not the working directory
        let dir = default_shader_dir();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("shaders/spirv"));
    }

    #[test]
    fn test_arena_stages_push_constant_sized_blocks() {
        let mut arena = FrameArena::default();
        let block = arena
            .alloc(
                std::mem::size_of::<PushConstants>(),
                std::mem::align_of::<PushConstants>(),
            )
            .unwrap();
        assert_eq!(block.len(), 128);
        arena.reset();
        assert_eq!(arena.used(), 0);
    }
}
