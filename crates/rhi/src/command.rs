//! Command pool and command buffer management.
//!
//! [`CommandPool`] wraps VkCommandPool; [`CommandBuffer`] wraps a primary
//! VkCommandBuffer with recording helpers for the forward pass.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::device::Device;
use crate::error::RhiResult;
use crate::framebuffer::Framebuffer;
use crate::render_pass::RenderPass;

/// Vulkan command pool wrapper.
///
/// Pools are tied to a queue family; buffers allocated here may only be
/// submitted to queues of that family. Not thread-safe, one pool per
/// recording thread.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a pool with per-buffer reset enabled.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        info!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Returns the queue family this pool belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocates a primary command buffer from this pool.
    pub fn allocate_command_buffer(&self) -> RhiResult<CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        Ok(CommandBuffer {
            device: self.device.clone(),
            buffer: buffers[0],
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        info!("Command pool destroyed");
    }
}

/// Primary command buffer with recording helpers.
///
/// The buffer's storage is owned by its pool; this wrapper does not free it
/// on drop.
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Returns the Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Resets and begins recording.
    pub fn begin(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().reset_command_buffer(
                self.buffer,
                vk::CommandBufferResetFlags::empty(),
            )?;
            let begin_info = vk::CommandBufferBeginInfo::default();
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Ends recording.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// Begins the forward pass on the given framebuffer with clear values
    /// for color and depth.
    pub fn begin_render_pass(
        &self,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        clear_color: [f32; 4],
    ) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: framebuffer.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    /// Ends the current render pass.
    pub fn end_render_pass(&self) {
        unsafe {
            self.device.handle().cmd_end_render_pass(self.buffer);
        }
    }

    /// Sets a full-extent viewport and scissor.
    pub fn set_viewport_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device
                .handle()
                .cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    /// Binds a graphics pipeline.
    pub fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_pipeline(self.buffer, bind_point, pipeline);
        }
    }

    /// Binds a vertex buffer at binding 0.
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[0]);
        }
    }

    /// Binds a u32 index buffer.
    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device.handle().cmd_bind_index_buffer(
                self.buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Pushes constants for the given stages.
    pub fn push_constants(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .handle()
                .cmd_push_constants(self.buffer, layout, stages, 0, data);
        }
    }

    /// Records an indexed draw.
    pub fn draw_indexed(&self, index_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(self.buffer, index_count, 1, 0, 0, 0);
        }
    }
}
