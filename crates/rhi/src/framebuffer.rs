//! Framebuffer management.
//!
//! One framebuffer per swapchain image, binding that image's view plus the
//! shared depth view to the render pass. Each framebuffer records the extent
//! it was built for so stale ones are easy to spot after a resize.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;
use crate::render_pass::RenderPass;

/// Vulkan framebuffer wrapper.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Creates a framebuffer binding the given attachments to the pass.
    ///
    /// Attachment order must match the render pass: color first, then depth.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };
        debug!("Created framebuffer {}x{}", extent.width, extent.height);

        Ok(Self {
            device,
            framebuffer,
            extent,
        })
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Extent this framebuffer was built for.
    ///
    /// Must match the current swapchain extent whenever the framebuffer is
    /// bound; the frame resources rebuild enforces this.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}
