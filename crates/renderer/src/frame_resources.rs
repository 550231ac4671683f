//! Swapchain-dependent frame resources.
//!
//! Everything that must be rebuilt when the swapchain extent changes lives
//! here: the shared depth buffer, one framebuffer per swapchain image, and
//! one render-finished semaphore per image. The semaphore for image `i` is
//! signaled by the submission that drew into image `i` and waited on by that
//! image's present, so it is never re-armed before its present was issued.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use prism_rhi::device::Device;
use prism_rhi::framebuffer::Framebuffer;
use prism_rhi::render_pass::RenderPass;
use prism_rhi::swapchain::Swapchain;
use prism_rhi::sync::Semaphore;
use prism_rhi::RhiResult;

use crate::depth_buffer::DepthBuffer;

/// Per-swapchain-image resources plus the shared depth attachment.
pub struct FrameResources {
    device: Arc<Device>,
    depth_buffer: DepthBuffer,
    framebuffers: Vec<Framebuffer>,
    render_finished: Vec<Semaphore>,
    extent: vk::Extent2D,
}

impl FrameResources {
    /// Builds the resource set against the swapchain's current images.
    pub fn new(
        device: Arc<Device>,
        swapchain: &Swapchain,
        render_pass: &RenderPass,
    ) -> RhiResult<Self> {
        let extent = swapchain.extent();
        let depth_buffer = DepthBuffer::with_default_format(device.clone(), extent)?;
        let framebuffers =
            Self::create_framebuffers(&device, swapchain, render_pass, &depth_buffer)?;
        let render_finished = (0..swapchain.image_count())
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame resources built: {} framebuffers at {}x{}",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            device,
            depth_buffer,
            framebuffers,
            render_finished,
            extent,
        })
    }

    /// Rebuilds everything against the recreated swapchain.
    ///
    /// The caller must have confirmed the GPU idle first; no in-flight
    /// submission may still reference the old framebuffers or depth image.
    pub fn rebuild(&mut self, swapchain: &Swapchain, render_pass: &RenderPass) -> RhiResult<()> {
        let extent = swapchain.extent();
        debug!(
            "Rebuilding frame resources: {}x{} -> {}x{}",
            self.extent.width, self.extent.height, extent.width, extent.height
        );

        // Old framebuffers must go before the depth view they reference
        self.framebuffers.clear();
        self.depth_buffer = DepthBuffer::with_default_format(self.device.clone(), extent)?;
        self.framebuffers =
            Self::create_framebuffers(&self.device, swapchain, render_pass, &self.depth_buffer)?;
        self.render_finished = (0..swapchain.image_count())
            .map(|_| Semaphore::new(self.device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        self.extent = extent;

        Ok(())
    }

    fn create_framebuffers(
        device: &Arc<Device>,
        swapchain: &Swapchain,
        render_pass: &RenderPass,
        depth_buffer: &DepthBuffer,
    ) -> RhiResult<Vec<Framebuffer>> {
        let extent = swapchain.extent();
        swapchain
            .image_views()
            .iter()
            .map(|&color_view| {
                let attachments = [color_view, depth_buffer.image_view()];
                Framebuffer::new(device.clone(), render_pass, &attachments, extent)
            })
            .collect()
    }

    /// Framebuffer for the given swapchain image index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn framebuffer(&self, index: usize) -> &Framebuffer {
        &self.framebuffers[index]
    }

    /// Render-finished semaphore for the given swapchain image index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn render_finished(&self, index: usize) -> vk::Semaphore {
        self.render_finished[index].handle()
    }

    #[inline]
    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth_buffer
    }

    /// Extent every framebuffer was built for.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.framebuffers.len()
    }
}
