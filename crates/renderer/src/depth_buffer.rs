//! Depth attachment for the forward pass.
//!
//! One depth image and view, sized to the swapchain extent and recreated
//! alongside it. Memory is GPU-only through gpu-allocator.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, info};

use prism_rhi::device::Device;
use prism_rhi::{RhiError, RhiResult};

/// Default depth format (32-bit float).
pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth image plus view, owned exclusively by the frame resources.
pub struct DepthBuffer {
    device: Arc<Device>,
    image: vk::Image,
    image_view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a depth buffer sized to `extent`.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Depth buffer extent must be greater than 0".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "depth_buffer",
                requirements,
                location: MemoryLocation::GpuOnly,
                // Optimal tiling is not linear
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe { device.handle().create_image_view(&view_info, None)? };

        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );

        Ok(Self {
            device,
            image,
            image_view,
            allocation: Some(allocation),
            format,
            extent,
        })
    }

    /// Creates a depth buffer with [`DEFAULT_DEPTH_FORMAT`].
    pub fn with_default_format(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        Self::new(device, extent, DEFAULT_DEPTH_FORMAT)
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        // View, then image, then allocation
        unsafe {
            self.device
                .handle()
                .destroy_image_view(self.image_view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free depth buffer allocation: {:?}", e);
            }
        }

        debug!(
            "Destroyed depth buffer: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_format() {
        assert_eq!(DEFAULT_DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_default_format_is_a_depth_format() {
        assert!(matches!(
            DEFAULT_DEPTH_FORMAT,
            vk::Format::D32_SFLOAT
                | vk::Format::D32_SFLOAT_S8_UINT
                | vk::Format::D24_UNORM_S8_UINT
                | vk::Format::D16_UNORM
        ));
    }
}
