//! Vulkan logical device and queue management.
//!
//! The [`Device`] wraps VkDevice creation, queue retrieval, and the
//! gpu-allocator instance shared by all buffer and image allocations. It is
//! always handed around as `Arc<Device>` so RAII wrappers can keep the device
//! alive for their own teardown.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiResult;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Shared across the renderer via `Arc`. The allocator sits behind a
/// `Mutex` so allocations stay thread-safe.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    /// Dropped explicitly before the device handle; the allocator frees its
    /// memory blocks through the device.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    /// Transfer queue for staging uploads. Same as the graphics queue when
    /// the GPU has no dedicated transfer family.
    transfer_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device with one queue per unique family and
    /// initializes the gpu-allocator.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> RhiResult<Arc<Self>> {
        let queue_families = &physical_device_info.queue_families;

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default();

        let extension_names: Vec<*const i8> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };
        info!("Logical device created");

        // unwrap is fine: selection guarantees completeness
        let graphics_family = queue_families.graphics_family.unwrap();
        let present_family = queue_families.present_family.unwrap();
        let transfer_family = queue_families.transfer_family.unwrap_or(graphics_family);

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let transfer_queue = unsafe { device.get_device_queue(transfer_family, 0) };
        debug!(
            "Queues retrieved (graphics={}, present={}, transfer={})",
            graphics_family, present_family, transfer_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            transfer_queue,
            queue_families: physical_device_info.queue_families,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the transfer queue handle.
    #[inline]
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Returns the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Blocks until all queues have drained.
    ///
    /// Used before swapchain recreation and before teardown.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers must be fully recorded and the fence, if any, must
    /// be unsignaled and not in use by a previous submission.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }

    /// Submits command buffers to the transfer queue.
    ///
    /// # Safety
    ///
    /// Same contract as [`Device::submit_graphics`].
    pub unsafe fn submit_transfer(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.transfer_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            // The allocator must release its memory blocks while the device
            // is still alive
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: raw Vulkan handles are plain values and the allocator is behind
// a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_extension_required() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
