//! Synchronization primitives.
//!
//! Thin RAII wrappers over the two Vulkan sync objects the renderer needs:
//! - [`Semaphore`] for GPU-to-GPU ordering (acquire before render, render
//!   before present)
//! - [`Fence`] for GPU-to-CPU waits (frame pacing, upload completion)

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan semaphore wrapper.
///
/// Created unsignaled; signaled and waited exclusively by queue operations.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Used wherever the host must observe GPU completion: the frame in-flight
/// fence and staging upload fences.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally in the signaled state.
    ///
    /// Fences that gate the first frame start signaled so the initial wait
    /// does not block forever.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );
        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence signals or the timeout (nanoseconds) expires.
    ///
    /// A timeout surfaces as `Err(VulkanError(TIMEOUT))`.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// Must not be called while the fence is pending on a queue; callers
    /// wait first, then reset.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Non-blocking signaled check.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }
}
