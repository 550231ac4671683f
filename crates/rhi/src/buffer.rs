//! GPU buffer management.
//!
//! Vertex and index buffers live in device-local memory and are filled
//! through a staging upload on the transfer queue. Memory comes from
//! gpu-allocator, which handles suballocation and memory type selection.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::sync::Fence;

/// Timeout for staging uploads (4 seconds).
const UPLOAD_TIMEOUT_NS: u64 = 4_000_000_000;

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled by staging copy.
    Vertex,
    /// Device-local index data, filled by staging copy.
    Index,
    /// CPU-writable source for staging copies.
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Preferred memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Human-readable name, used in allocation labels and logs.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer with gpu-allocator managed memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized buffer of the given size.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Creates a device-local buffer and fills it through a staging copy.
    ///
    /// A transient command pool on the transfer family records the copy;
    /// the upload fence is waited before the staging buffer drops.
    pub fn new_device_local(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let buffer = Self::new(device.clone(), usage, data.len() as vk::DeviceSize)?;

        let staging = Self::new(device.clone(), BufferUsage::Staging, data.len() as vk::DeviceSize)?;
        staging.write_data(0, data)?;

        let transfer_family = device
            .queue_families()
            .transfer_family
            .ok_or_else(|| RhiError::InvalidHandle("No transfer queue family".to_string()))?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(transfer_family);
        let pool = unsafe { device.handle().create_command_pool(&pool_info, None)? };

        let result = Self::record_and_submit_copy(&device, pool, &staging, &buffer);

        unsafe {
            device.handle().destroy_command_pool(pool, None);
        }
        result?;

        debug!(
            "Uploaded {} bytes to device-local {} buffer",
            data.len(),
            usage.name()
        );
        Ok(buffer)
    }

    fn record_and_submit_copy(
        device: &Arc<Device>,
        pool: vk::CommandPool,
        src: &Buffer,
        dst: &Buffer,
    ) -> RhiResult<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { device.handle().allocate_command_buffers(&alloc_info)?[0] };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device
                .handle()
                .begin_command_buffer(command_buffer, &begin_info)?;

            let region = vk::BufferCopy::default().size(src.size());
            device
                .handle()
                .cmd_copy_buffer(command_buffer, src.handle(), dst.handle(), &[region]);

            device.handle().end_command_buffer(command_buffer)?;
        }

        let fence = Fence::new(device.clone(), false)?;
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        unsafe {
            device.submit_transfer(&[submit_info], fence.handle())?;
        }
        fence.wait(UPLOAD_TIMEOUT_NS).map_err(|e| match e {
            RhiError::VulkanError(vk::Result::TIMEOUT) => {
                RhiError::GpuTimeout("Staging upload did not complete".to_string())
            }
            other => other,
        })?;

        Ok(())
    }

    /// Writes data at the given offset.
    ///
    /// Only valid for CPU-visible buffers (staging).
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Free the allocation before the buffer handle
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", e);
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        assert!(BufferUsage::Vertex
            .to_vk_usage()
            .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST));
        assert!(BufferUsage::Index
            .to_vk_usage()
            .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST));
        assert!(BufferUsage::Staging
            .to_vk_usage()
            .contains(vk::BufferUsageFlags::TRANSFER_SRC));
    }

    #[test]
    fn test_memory_locations() {
        assert_eq!(BufferUsage::Vertex.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Index.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(
            BufferUsage::Staging.memory_location(),
            MemoryLocation::CpuToGpu
        );
    }
}
