//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Transient swapchain conditions (out-of-date, acquire timeout) are not
/// errors; they surface as `None`/soft results from the swapchain API. This
/// enum covers the conditions that are genuinely wrong.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// The window surface is no longer valid
    #[error("Surface lost: {0}")]
    SurfaceLost(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid handle or argument
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// The GPU stopped making progress within the allowed time
    #[error("GPU timeout: {0}")]
    GpuTimeout(String),
}

impl RhiError {
    /// Whether this error indicates the device or surface is gone for good.
    ///
    /// Fatal conditions unwind to the process boundary; everything else is
    /// handled locally.
    pub fn is_fatal(&self) -> bool {
        match self {
            RhiError::VulkanError(result) => matches!(
                *result,
                ash::vk::Result::ERROR_DEVICE_LOST
                    | ash::vk::Result::ERROR_SURFACE_LOST_KHR
                    | ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
                    | ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY
            ),
            RhiError::SurfaceLost(_) | RhiError::GpuTimeout(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn test_device_lost_is_fatal() {
        assert!(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST).is_fatal());
        assert!(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).is_fatal());
        assert!(RhiError::SurfaceLost("gone".to_string()).is_fatal());
    }

    #[test]
    fn test_ordinary_errors_are_not_fatal() {
        assert!(!RhiError::SwapchainError("inadequate support".to_string()).is_fatal());
        assert!(!RhiError::VulkanError(vk::Result::NOT_READY).is_fatal());
    }
}
