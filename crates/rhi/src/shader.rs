//! Shader module management.
//!
//! Handles SPIR-V loading and VkShaderModule creation. Shaders are loaded
//! from precompiled SPIR-V, either embedded bytes or files on disk.

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Converts to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Vulkan shader module wrapper.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from a SPIR-V file on disk.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// The byte length must be a multiple of 4 (SPIR-V word size).
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(RhiError::ShaderError(format!(
                "SPIR-V code must be 4-byte aligned, got {} bytes",
                bytes.len()
            )));
        }

        let code: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        let entry_point = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("Invalid entry point name: {}", e)))?;

        debug!("Created {} shader module", stage);

        Ok(Self {
            device,
            module,
            stage,
            entry_point,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Pipeline stage create info borrowing from this shader.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flags() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }
}
