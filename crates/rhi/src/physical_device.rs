//! Physical device (GPU) selection.
//!
//! Enumerates the available GPUs, filters out those missing the queue
//! families we need, and picks the best remaining one. Discrete GPUs are
//! strongly preferred over integrated ones.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Queue family indices used by the renderer.
///
/// Graphics and present are mandatory. Transfer falls back to the graphics
/// family when no dedicated transfer family exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Queue family supporting graphics operations.
    pub graphics_family: Option<u32>,
    /// Queue family supporting presentation to the surface.
    pub present_family: Option<u32>,
    /// Queue family used for staging uploads.
    pub transfer_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Whether the minimum required families (graphics, present) are there.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Unique family indices, for logical device queue creation.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(3);
        for family in [
            self.graphics_family,
            self.present_family,
            self.transfer_family,
        ]
        .into_iter()
        .flatten()
        {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Selected GPU along with the properties the renderer needs later.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for this device.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Human-readable device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable GPU for rendering.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no device has both a graphics
/// and a present-capable queue family.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;

    for device in devices {
        let info = match check_device(instance, device, surface, surface_loader) {
            Some(info) => info,
            None => continue,
        };
        let score = rate_device(&info);
        debug!(
            "GPU '{}' ({}) scored {}",
            info.device_name(),
            info.device_type_name(),
            score
        );
        let better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((info, score));
        }
    }

    let (selected, _) = best.ok_or(RhiError::NoSuitableGpu)?;
    info!(
        "Selected GPU: '{}' ({})",
        selected.device_name(),
        selected.device_type_name()
    );
    Ok(selected)
}

fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        let name = unsafe {
            CStr::from_ptr(properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown")
        };
        debug!("GPU '{}' skipped: missing graphics or present queue", name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();
    let mut dedicated_transfer: Option<u32> = None;

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let has_transfer = family.queue_flags.contains(vk::QueueFlags::TRANSFER);

        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }

        // A transfer-only family keeps staging uploads off the graphics queue
        if has_transfer && !has_graphics && dedicated_transfer.is_none() {
            dedicated_transfer = Some(i);
        }

        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };
            if present_support {
                indices.present_family = Some(i);
            }
        }
    }

    indices.transfer_family = dedicated_transfer.or(indices.graphics_family);
    indices
}

/// Higher scores indicate more desirable devices.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    score += vram_mb.min(16000);

    if info.queue_families.transfer_family != info.queue_families.graphics_family {
        score += 100;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_indices_incomplete() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_graphics_and_present_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            transfer_family: None,
        };
        assert!(indices.is_complete());
    }

    #[test]
    fn test_graphics_alone_incomplete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
            transfer_family: Some(1),
        };
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_unique_families_deduplicates() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            transfer_family: Some(1),
        };
        let unique = indices.unique_families();
        assert_eq!(unique, vec![0, 1]);
    }

    #[test]
    fn test_unique_families_all_same() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(2),
            present_family: Some(2),
            transfer_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![2]);
    }
}
