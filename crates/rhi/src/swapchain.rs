//! Swapchain management.
//!
//! The [`Swapchain`] wraps VkSwapchainKHR together with everything tied to
//! its image count: the images, their views, and the ring of image-available
//! semaphores armed at acquire time.
//!
//! # Lifecycle
//!
//! Recreation happens in place through [`Swapchain::recreate`], which passes
//! the old handle as `old_swapchain` so the driver can recycle image memory.
//! The wrapper's identity never changes and there is no window where it holds
//! an invalid handle.
//!
//! # Soft failures
//!
//! Losing the surface for a frame is normal during resizes, so neither
//! acquire nor present treat it as an error. [`Swapchain::acquire_next_image`]
//! returns `Ok(None)` when no image can be had this frame and
//! [`Swapchain::present`] reports [`PresentState::Suboptimal`] when the
//! swapchain should be rebuilt. Callers skip or finish the frame and rebuild
//! at the top of the next iteration.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::sync::Semaphore;

/// Default timeout for image acquisition (1 second).
///
/// Long enough to ride out a driver hiccup, short enough that a wedged
/// compositor degrades into skipped frames instead of a frozen loop.
pub const DEFAULT_ACQUIRE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Outcome of a successful present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentState {
    /// The image was presented and the swapchain still matches the surface.
    Optimal,
    /// The image was presented (or dropped) but the swapchain no longer
    /// matches the surface and should be rebuilt.
    Suboptimal,
}

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (image count bounds, extents, transforms).
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space combinations.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support for a physical device and surface.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode are required.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Vulkan swapchain wrapper.
///
/// Not thread-safe; the frame loop owns it and is the only caller.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    /// One image-available semaphore per swapchain image, armed round-robin
    /// at acquire time.
    acquire_semaphores: Vec<Semaphore>,
    /// Next slot in the semaphore ring.
    acquire_cursor: usize,
    /// Semaphore armed by the most recent successful acquire.
    armed_semaphore: vk::Semaphore,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a new swapchain sized to the given window dimensions.
    ///
    /// Selection policy:
    /// - Format: B8G8R8A8_SRGB with SRGB_NONLINEAR, with fallbacks
    /// - Present mode: MAILBOX, falling back to FIFO
    /// - Image count: minimum plus one, capped by the surface maximum
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        Self::create_internal(
            instance,
            device,
            surface,
            width,
            height,
            vk::SwapchainKHR::null(),
        )
    }

    fn create_internal(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, &surface_loader)?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        let queue_families = device.queue_families();
        let graphics_family = queue_families.graphics_family.unwrap();
        let present_family = queue_families.present_family.unwrap();
        let queue_family_indices = [graphics_family, present_family];

        let (sharing_mode, queue_family_indices_slice) = if graphics_family != present_family {
            debug!(
                "CONCURRENT sharing between graphics ({}) and present ({}) families",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, queue_family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };
        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
        info!("Swapchain created with {} images", images.len());

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        let acquire_semaphores = (0..images.len())
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            acquire_semaphores,
            acquire_cursor: 0,
            armed_semaphore: vk::Semaphore::null(),
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
        })
    }

    /// Rebuilds the swapchain for a new surface size, in place.
    ///
    /// Waits for the device to go idle, then creates the replacement with
    /// the old handle as `old_swapchain` before destroying it. Image views
    /// and the semaphore ring are rebuilt to match the new image count.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        self.device.wait_idle()?;

        info!("Recreating swapchain for new size: {}x{}", width, height);

        self.destroy_image_views();

        let old_swapchain = self.swapchain;
        let mut replacement = Self::create_internal(
            instance,
            self.device.clone(),
            surface,
            width,
            height,
            old_swapchain,
        )?;

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }

        // Move the replacement's resources into self; Drop types are moved
        // out with mem::take and the handle nulled so the replacement drops
        // inert.
        self.swapchain = replacement.swapchain;
        self.images = std::mem::take(&mut replacement.images);
        self.image_views = std::mem::take(&mut replacement.image_views);
        self.acquire_semaphores = std::mem::take(&mut replacement.acquire_semaphores);
        self.acquire_cursor = 0;
        self.armed_semaphore = vk::Semaphore::null();
        self.format = replacement.format;
        self.color_space = replacement.color_space;
        self.extent = replacement.extent;
        self.present_mode = replacement.present_mode;

        replacement.swapchain = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Acquires the next swapchain image.
    ///
    /// Arms the next semaphore in the ring; on success that semaphore is
    /// available through [`Swapchain::armed_semaphore`] for the submit to
    /// wait on.
    ///
    /// Returns `Ok(None)` when no image can be acquired this frame: the
    /// swapchain is out of date or the timeout expired. The caller skips the
    /// frame and rebuilds or retries next iteration.
    pub fn acquire_next_image(&mut self, timeout: u64) -> RhiResult<Option<u32>> {
        let semaphore = self.acquire_semaphores[self.acquire_cursor].handle();

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        };

        match classify_acquire(result)? {
            Some(index) => {
                self.armed_semaphore = semaphore;
                self.acquire_cursor = (self.acquire_cursor + 1) % self.acquire_semaphores.len();
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Semaphore armed by the most recent successful acquire.
    ///
    /// Null before the first acquire and after a recreation.
    #[inline]
    pub fn armed_semaphore(&self) -> vk::Semaphore {
        self.armed_semaphore
    }

    /// Presents the rendered image.
    ///
    /// Returns [`PresentState::Suboptimal`] when the swapchain should be
    /// rebuilt, including the out-of-date case where the image was dropped.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentState> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        classify_present(result)
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode in use.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns the image view at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    /// Returns all image views.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();

        // Null handle means recreate already moved ownership elsewhere
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }
            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// Maps the raw acquire result onto the skip-or-fail contract.
fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<Option<u32>> {
    match result {
        // A suboptimal acquire still yields a usable image; present will
        // report the mismatch and trigger the rebuild.
        Ok((index, _suboptimal)) => Ok(Some(index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            debug!("Acquire returned out-of-date, skipping frame");
            Ok(None)
        }
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
            warn!("Acquire timed out, skipping frame");
            Ok(None)
        }
        Err(e) => Err(RhiError::from(e)),
    }
}

/// Maps the raw present result onto [`PresentState`].
fn classify_present(result: Result<bool, vk::Result>) -> RhiResult<PresentState> {
    match result {
        Ok(false) => Ok(PresentState::Optimal),
        Ok(true) => Ok(PresentState::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentState::Suboptimal),
        Err(e) => Err(RhiError::from(e)),
    }
}

/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR, then B8G8R8A8_UNORM, then
/// whatever the surface lists first.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = preferred {
        return format;
    }

    let alternative = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = alternative {
        warn!("Using fallback surface format: B8G8R8A8_UNORM");
        return format;
    }

    warn!(
        "Using first available surface format: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Prefers MAILBOX; FIFO is the only mode Vulkan guarantees.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }
    debug!("Selected FIFO present mode");
    vk::PresentModeKHR::FIFO
}

/// Uses the surface's current extent when fixed, otherwise clamps the
/// requested size into the surface's supported range.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum when the surface sets
/// one (0 means unbounded).
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe {
            device
                .handle()
                .create_image_view(&create_info, None)
                .map_err(|e| {
                    RhiError::SwapchainError(format!("Failed to create image view {}: {:?}", i, e))
                })?
        };
        image_views.push(image_view);
    }

    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_choose_present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_choose_present_mode_fallback_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current_when_fixed() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((extent.width, extent.height), (2000, 2000));

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!((extent.width, extent.height), (100, 100));

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_determine_image_count_caps_at_max() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn test_determine_image_count_unbounded() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn test_support_details_adequacy() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());
    }

    #[test]
    fn test_acquire_out_of_date_is_a_skip() {
        let classified = classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap();
        assert_eq!(classified, None);
    }

    #[test]
    fn test_acquire_timeout_is_a_skip() {
        let classified = classify_acquire(Err(vk::Result::TIMEOUT)).unwrap();
        assert_eq!(classified, None);
    }

    #[test]
    fn test_acquire_suboptimal_still_yields_image() {
        let classified = classify_acquire(Ok((1, true))).unwrap();
        assert_eq!(classified, Some(1));
    }

    #[test]
    fn test_acquire_device_lost_is_an_error() {
        assert!(classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn test_present_states() {
        assert_eq!(classify_present(Ok(false)).unwrap(), PresentState::Optimal);
        assert_eq!(classify_present(Ok(true)).unwrap(), PresentState::Suboptimal);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentState::Suboptimal
        );
        assert!(classify_present(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }
}
