//! Window management using winit.
//!
//! Wraps the winit window and creates the Vulkan surface for it. The window
//! tracks its current pixel size so the renderer can size the swapchain and
//! detect minimization without touching winit directly.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use prism_core::{Error, Result};

/// RAII wrapper for a Vulkan surface.
///
/// The Vulkan instance must outlive this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle, valid while this wrapper lives.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface loader, for capability queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: handle and loader come from the same instance and this is
        // the only destroy site.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Winit window wrapper with pixel size tracking.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Creates a resizable window with the given size and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The compositor may have granted a different size than requested
        let actual = window.inner_size();
        tracing::info!("Window created: {}x{}", actual.width, actual.height);

        Ok(Self {
            window: Arc::new(window),
            width: actual.width,
            height: actual.height,
        })
    }

    /// Reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Current width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Updates the tracked size; called from resize events.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Whether the window currently has a zero-area client region.
    ///
    /// Minimized windows report a zero extent; the frame loop idles while
    /// this holds.
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Aspect ratio, or 1.0 while minimized.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_minimized() {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }

    /// Requests a redraw from the compositor.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// The returned [`Surface`] destroys itself on drop; the instance must
    /// outlive it.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry/instance are live, handles come from a live winit
        // window, and Surface::drop is the sole destroy site.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);
        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}
