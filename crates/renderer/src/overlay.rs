//! Overlay seam for in-pass UI drawing.
//!
//! The frame loop queries [`Overlay::display_size`] before acquiring an
//! image and skips the frame on a degenerate size; the draw data is recorded
//! into the same render pass as the scene, after the scene geometry.

use prism_rhi::command::CommandBuffer;
use prism_rhi::RhiResult;

/// Hook for immediate-mode UI recorded into the forward pass.
pub trait Overlay {
    /// Current display size in pixels. A zero dimension makes the frame
    /// loop skip the frame.
    fn display_size(&self) -> (f32, f32);

    /// Records the overlay's draw data into the current render pass.
    fn record(&mut self, cmd: &CommandBuffer) -> RhiResult<()>;

    /// Called after swapchain-dependent resources are rebuilt.
    fn on_resize(&mut self, _width: f32, _height: f32) {}
}

/// Overlay that draws nothing but tracks the display size.
pub struct NullOverlay {
    width: f32,
    height: f32,
}

impl NullOverlay {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Overlay for NullOverlay {
    fn display_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn record(&mut self, _cmd: &CommandBuffer) -> RhiResult<()> {
        Ok(())
    }

    fn on_resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_overlay_tracks_size() {
        let mut overlay = NullOverlay::new(800.0, 600.0);
        assert_eq!(overlay.display_size(), (800.0, 600.0));
        overlay.on_resize(1024.0, 768.0);
        assert_eq!(overlay.display_size(), (1024.0, 768.0));
    }
}
