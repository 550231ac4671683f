//! Frame rendering: the frame loop driver, swapchain-dependent resources,
//! and the Vulkan renderer that ties them together.

pub mod depth_buffer;
pub mod frame_loop;
pub mod frame_resources;
pub mod overlay;
pub mod renderer;

pub use frame_loop::{FrameBackend, FrameLoop, FrameOutcome, InFlightGuard};
pub use overlay::{NullOverlay, Overlay};
pub use renderer::Renderer;
