//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance and device creation
//! - Swapchain management and presentation
//! - Command buffer recording
//! - Render pass and framebuffer management
//! - Buffer upload and staging
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
