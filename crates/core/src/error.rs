//! Error types for the engine.

use thiserror::Error;

/// Main error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),
}

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;
