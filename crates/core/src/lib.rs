//! Core utilities shared across the engine:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Per-frame transient memory arena

mod arena;
mod error;
mod logging;
mod timer;

pub use arena::FrameArena;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
