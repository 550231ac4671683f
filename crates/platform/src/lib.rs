//! Platform layer: windowing, surface creation, input, and the event queue
//! drained by the frame loop.

pub mod events;
pub mod input;
pub mod window;

pub use events::{EventQueue, WindowEvent};
pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};
