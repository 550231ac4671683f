//! Window event queue.
//!
//! Window callbacks push events here as they arrive; the frame loop drains
//! the queue exactly once at the top of each iteration, before the update
//! step. Delivery order within a frame matches arrival order.

use std::collections::VecDeque;

/// Window-level events the frame loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    /// The window's pixel size changed.
    Resized { width: u32, height: u32 },
    /// The user asked to close the window.
    CloseRequested,
    /// Keyboard focus changed.
    Focused(bool),
    /// The display scale factor changed; a resize usually follows.
    ScaleFactorChanged(f64),
}

/// FIFO queue of window events, drained once per frame.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<WindowEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an event.
    pub fn push(&mut self, event: WindowEvent) {
        self.events.push_back(event);
    }

    /// Removes and returns all pending events in arrival order.
    pub fn drain(&mut self) -> Vec<WindowEvent> {
        self.events.drain(..).collect()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let mut queue = EventQueue::new();
        queue.push(WindowEvent::Resized {
            width: 800,
            height: 600,
        });
        queue.push(WindowEvent::Focused(false));
        queue.push(WindowEvent::CloseRequested);

        let drained = queue.drain();
        assert_eq!(
            drained,
            vec![
                WindowEvent::Resized {
                    width: 800,
                    height: 600
                },
                WindowEvent::Focused(false),
                WindowEvent::CloseRequested,
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_on_empty_queue() {
        let mut queue = EventQueue::new();
        assert!(queue.drain().is_empty());
    }
}
