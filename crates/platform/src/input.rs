//! Input handling for keyboard and mouse.
//!
//! [`InputState`] accumulates events as winit delivers them; the frame loop
//! calls [`InputState::begin_frame`] once per iteration so just-pressed and
//! delta queries are scoped to a single frame.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Current keyboard and mouse state.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,
    just_released_buttons: HashSet<MouseButton>,

    mouse_position: (f32, f32),
    mouse_delta: (f32, f32),
    scroll_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame state; called at the top of each frame iteration.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_pressed_buttons.clear();
        self.just_released_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
        self.scroll_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if self.pressed_buttons.insert(button) {
            self.just_pressed_buttons.insert(button);
        }
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        if self.pressed_buttons.remove(&button) {
            self.just_released_buttons.insert(button);
        }
    }

    /// Accumulates mouse movement; deltas add up within a frame.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        let old = self.mouse_position;
        self.mouse_position = (x, y);
        self.mouse_delta.0 += x - old.0;
        self.mouse_delta.1 += y - old.1;
    }

    pub fn on_scroll(&mut self, delta_x: f32, delta_y: f32) {
        self.scroll_delta.0 += delta_x;
        self.scroll_delta.1 += delta_y;
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.just_pressed_buttons.contains(&button)
    }

    pub fn is_mouse_just_released(&self, button: MouseButton) -> bool {
        self.just_released_buttons.contains(&button)
    }

    pub fn mouse_position(&self) -> (f32, f32) {
        self.mouse_position
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    pub fn scroll_delta(&self) -> (f32, f32) {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_lasts_one_frame() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_just_pressed(KeyCode::KeyW));
        assert!(input.is_key_pressed(KeyCode::KeyW));

        input.begin_frame();
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));
        assert!(input.is_key_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_repeat_events_do_not_retrigger() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Space);
        input.begin_frame();
        // OS key repeat delivers pressed again while already held
        input.on_key_pressed(KeyCode::Space);
        assert!(!input.is_key_just_pressed(KeyCode::Space));
    }

    #[test]
    fn test_mouse_deltas_accumulate_within_frame() {
        let mut input = InputState::new();
        input.on_mouse_moved(10.0, 10.0);
        input.begin_frame();
        input.on_mouse_moved(15.0, 12.0);
        input.on_mouse_moved(18.0, 13.0);
        assert_eq!(input.mouse_delta(), (8.0, 3.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        assert_eq!(input.mouse_position(), (18.0, 13.0));
    }

    #[test]
    fn test_button_release_tracking() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Left);
        input.begin_frame();
        input.on_mouse_released(MouseButton::Left);
        assert!(input.is_mouse_just_released(MouseButton::Left));
        assert!(!input.is_mouse_pressed(MouseButton::Left));
    }
}
