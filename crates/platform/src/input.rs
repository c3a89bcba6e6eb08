//! Keyboard and mouse input state.

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

/// Tracks pressed keys/buttons plus per-frame pressed/released edges.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,

    mouse_position: (f32, f32),
    mouse_delta: (f32, f32),
}

impl InputState {
    /// Create an empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame edge state. Call once at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_pressed_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    /// Handle a key press event.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    /// Handle a key release event.
    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    /// Handle a mouse button press event.
    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if self.pressed_buttons.insert(button) {
            self.just_pressed_buttons.insert(button);
        }
    }

    /// Handle a mouse button release event.
    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Handle mouse movement.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        let old = self.mouse_position;
        self.mouse_position = (x, y);
        self.mouse_delta = (x - old.0, y - old.1);
    }

    /// Whether a key is currently held down.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Whether a key went down this frame.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Whether a key went up this frame.
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    /// Whether a mouse button is currently held down.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Current mouse position in window coordinates.
    pub fn mouse_position(&self) -> (f32, f32) {
        self.mouse_position
    }

    /// Mouse movement since the last frame.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_sets_edge_once() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyB);
        assert!(input.is_key_pressed(KeyCode::KeyB));
        assert!(input.is_key_just_pressed(KeyCode::KeyB));

        // Key repeat while held must not re-arm the edge.
        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyB);
        assert!(input.is_key_pressed(KeyCode::KeyB));
        assert!(!input.is_key_just_pressed(KeyCode::KeyB));
    }

    #[test]
    fn test_release_clears_pressed() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Escape);
        input.on_key_released(KeyCode::Escape);
        assert!(!input.is_key_pressed(KeyCode::Escape));
        assert!(input.is_key_just_released(KeyCode::Escape));
    }

    #[test]
    fn test_mouse_delta_accumulates_from_position() {
        let mut input = InputState::new();
        input.on_mouse_moved(10.0, 10.0);
        input.begin_frame();
        input.on_mouse_moved(15.0, 7.0);
        assert_eq!(input.mouse_delta(), (5.0, -3.0));
    }
}
