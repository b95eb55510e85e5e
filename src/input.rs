// src/input.rs
// Desktop key bindings: button presses for the two controls, held keys steering the virtual
// camera, and Escape to quit.

use winit::event::ElementState;
use winit::keyboard::KeyCode;

use crate::ui::UiEvent;

/// Camera turn speed while a steering key is held, in radians per second.
pub const STEER_RATE: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ui(UiEvent),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Left,
    Right,
    Up,
    Down,
}

fn axis_for(key: KeyCode) -> Option<Axis> {
    match key {
        KeyCode::ArrowLeft | KeyCode::KeyA => Some(Axis::Left),
        KeyCode::ArrowRight | KeyCode::KeyD => Some(Axis::Right),
        KeyCode::ArrowUp | KeyCode::KeyW => Some(Axis::Up),
        KeyCode::ArrowDown | KeyCode::KeyS => Some(Axis::Down),
        _ => None,
    }
}

fn action_for(key: KeyCode) -> Option<Action> {
    match key {
        KeyCode::Enter | KeyCode::NumpadEnter | KeyCode::KeyP => Some(Action::Ui(UiEvent::TogglePlacement)),
        KeyCode::Space => Some(Action::Ui(UiEvent::ToggleSpawning)),
        KeyCode::Escape => Some(Action::Quit),
        _ => None,
    }
}

/// Held steering keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyBindings {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one key event. Returns an action on a fresh press of a bound key; repeats and
    /// releases only update held state.
    pub fn handle(&mut self, key: KeyCode, state: ElementState, repeat: bool) -> Option<Action> {
        let pressed = state == ElementState::Pressed;
        if let Some(axis) = axis_for(key) {
            match axis {
                Axis::Left => self.left = pressed,
                Axis::Right => self.right = pressed,
                Axis::Up => self.up = pressed,
                Axis::Down => self.down = pressed,
            }
            return None;
        }
        if pressed && !repeat {
            action_for(key)
        } else {
            None
        }
    }

    /// (yaw, pitch) rates for the held keys. Positive yaw turns left, positive pitch looks up.
    pub fn steer_rates(&self) -> (f32, f32) {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32 * STEER_RATE;
        (axis(self.left, self.right), axis(self.up, self.down))
    }

    /// Drops every held key (focus lost).
    pub fn release_all(&mut self) {
        *self = Self::default();
    }
}
