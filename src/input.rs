use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub const LEFT: Self = Self::Named(NamedKey::Left);
    pub const RIGHT: Self = Self::Named(NamedKey::Right);
    pub const UP: Self = Self::Named(NamedKey::Up);
    pub const DOWN: Self = Self::Named(NamedKey::Down);

    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphanumeric() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Left" | "ArrowLeft" => Left,
        "Right" | "ArrowRight" => Right,
        "Up" | "ArrowUp" => Up,
        "Down" | "ArrowDown" => Down,
        "Escape" | "Esc" => Escape,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Keys that have no printable character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Left,
    Right,
    Up,
    Down,
    Escape,
}

/// One of the four movement directions driven by the arrow keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Processing order used by the motion integrator.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    pub fn for_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Named(NamedKey::Left) => Some(Self::Left),
            KeyCode::Named(NamedKey::Right) => Some(Self::Right),
            KeyCode::Named(NamedKey::Up) => Some(Self::Up),
            KeyCode::Named(NamedKey::Down) => Some(Self::Down),
            _ => None,
        }
    }
}

/// Held state of the four direction keys.
///
/// Only levels are stored, never edges, so OS key repeat has no effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl DirectionalInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_press(&mut self, key: KeyCode) {
        if let Some(direction) = Direction::for_key(key) {
            *self.slot(direction) = true;
        }
    }

    pub fn on_release(&mut self, key: KeyCode) {
        if let Some(direction) = Direction::for_key(key) {
            *self.slot(direction) = false;
        }
    }

    pub fn is_held(&self, direction: Direction) -> bool {
        match direction {
            Direction::Left => self.left,
            Direction::Right => self.right,
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }

    pub fn any_held(&self) -> bool {
        self.left || self.right || self.up || self.down
    }

    fn slot(&mut self, direction: Direction) -> &mut bool {
        match direction {
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Raw keyboard or mouse event as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    /// Cursor position in physical pixels from the top-left corner.
    CursorMoved(Vec2),
    /// Wheel motion in lines; positive scrolls away from the user.
    Scroll(f32),
}

/// FIFO of events received since the last frame.
///
/// The host pushes while it dispatches window events; the frame driver
/// drains it at the start of each tick, so events never land mid-frame.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }
}
