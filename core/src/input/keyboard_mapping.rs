//! Keyboard to controller button mapping

use serde::{Deserialize, Serialize};
use winit::keyboard::KeyCode;

use retroshell_shared::Button;

use super::keycode_serde::{deserialize_keycode, serialize_keycode};

/// One key per controller button, stored by key name in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardMapping {
    #[serde(
        default = "default_up",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub up: KeyCode,
    #[serde(
        default = "default_down",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub down: KeyCode,
    #[serde(
        default = "default_left",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub left: KeyCode,
    #[serde(
        default = "default_right",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub right: KeyCode,
    #[serde(
        default = "default_a",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub a: KeyCode,
    #[serde(
        default = "default_b",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub b: KeyCode,
    #[serde(
        default = "default_select",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub select: KeyCode,
    #[serde(
        default = "default_start",
        serialize_with = "serialize_keycode",
        deserialize_with = "deserialize_keycode"
    )]
    pub start: KeyCode,
}

fn default_up() -> KeyCode {
    KeyCode::ArrowUp
}
fn default_down() -> KeyCode {
    KeyCode::ArrowDown
}
fn default_left() -> KeyCode {
    KeyCode::ArrowLeft
}
fn default_right() -> KeyCode {
    KeyCode::ArrowRight
}
// Z/X for A/B (matches common emulator layouts)
fn default_a() -> KeyCode {
    KeyCode::KeyX
}
fn default_b() -> KeyCode {
    KeyCode::KeyZ
}
fn default_select() -> KeyCode {
    KeyCode::ShiftRight
}
fn default_start() -> KeyCode {
    KeyCode::Enter
}

impl Default for KeyboardMapping {
    fn default() -> Self {
        Self {
            up: default_up(),
            down: default_down(),
            left: default_left(),
            right: default_right(),
            a: default_a(),
            b: default_b(),
            select: default_select(),
            start: default_start(),
        }
    }
}

impl KeyboardMapping {
    /// Key bound to a button.
    pub fn key_for(&self, button: Button) -> KeyCode {
        match button {
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
            Button::A => self.a,
            Button::B => self.b,
            Button::Select => self.select,
            Button::Start => self.start,
        }
    }

    /// Button a key is bound to, if any.
    pub fn button_for(&self, key: KeyCode) -> Option<Button> {
        Button::ALL.into_iter().find(|b| self.key_for(*b) == key)
    }

    /// Buttons that share a key with an earlier button.
    pub fn conflicts(&self) -> Vec<Button> {
        let mut seen = hashbrown::HashSet::new();
        Button::ALL
            .into_iter()
            .filter(|b| !seen.insert(self.key_for(*b)))
            .collect()
    }
}
