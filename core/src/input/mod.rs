//! Input handling for keyboard, gamepad and on-screen buttons
//!
//! Each source tracks its own contribution to the key mask and reports
//! changes to a [`KeySink`]. The sink (the session) is the single place the
//! contributions are combined and forwarded to the core.

mod aggregator;
mod gamepad;
mod keyboard;
mod keyboard_mapping;
pub(crate) mod keycode_serde;
mod pointer;
#[cfg(test)]
mod tests;

pub use aggregator::InputAggregator;
#[cfg(feature = "gamepad")]
pub use gamepad::GilrsPad;
pub use gamepad::{GamepadInput, NoPad, PadButtons, PadSource, STANDARD_MAPPING};
pub use keyboard::KeyboardInput;
pub use keyboard_mapping::KeyboardMapping;
pub use pointer::{PointerId, PointerInput};

use retroshell_shared::{Button, KeyMask};
use serde::{Deserialize, Serialize};

/// Where a key change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Keyboard,
    Gamepad,
    /// On-screen buttons (mouse or touch)
    Pointer,
}

impl InputSource {
    pub const ALL: [InputSource; 3] = [
        InputSource::Keyboard,
        InputSource::Gamepad,
        InputSource::Pointer,
    ];

    pub(crate) const fn index(self) -> usize {
        match self {
            InputSource::Keyboard => 0,
            InputSource::Gamepad => 1,
            InputSource::Pointer => 2,
        }
    }
}

/// Receiver of key changes from input sources.
pub trait KeySink {
    /// A single button changed on `source`.
    fn change_key(&mut self, source: InputSource, button: Button, pressed: bool);

    /// `source` now reports exactly `mask`.
    fn change_key_state(&mut self, source: InputSource, mask: KeyMask);
}

/// Input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub keyboard: KeyboardMapping,

    /// Poll gamepads (default: true)
    #[serde(default = "default_gamepad")]
    pub gamepad: bool,
}

fn default_gamepad() -> bool {
    true
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keyboard: KeyboardMapping::default(),
            gamepad: default_gamepad(),
        }
    }
}
