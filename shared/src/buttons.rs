//! Controller buttons and the 8-bit key-state wire mask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Key-state mask handed to the emulation core.
    ///
    /// One bit per button, in the order the console's controller shift
    /// register reports them. This layout is a wire contract with the core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyMask: u8 {
        const A      = 0b0000_0001;
        const B      = 0b0000_0010;
        const SELECT = 0b0000_0100;
        const START  = 0b0000_1000;
        const UP     = 0b0001_0000;
        const DOWN   = 0b0010_0000;
        const LEFT   = 0b0100_0000;
        const RIGHT  = 0b1000_0000;
    }
}

/// One of the eight logical controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// Every button, in declaration order.
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    /// The wire bit for this button.
    pub const fn mask(self) -> KeyMask {
        match self {
            Button::Up => KeyMask::UP,
            Button::Down => KeyMask::DOWN,
            Button::Left => KeyMask::LEFT,
            Button::Right => KeyMask::RIGHT,
            Button::A => KeyMask::A,
            Button::B => KeyMask::B,
            Button::Select => KeyMask::SELECT,
            Button::Start => KeyMask::START,
        }
    }

    /// Human-readable name, also used in config files.
    pub const fn name(self) -> &'static str {
        match self {
            Button::Up => "Up",
            Button::Down => "Down",
            Button::Left => "Left",
            Button::Right => "Right",
            Button::A => "A",
            Button::B => "B",
            Button::Select => "Select",
            Button::Start => "Start",
        }
    }
}

impl KeyMask {
    /// Mask with a single button's bit set or cleared.
    pub fn with_button(self, button: Button, pressed: bool) -> Self {
        let mut next = self;
        next.set(button.mask(), pressed);
        next
    }

    /// Whether the button's bit is set.
    pub fn is_pressed(self, button: Button) -> bool {
        self.contains(button.mask())
    }

    /// Iterate over the buttons whose bits are set.
    pub fn pressed(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.is_pressed(*b))
    }
}

impl From<Button> for KeyMask {
    fn from(button: Button) -> Self {
        button.mask()
    }
}
