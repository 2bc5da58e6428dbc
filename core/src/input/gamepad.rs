//! Gamepad input handling
//!
//! Gamepads are level-triggered: there are no change events to rely on, so
//! the pad is polled once per animation frame and the resulting mask is
//! forwarded only when it differs from the last one sent.

use retroshell_shared::{Button, KeyMask};

use super::{InputSource, KeySink};

/// Pressed buttons of one pad, one bit per standard-layout button index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PadButtons(u32);

impl PadButtons {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set a standard-layout index. Indices past 31 are ignored.
    pub fn with(self, index: usize, pressed: bool) -> Self {
        if index >= 32 || !pressed {
            return self;
        }
        Self(self.0 | (1 << index))
    }

    pub fn is_pressed(self, index: usize) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }
}

/// Standard-layout button index to controller button.
///
/// 0/1 are the bottom/right face buttons, 8/9 are back/start, 12-15 the d-pad.
pub const STANDARD_MAPPING: [(usize, Button); 8] = [
    (0, Button::A),
    (1, Button::B),
    (8, Button::Select),
    (9, Button::Start),
    (12, Button::Up),
    (13, Button::Down),
    (14, Button::Left),
    (15, Button::Right),
];

/// A pollable gamepad backend.
pub trait PadSource {
    /// Refresh and return the pressed buttons, or `None` when no pad is connected.
    fn poll(&mut self) -> Option<PadButtons>;
}

impl<P: PadSource + ?Sized> PadSource for Box<P> {
    fn poll(&mut self) -> Option<PadButtons> {
        (**self).poll()
    }
}

/// Pad source that never has a pad.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPad;

impl PadSource for NoPad {
    fn poll(&mut self) -> Option<PadButtons> {
        None
    }
}

/// Polled gamepad source with distinct-until-changed forwarding.
pub struct GamepadInput<P: PadSource> {
    pad: P,
    last: KeyMask,
    connected: bool,
}

impl<P: PadSource> GamepadInput<P> {
    pub fn new(pad: P) -> Self {
        Self {
            pad,
            last: KeyMask::empty(),
            connected: false,
        }
    }

    /// Last mask forwarded to the sink.
    pub fn mask(&self) -> KeyMask {
        self.last
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Poll the pad once. Call every animation frame.
    ///
    /// A missing pad reads as no buttons pressed; polling carries on so a pad
    /// plugged in later is picked up.
    pub fn poll(&mut self, sink: &mut dyn KeySink) {
        let buttons = self.pad.poll();

        let connected = buttons.is_some();
        if connected != self.connected {
            if connected {
                tracing::info!("Gamepad connected");
            } else {
                tracing::debug!("No gamepad; using keyboard and on-screen controls");
            }
            self.connected = connected;
        }

        let mask = map_buttons(buttons.unwrap_or_default());
        if mask != self.last {
            self.last = mask;
            sink.change_key_state(InputSource::Gamepad, mask);
        }
    }
}

/// Apply [`STANDARD_MAPPING`] to a set of pressed pad buttons.
pub fn map_buttons(buttons: PadButtons) -> KeyMask {
    STANDARD_MAPPING
        .iter()
        .filter(|(index, _)| buttons.is_pressed(*index))
        .fold(KeyMask::empty(), |acc, (_, button)| acc | button.mask())
}

#[cfg(feature = "gamepad")]
pub use gilrs_pad::GilrsPad;

#[cfg(feature = "gamepad")]
mod gilrs_pad {
    use gilrs::{Axis, Button as PadButton, Gilrs};

    use super::{PadButtons, PadSource};

    /// Stick deflection that counts as a d-pad press.
    const STICK_THRESHOLD: f32 = 0.5;

    /// Standard-layout index of each gilrs button.
    const BUTTON_INDICES: [(PadButton, usize); 17] = [
        (PadButton::South, 0),
        (PadButton::East, 1),
        (PadButton::West, 2),
        (PadButton::North, 3),
        (PadButton::LeftTrigger, 4),
        (PadButton::RightTrigger, 5),
        (PadButton::LeftTrigger2, 6),
        (PadButton::RightTrigger2, 7),
        (PadButton::Select, 8),
        (PadButton::Start, 9),
        (PadButton::LeftThumb, 10),
        (PadButton::RightThumb, 11),
        (PadButton::DPadUp, 12),
        (PadButton::DPadDown, 13),
        (PadButton::DPadLeft, 14),
        (PadButton::DPadRight, 15),
        (PadButton::Mode, 16),
    ];

    /// First connected gilrs gamepad.
    pub struct GilrsPad {
        /// None if gamepad initialization failed
        gilrs: Option<Gilrs>,
    }

    impl GilrsPad {
        pub fn new() -> Self {
            let gilrs = match Gilrs::new() {
                Ok(g) => Some(g),
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize gamepad support: {}. Gamepads will not be available.",
                        e
                    );
                    None
                }
            };
            Self { gilrs }
        }
    }

    impl Default for GilrsPad {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PadSource for GilrsPad {
        fn poll(&mut self) -> Option<PadButtons> {
            let gilrs = self.gilrs.as_mut()?;

            // Drain events so gilrs updates its cached state
            while gilrs.next_event().is_some() {}

            let (_, gamepad) = gilrs.gamepads().find(|(_, g)| g.is_connected())?;

            let mut buttons = BUTTON_INDICES
                .iter()
                .fold(PadButtons::empty(), |acc, (button, index)| {
                    acc.with(*index, gamepad.is_pressed(*button))
                });

            // Left stick doubles as the d-pad
            let x = gamepad.value(Axis::LeftStickX);
            let y = gamepad.value(Axis::LeftStickY);
            buttons = buttons
                .with(12, y > STICK_THRESHOLD)
                .with(13, y < -STICK_THRESHOLD)
                .with(14, x < -STICK_THRESHOLD)
                .with(15, x > STICK_THRESHOLD);

            Some(buttons)
        }
    }
}
