//! Routes events from all input sources to one key sink

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use retroshell_shared::Button;

use super::{
    GamepadInput, InputConfig, KeySink, KeyboardInput, NoPad, PadSource, PointerId, PointerInput,
};

/// Keyboard, pointer and gamepad sources bundled for the presentation layer.
pub struct InputAggregator {
    keyboard: KeyboardInput,
    pointer: PointerInput,
    gamepad: GamepadInput<Box<dyn PadSource>>,
}

impl InputAggregator {
    /// Build from config, opening the system gamepad backend if enabled.
    pub fn new(config: &InputConfig) -> Self {
        let pad: Box<dyn PadSource> = if config.gamepad {
            system_pad()
        } else {
            Box::new(NoPad)
        };
        Self::with_pad(config, pad)
    }

    /// Build with a specific pad backend.
    pub fn with_pad(config: &InputConfig, pad: Box<dyn PadSource>) -> Self {
        for button in config.keyboard.conflicts() {
            tracing::warn!(
                "Keyboard binding for {} conflicts with another button",
                button.name()
            );
        }
        Self {
            keyboard: KeyboardInput::new(config.keyboard.clone()),
            pointer: PointerInput::new(),
            gamepad: GamepadInput::new(pad),
        }
    }

    /// Handle a winit keyboard event. Returns true if it was bound to a button.
    pub fn handle_key_event(&mut self, event: &KeyEvent, sink: &mut dyn KeySink) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        self.key(code, event.state == ElementState::Pressed, sink)
    }

    pub fn key(&mut self, key: KeyCode, pressed: bool, sink: &mut dyn KeySink) -> bool {
        self.keyboard.key_event(key, pressed, sink)
    }

    pub fn pointer_down(&mut self, id: PointerId, button: Button, sink: &mut dyn KeySink) {
        self.pointer.pointer_down(id, button, sink);
    }

    pub fn pointer_up(&mut self, id: PointerId, sink: &mut dyn KeySink) {
        self.pointer.pointer_up(id, sink);
    }

    /// Poll the gamepad. Call once per animation frame.
    pub fn poll_gamepad(&mut self, sink: &mut dyn KeySink) {
        self.gamepad.poll(sink);
    }

    /// Release everything held on the keyboard and on screen, e.g. on focus loss.
    pub fn release_all(&mut self, sink: &mut dyn KeySink) {
        self.keyboard.release_all(sink);
        self.pointer.cancel_all(sink);
    }

    pub fn keyboard(&self) -> &KeyboardInput {
        &self.keyboard
    }

    pub fn gamepad_connected(&self) -> bool {
        self.gamepad.is_connected()
    }
}

#[cfg(feature = "gamepad")]
fn system_pad() -> Box<dyn PadSource> {
    Box::new(super::GilrsPad::new())
}

#[cfg(not(feature = "gamepad"))]
fn system_pad() -> Box<dyn PadSource> {
    tracing::debug!("Built without gamepad support");
    Box::new(NoPad)
}
