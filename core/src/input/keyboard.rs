//! Keyboard input handling

use hashbrown::HashSet;
use winit::keyboard::KeyCode;

use retroshell_shared::KeyMask;

use super::{InputSource, KeySink, KeyboardMapping};

/// Edge-triggered keyboard source.
///
/// OS auto-repeat produces repeated "pressed" events for a held key; those
/// are ignored so the sink only sees real transitions.
#[derive(Debug, Clone)]
pub struct KeyboardInput {
    mapping: KeyboardMapping,
    held: HashSet<KeyCode>,
    mask: KeyMask,
}

impl KeyboardInput {
    pub fn new(mapping: KeyboardMapping) -> Self {
        Self {
            mapping,
            held: HashSet::new(),
            mask: KeyMask::empty(),
        }
    }

    /// Buttons currently held on the keyboard.
    pub fn mask(&self) -> KeyMask {
        self.mask
    }

    pub fn mapping(&self) -> &KeyboardMapping {
        &self.mapping
    }

    /// Swap in a new mapping. Held keys are released first.
    pub fn set_mapping(&mut self, mapping: KeyboardMapping, sink: &mut dyn KeySink) {
        self.release_all(sink);
        self.mapping = mapping;
    }

    /// Handle a key event. Returns true if it was bound to a button.
    pub fn key_event(&mut self, key: KeyCode, pressed: bool, sink: &mut dyn KeySink) -> bool {
        let Some(button) = self.mapping.button_for(key) else {
            return false;
        };

        let changed = if pressed {
            self.held.insert(key)
        } else {
            self.held.remove(&key)
        };
        if !changed {
            return true;
        }

        let next = self.mask.with_button(button, pressed);
        if next != self.mask {
            self.mask = next;
            sink.change_key(InputSource::Keyboard, button, pressed);
        }
        true
    }

    /// Release every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self, sink: &mut dyn KeySink) {
        self.held.clear();
        if !self.mask.is_empty() {
            self.mask = KeyMask::empty();
            sink.change_key_state(InputSource::Keyboard, KeyMask::empty());
        }
    }
}
