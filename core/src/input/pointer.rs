//! On-screen button input (mouse and touch)

use hashbrown::HashMap;

use retroshell_shared::{Button, KeyMask};

use super::{InputSource, KeySink};

/// Identifies one pointer: a finger, or the mouse.
pub type PointerId = u64;

/// Tracks which on-screen button each active pointer is holding.
///
/// A button stays pressed while any pointer is on it, so lifting one of two
/// fingers on the same button does not release it.
#[derive(Debug, Clone, Default)]
pub struct PointerInput {
    active: HashMap<PointerId, Button>,
    mask: KeyMask,
}

impl PointerInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> KeyMask {
        self.mask
    }

    /// A pointer went down on (or slid onto) `button`.
    pub fn pointer_down(&mut self, id: PointerId, button: Button, sink: &mut dyn KeySink) {
        self.active.insert(id, button);
        self.sync(sink);
    }

    /// A pointer was lifted or left its button.
    pub fn pointer_up(&mut self, id: PointerId, sink: &mut dyn KeySink) {
        if self.active.remove(&id).is_some() {
            self.sync(sink);
        }
    }

    /// Lift every pointer, e.g. on touch cancel.
    pub fn cancel_all(&mut self, sink: &mut dyn KeySink) {
        self.active.clear();
        self.sync(sink);
    }

    fn sync(&mut self, sink: &mut dyn KeySink) {
        let mask = self
            .active
            .values()
            .fold(KeyMask::empty(), |acc, b| acc | b.mask());
        if mask != self.mask {
            self.mask = mask;
            sink.change_key_state(InputSource::Pointer, mask);
        }
    }
}
