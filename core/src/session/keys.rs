//! Per-source key masks combined into the mask the core sees

use retroshell_shared::{Button, KeyMask};

use crate::input::InputSource;

/// One mask per input source plus the last combined value sent to the core.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceKeys {
    sources: [KeyMask; 3],
    forwarded: KeyMask,
}

impl SourceKeys {
    /// Set one button on one source. Returns the new combined mask if it changed.
    pub fn change_key(
        &mut self,
        source: InputSource,
        button: Button,
        pressed: bool,
    ) -> Option<KeyMask> {
        let slot = &mut self.sources[source.index()];
        *slot = slot.with_button(button, pressed);
        self.combine()
    }

    /// Replace one source's mask. Returns the new combined mask if it changed.
    pub fn change_key_state(&mut self, source: InputSource, mask: KeyMask) -> Option<KeyMask> {
        self.sources[source.index()] = mask;
        self.combine()
    }

    /// Clear every source. Returns an empty mask if something was held.
    pub fn release_all(&mut self) -> Option<KeyMask> {
        self.sources = [KeyMask::empty(); 3];
        self.combine()
    }

    /// Mask last forwarded to the core.
    pub fn combined(&self) -> KeyMask {
        self.forwarded
    }

    fn combine(&mut self) -> Option<KeyMask> {
        let combined = self
            .sources
            .iter()
            .fold(KeyMask::empty(), |acc, mask| acc | *mask);
        (combined != self.forwarded).then(|| {
            self.forwarded = combined;
            combined
        })
    }
}
