//! Tests for input sources

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use retroshell_shared::{Button, KeyMask};
use winit::keyboard::KeyCode;

use super::gamepad::map_buttons;
use super::keycode_serde::{keycode_to_string, string_to_keycode};
use super::*;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Key(InputSource, Button, bool),
    State(InputSource, KeyMask),
}

#[derive(Default)]
struct RecordingSink {
    calls: Vec<Call>,
}

impl KeySink for RecordingSink {
    fn change_key(&mut self, source: InputSource, button: Button, pressed: bool) {
        self.calls.push(Call::Key(source, button, pressed));
    }

    fn change_key_state(&mut self, source: InputSource, mask: KeyMask) {
        self.calls.push(Call::State(source, mask));
    }
}

/// Pad that replays a script of poll results, then reports no pad.
#[derive(Clone, Default)]
struct ScriptedPad(Rc<RefCell<VecDeque<Option<PadButtons>>>>);

impl ScriptedPad {
    fn push(&self, state: Option<PadButtons>) {
        self.0.borrow_mut().push_back(state);
    }
}

impl PadSource for ScriptedPad {
    fn poll(&mut self) -> Option<PadButtons> {
        self.0.borrow_mut().pop_front().flatten()
    }
}

fn pad(indices: &[usize]) -> Option<PadButtons> {
    Some(
        indices
            .iter()
            .fold(PadButtons::empty(), |acc, i| acc.with(*i, true)),
    )
}

// =============================================================
// Key names and mapping
// =============================================================

#[test]
fn test_keycode_names_roundtrip() {
    assert_eq!(keycode_to_string(&KeyCode::KeyA), "A");
    assert_eq!(keycode_to_string(&KeyCode::ArrowUp), "ArrowUp");
    assert_eq!(keycode_to_string(&KeyCode::F24), "F24");
    assert_eq!(string_to_keycode("F24"), Some(KeyCode::F24));
    assert_eq!(string_to_keycode("Unknown"), None);
    assert_eq!(string_to_keycode("enter"), Some(KeyCode::Enter));
    assert_eq!(string_to_keycode("ShiftRight"), Some(KeyCode::ShiftRight));
    assert_eq!(string_to_keycode(""), None);
}

#[test]
fn test_keyboard_mapping_toml_roundtrip() {
    let mapping = KeyboardMapping::default();
    let toml_str = toml::to_string(&mapping).unwrap();
    assert!(toml_str.contains("up = \"ArrowUp\""));
    assert!(toml_str.contains("start = \"Enter\""));

    let parsed: KeyboardMapping = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed, mapping);
}

#[test]
fn test_custom_binding_survives_save_and_load() {
    let mapping = KeyboardMapping {
        a: KeyCode::F13,
        select: KeyCode::NumpadAdd,
        ..Default::default()
    };
    let toml_str = toml::to_string(&mapping).unwrap();
    assert!(toml_str.contains("a = \"F13\""));
    assert!(toml_str.contains("select = \"NumpadAdd\""));

    let parsed: KeyboardMapping = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed, mapping);
}

#[test]
fn test_keyboard_mapping_partial_and_invalid() {
    let parsed: KeyboardMapping = toml::from_str("a = \"J\"\nb = \"K\"").unwrap();
    assert_eq!(parsed.a, KeyCode::KeyJ);
    assert_eq!(parsed.b, KeyCode::KeyK);
    assert_eq!(parsed.up, KeyCode::ArrowUp);

    assert!(toml::from_str::<KeyboardMapping>("a = \"NotAKey\"").is_err());
}

#[test]
fn test_mapping_lookup_and_conflicts() {
    let mut mapping = KeyboardMapping::default();
    assert_eq!(mapping.button_for(KeyCode::KeyX), Some(Button::A));
    assert_eq!(mapping.button_for(KeyCode::KeyQ), None);
    assert!(mapping.conflicts().is_empty());

    mapping.start = mapping.a;
    assert_eq!(mapping.conflicts(), vec![Button::Start]);
}

// =============================================================
// Keyboard
// =============================================================

#[test]
fn test_keyboard_is_edge_triggered() {
    let mut keyboard = KeyboardInput::new(KeyboardMapping::default());
    let mut sink = RecordingSink::default();

    assert!(keyboard.key_event(KeyCode::KeyX, true, &mut sink));
    // OS auto-repeat
    assert!(keyboard.key_event(KeyCode::KeyX, true, &mut sink));
    assert!(keyboard.key_event(KeyCode::KeyX, true, &mut sink));
    assert!(keyboard.key_event(KeyCode::KeyX, false, &mut sink));
    assert!(keyboard.key_event(KeyCode::KeyX, false, &mut sink));

    assert_eq!(
        sink.calls,
        vec![
            Call::Key(InputSource::Keyboard, Button::A, true),
            Call::Key(InputSource::Keyboard, Button::A, false),
        ]
    );
}

#[test]
fn test_keyboard_ignores_unbound_keys() {
    let mut keyboard = KeyboardInput::new(KeyboardMapping::default());
    let mut sink = RecordingSink::default();
    assert!(!keyboard.key_event(KeyCode::KeyQ, true, &mut sink));
    assert!(sink.calls.is_empty());
}

#[test]
fn test_keyboard_release_all() {
    let mut keyboard = KeyboardInput::new(KeyboardMapping::default());
    let mut sink = RecordingSink::default();
    keyboard.key_event(KeyCode::ArrowUp, true, &mut sink);
    keyboard.key_event(KeyCode::Enter, true, &mut sink);
    assert_eq!(keyboard.mask(), KeyMask::UP | KeyMask::START);

    keyboard.release_all(&mut sink);
    keyboard.release_all(&mut sink);
    assert_eq!(keyboard.mask(), KeyMask::empty());
    assert_eq!(
        sink.calls.last(),
        Some(&Call::State(InputSource::Keyboard, KeyMask::empty()))
    );
    assert_eq!(sink.calls.len(), 3);
}

// =============================================================
// Pointer
// =============================================================

#[test]
fn test_pointer_tracks_fingers_per_button() {
    let mut pointer = PointerInput::new();
    let mut sink = RecordingSink::default();

    pointer.pointer_down(1, Button::A, &mut sink);
    pointer.pointer_down(2, Button::A, &mut sink);
    pointer.pointer_up(1, &mut sink);
    assert_eq!(pointer.mask(), KeyMask::A);

    pointer.pointer_down(3, Button::Left, &mut sink);
    pointer.pointer_up(2, &mut sink);
    pointer.pointer_up(99, &mut sink);
    pointer.pointer_up(3, &mut sink);

    assert_eq!(
        sink.calls,
        vec![
            Call::State(InputSource::Pointer, KeyMask::A),
            Call::State(InputSource::Pointer, KeyMask::A | KeyMask::LEFT),
            Call::State(InputSource::Pointer, KeyMask::LEFT),
            Call::State(InputSource::Pointer, KeyMask::empty()),
        ]
    );
}

// =============================================================
// Gamepad
// =============================================================

#[test]
fn test_standard_mapping() {
    assert_eq!(map_buttons(PadButtons::empty()), KeyMask::empty());
    assert_eq!(
        map_buttons(pad(&[0, 9, 12, 3]).unwrap_or_default()),
        KeyMask::A | KeyMask::START | KeyMask::UP
    );
    assert!(!PadButtons::empty().with(40, true).is_pressed(40));
}

#[test]
fn test_gamepad_forwards_only_changes() {
    let script = ScriptedPad::default();
    let mut gamepad = GamepadInput::new(script.clone());
    let mut sink = RecordingSink::default();

    for state in [pad(&[0]), pad(&[0]), pad(&[0, 2]), pad(&[0, 13]), pad(&[])] {
        script.push(state);
    }
    for _ in 0..5 {
        gamepad.poll(&mut sink);
    }

    assert_eq!(
        sink.calls,
        vec![
            Call::State(InputSource::Gamepad, KeyMask::A),
            Call::State(InputSource::Gamepad, KeyMask::A | KeyMask::DOWN),
            Call::State(InputSource::Gamepad, KeyMask::empty()),
        ]
    );
}

#[test]
fn test_missing_gamepad_degrades_quietly() {
    let script = ScriptedPad::default();
    let mut gamepad = GamepadInput::new(script.clone());
    let mut sink = RecordingSink::default();

    gamepad.poll(&mut sink);
    assert!(!gamepad.is_connected());
    assert!(sink.calls.is_empty());

    // Unplugged while a button was held
    script.push(pad(&[1]));
    script.push(None);
    gamepad.poll(&mut sink);
    assert!(gamepad.is_connected());
    gamepad.poll(&mut sink);
    assert!(!gamepad.is_connected());

    assert_eq!(
        sink.calls,
        vec![
            Call::State(InputSource::Gamepad, KeyMask::B),
            Call::State(InputSource::Gamepad, KeyMask::empty()),
        ]
    );
}

// =============================================================
// Aggregator
// =============================================================

#[test]
fn test_aggregator_routes_sources() {
    let script = ScriptedPad::default();
    let config = InputConfig::default();
    let mut input = InputAggregator::with_pad(&config, Box::new(script.clone()));
    let mut sink = RecordingSink::default();

    input.key(KeyCode::KeyZ, true, &mut sink);
    input.pointer_down(7, Button::Select, &mut sink);
    script.push(pad(&[15]));
    input.poll_gamepad(&mut sink);
    input.release_all(&mut sink);

    assert_eq!(
        sink.calls,
        vec![
            Call::Key(InputSource::Keyboard, Button::B, true),
            Call::State(InputSource::Pointer, KeyMask::SELECT),
            Call::State(InputSource::Gamepad, KeyMask::RIGHT),
            Call::State(InputSource::Keyboard, KeyMask::empty()),
            Call::State(InputSource::Pointer, KeyMask::empty()),
        ]
    );
    assert!(input.gamepad_connected());
}

#[test]
fn test_aggregator_without_gamepad() {
    let config = InputConfig {
        gamepad: false,
        ..Default::default()
    };
    let mut input = InputAggregator::new(&config);
    let mut sink = RecordingSink::default();
    input.poll_gamepad(&mut sink);
    assert!(sink.calls.is_empty());
    assert!(!input.gamepad_connected());
}
