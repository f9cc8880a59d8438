//! Synthesized Command-key chords posted through Core Graphics.

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use textlift::{Error, KeyChord, KeySynthesizer, Result};
use tracing::trace;

const KEY_A: CGKeyCode = 0;
const KEY_C: CGKeyCode = 8;
const KEY_V: CGKeyCode = 9;

/// Virtual key code for the letter half of a chord.
#[must_use]
pub const fn key_code(chord: KeyChord) -> CGKeyCode {
    match chord {
        KeyChord::Copy => KEY_C,
        KeyChord::Paste => KEY_V,
        KeyChord::SelectAll => KEY_A,
    }
}

/// [`KeySynthesizer`] that posts key events at the HID tap.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacKeyboard;

impl MacKeyboard {
    /// Create a keyboard synthesizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn post(source: &CGEventSource, code: CGKeyCode, down: bool) -> Result<()> {
        let event = CGEvent::new_keyboard_event(source.clone(), code, down)
            .map_err(|()| Error::key_synthesis("could not create keyboard event"))?;
        event.set_flags(CGEventFlags::CGEventFlagCommand);
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl KeySynthesizer for MacKeyboard {
    fn send(&self, chord: KeyChord) -> Result<()> {
        let source = CGEventSource::new(CGEventSourceStateID::CombinedSessionState)
            .map_err(|()| Error::key_synthesis("could not create event source"))?;
        let code = key_code(chord);
        trace!(%chord, code, "posting key chord");
        Self::post(&source, code, true)?;
        Self::post(&source, code, false)
    }
}
