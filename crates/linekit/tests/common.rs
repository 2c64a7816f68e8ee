//! Shared helpers for driving a full session against the scripted mock
//! terminal.

#![allow(dead_code)]

use linekit::{Prefs, Session, Settings};
use linekit_core::{FnKey, KeyEvent};
use linekit_term::mock::{CapturedOutput, ScriptedInput};

pub fn enter() -> KeyEvent {
    KeyEvent::fun(FnKey::Enter)
}

pub fn esc() -> KeyEvent {
    KeyEvent::fun(FnKey::Escape)
}

pub fn tab() -> KeyEvent {
    KeyEvent::fun(FnKey::Tab)
}

pub fn up() -> KeyEvent {
    KeyEvent::fun(FnKey::Up)
}

pub fn backspace() -> KeyEvent {
    KeyEvent::fun(FnKey::Backspace)
}

/// Build a session over a scripted input; `keys` queues the events before
/// the session starts pulling them.
pub fn scripted_session(
    prefs: Prefs,
    settings: Settings,
    keys: impl FnOnce(&ScriptedInput),
) -> (Session, CapturedOutput) {
    let input = ScriptedInput::new();
    keys(&input);
    let output = CapturedOutput::new();
    let session = Session::with_backend(
        Box::new(input),
        Box::new(output.clone()),
        prefs,
        settings,
    );
    (session, output)
}
