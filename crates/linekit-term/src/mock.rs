//! Scripted mock back-end for tests.
//!
//! [`ScriptedInput`] replays a fixed event sequence and reports EOF when it
//! runs out; [`CapturedOutput`] records every primitive the renderer
//! invokes. Both halves expose shared handles so a test can keep observing
//! after handing boxed trait objects to a session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linekit_core::prefs::BellStyle;
use linekit_core::{KeyEvent, TermEvent};

use crate::{BackendKind, Capabilities, RawModeGuard, TermInput, TermOutput, TermResult};

/// Queue-backed input; shared so tests can append while a session runs.
pub struct ScriptedInput {
    events: Arc<Mutex<VecDeque<TermEvent>>>,
    size: (u16, u16),
}

impl ScriptedInput {
    pub fn new() -> Self {
        ScriptedInput {
            events: Arc::new(Mutex::new(VecDeque::new())),
            size: (80, 24),
        }
    }

    pub fn with_size(cols: u16, rows: u16) -> Self {
        ScriptedInput {
            events: Arc::new(Mutex::new(VecDeque::new())),
            size: (cols, rows),
        }
    }

    /// Handle for queueing events after the input has been boxed.
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            events: Arc::clone(&self.events),
        }
    }

    pub fn push_event(&self, event: TermEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn push_key(&self, key: KeyEvent) {
        self.push_event(TermEvent::Key(key));
    }

    /// Queue each character of `text` as a key press.
    pub fn push_text(&self, text: &str) {
        for c in text.chars() {
            self.push_key(KeyEvent::ch(c));
        }
    }
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable writer side of a [`ScriptedInput`].
#[derive(Clone)]
pub struct ScriptHandle {
    events: Arc<Mutex<VecDeque<TermEvent>>>,
}

impl ScriptHandle {
    pub fn push_event(&self, event: TermEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn push_key(&self, key: KeyEvent) {
        self.push_event(TermEvent::Key(key));
    }

    pub fn push_text(&self, text: &str) {
        for c in text.chars() {
            self.push_key(KeyEvent::ch(c));
        }
    }
}

impl TermInput for ScriptedInput {
    fn enable_raw_mode(&mut self) -> TermResult<RawModeGuard> {
        Ok(RawModeGuard::noop())
    }

    fn next_event(&mut self, _timeout: Option<Duration>) -> TermResult<Option<TermEvent>> {
        let mut events = self.events.lock().unwrap();
        Ok(Some(events.pop_front().unwrap_or(TermEvent::Eof)))
    }

    fn window_size(&self) -> TermResult<(u16, u16)> {
        Ok(self.size)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BackendKind::Mock,
            is_interactive: true,
            supports_cursor_motion: true,
        }
    }
}

/// One recorded output primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputOp {
    Text(String),
    Reversed(String),
    MoveRel(i16, i16),
    CarriageReturn,
    ClearToEol,
    ClearToEos,
    ClearScreen,
    Bell(bool),
    Flush,
}

/// Output that records operations instead of drawing.
#[derive(Clone)]
pub struct CapturedOutput {
    ops: Arc<Mutex<Vec<OutputOp>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        CapturedOutput {
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn ops(&self) -> Vec<OutputOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// All text written, concatenated (including reversed-video spans).
    pub fn written_text(&self) -> String {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                OutputOp::Text(t) | OutputOp::Reversed(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn bell_count(&self) -> usize {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, OutputOp::Bell(_)))
            .count()
    }

    fn record(&self, op: OutputOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl Default for CapturedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TermOutput for CapturedOutput {
    fn write_text(&mut self, text: &str) -> TermResult<()> {
        self.record(OutputOp::Text(text.to_string()));
        Ok(())
    }

    fn write_reversed(&mut self, text: &str) -> TermResult<()> {
        self.record(OutputOp::Reversed(text.to_string()));
        Ok(())
    }

    fn move_cursor_rel(&mut self, rows: i16, cols: i16) -> TermResult<()> {
        self.record(OutputOp::MoveRel(rows, cols));
        Ok(())
    }

    fn carriage_return(&mut self) -> TermResult<()> {
        self.record(OutputOp::CarriageReturn);
        Ok(())
    }

    fn clear_to_eol(&mut self) -> TermResult<()> {
        self.record(OutputOp::ClearToEol);
        Ok(())
    }

    fn clear_to_eos(&mut self) -> TermResult<()> {
        self.record(OutputOp::ClearToEos);
        Ok(())
    }

    fn clear_screen(&mut self) -> TermResult<()> {
        self.record(OutputOp::ClearScreen);
        Ok(())
    }

    fn bell(&mut self, style: BellStyle) -> TermResult<()> {
        self.record(OutputOp::Bell(style == BellStyle::Audible));
        Ok(())
    }

    fn flush(&mut self) -> TermResult<()> {
        self.record(OutputOp::Flush);
        Ok(())
    }
}
