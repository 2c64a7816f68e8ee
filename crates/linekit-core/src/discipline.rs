//! The two editing disciplines behind one dispatch interface.

use crate::command::{Cmd, DispatchStep};
use crate::emacs::emacs_keymap;
use crate::key::KeyEvent;
use crate::keymap::{KeyMap, TrieDispatcher};
use crate::vi::ViMachine;

/// Which discipline a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Emacs,
    Vi,
}

/// A live discipline: either the Emacs trie dispatcher or the Vi machine.
pub enum Discipline {
    Emacs(TrieDispatcher<Cmd>),
    Vi(ViMachine),
}

impl Discipline {
    pub fn new(mode: EditMode) -> Self {
        match mode {
            EditMode::Emacs => Discipline::Emacs(TrieDispatcher::new(emacs_keymap())),
            EditMode::Vi => Discipline::Vi(ViMachine::new()),
        }
    }

    /// An Emacs discipline with extra bindings layered over the defaults.
    pub fn emacs_with(overrides: KeyMap<Cmd>) -> Self {
        let mut map = emacs_keymap();
        map.merge(overrides);
        Discipline::Emacs(TrieDispatcher::new(map))
    }

    pub fn handle(&mut self, ev: KeyEvent) -> Vec<DispatchStep> {
        match self {
            Discipline::Emacs(d) => d.handle(ev).into_iter().map(|s| s.into()).collect(),
            Discipline::Vi(m) => m.handle(ev),
        }
    }

    /// Resolve any buffered multi-key prefix (inter-key timeout fired).
    pub fn flush(&mut self) -> Vec<DispatchStep> {
        match self {
            Discipline::Emacs(d) => d.flush().into_iter().map(|s| s.into()).collect(),
            Discipline::Vi(_) => Vec::new(),
        }
    }

    /// True while a multi-key sequence is buffered.
    pub fn has_pending(&self) -> bool {
        match self {
            Discipline::Emacs(d) => d.has_pending(),
            Discipline::Vi(_) => false,
        }
    }

    /// True when the Vi machine is in a state where the cursor rests ON a
    /// character (command/operator/replace), so the session clamps the
    /// cursor left of end-of-line.
    pub fn vi_command_state(&self) -> bool {
        match self {
            Discipline::Emacs(_) => false,
            Discipline::Vi(m) => m.in_command_state(),
        }
    }

    /// Per-line reset (Vi returns to insert state).
    pub fn reset(&mut self) {
        if let Discipline::Vi(m) = self {
            m.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Movement;

    #[test]
    fn emacs_discipline_dispatches_bindings() {
        let mut d = Discipline::new(EditMode::Emacs);
        let steps = d.handle(KeyEvent::ctrl('a'));
        assert_eq!(
            steps,
            vec![DispatchStep::Cmd(Cmd::Move(Movement::BeginningOfLine))]
        );
    }

    #[test]
    fn emacs_overrides_take_precedence() {
        let mut extra = KeyMap::new();
        extra.bind_key(KeyEvent::ctrl('a'), Cmd::Beep);
        let mut d = Discipline::emacs_with(extra);
        assert_eq!(
            d.handle(KeyEvent::ctrl('a')),
            vec![DispatchStep::Cmd(Cmd::Beep)]
        );
    }

    #[test]
    fn vi_discipline_reports_command_state() {
        let mut d = Discipline::new(EditMode::Vi);
        assert!(!d.vi_command_state());
        d.handle(KeyEvent::fun(crate::key::FnKey::Escape));
        assert!(d.vi_command_state());
        d.reset();
        assert!(!d.vi_command_state());
    }
}
