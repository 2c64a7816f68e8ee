//! Undo log: a stack of pre-image line states.
//!
//! The session records the state before each mutating command; `undo` pops
//! back to it. The log never survives past a `read_line` call.

use crate::line::LineState;

#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    snapshots: Vec<LineState>,
}

impl UndoLog {
    pub fn new() -> Self {
        UndoLog::default()
    }

    /// Push a pre-image, unless it equals the current top.
    pub fn record(&mut self, state: &LineState) {
        if self.snapshots.last() != Some(state) {
            self.snapshots.push(state.clone());
        }
    }

    /// Pop the most recent pre-image.
    pub fn undo(&mut self) -> Option<LineState> {
        self.snapshots.pop()
    }

    /// Drop everything; called at each read_line boundary.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_restores_pre_image() {
        let mut log = UndoLog::new();
        let before = LineState::from_parts("ab", "");
        log.record(&before);
        let _after = before.insert_char('c');
        assert_eq!(log.undo(), Some(before));
        assert_eq!(log.undo(), None);
    }

    #[test]
    fn duplicate_records_collapse() {
        let mut log = UndoLog::new();
        let s = LineState::from_parts("x", "");
        log.record(&s);
        log.record(&s);
        assert_eq!(log.undo(), Some(s));
        assert!(log.is_empty());
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = UndoLog::new();
        log.record(&LineState::from_parts("a", ""));
        log.clear();
        assert!(log.is_empty());
    }
}
