//! The Vi editing discipline as an explicit state machine.
//!
//! Vi is modal, so a trie is the wrong shape for it: the meaning of a key
//! depends on the machine's state, not just the preceding keys. The states
//! are tagged variants with exhaustive transitions:
//!
//! ```text
//! Insert  --Esc-->      Command
//! Command --i/a/I/A/o-> Insert
//! Command --d|c|y-->    PendingOperator(op)
//! PendingOperator --motion--> execute, Command (Insert if op = change)
//! Command --r-->        PendingReplace
//! PendingReplace --ch--> apply, Command
//! ```

use crate::command::{Anchor, Cmd, DispatchStep, RepeatCount};
use crate::key::{FnKey, Key, KeyEvent};
use crate::line::{At, Movement, Word};

/// An operator waiting for its motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViOp {
    Delete,
    Change,
    Yank,
}

impl ViOp {
    /// The key that, doubled, applies the operator to the whole line.
    fn key(self) -> char {
        match self {
            ViOp::Delete => 'd',
            ViOp::Change => 'c',
            ViOp::Yank => 'y',
        }
    }
}

/// Machine state. `PendingOperator` and `PendingReplace` carry the count
/// typed before the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViState {
    Insert,
    Command,
    PendingOperator(ViOp, RepeatCount),
    PendingReplace(RepeatCount),
}

/// The Vi key machine: feeds on key events, yields dispatch steps.
#[derive(Debug, Clone)]
pub struct ViMachine {
    state: ViState,
    /// Pending count digits; 0 means "no count typed".
    count: usize,
}

impl ViMachine {
    pub fn new() -> Self {
        ViMachine {
            state: ViState::Insert,
            count: 0,
        }
    }

    /// Back to insert state with no pending count; called at every
    /// `read_line` boundary.
    pub fn reset(&mut self) {
        self.state = ViState::Insert;
        self.count = 0;
    }

    pub fn state(&self) -> ViState {
        self.state
    }

    /// True when the cursor sits ON a character rather than between two
    /// (the session clamps the cursor accordingly).
    pub fn in_command_state(&self) -> bool {
        !matches!(self.state, ViState::Insert)
    }

    pub fn handle(&mut self, ev: KeyEvent) -> Vec<DispatchStep> {
        match self.state {
            ViState::Insert => self.insert_key(ev),
            ViState::Command => self.command_key(ev),
            ViState::PendingOperator(op, n) => self.operator_key(op, n, ev),
            ViState::PendingReplace(n) => self.replace_key(n, ev),
        }
    }

    fn take_count(&mut self) -> usize {
        let n = if self.count == 0 { 1 } else { self.count };
        self.count = 0;
        n
    }

    fn insert_key(&mut self, ev: KeyEvent) -> Vec<DispatchStep> {
        use FnKey::*;
        let cmd = match ev.key {
            Key::Fn(Escape) if !ev.ctrl && !ev.meta => {
                self.state = ViState::Command;
                Cmd::Move(Movement::BackwardChar(1))
            }
            Key::Fn(Enter) => Cmd::AcceptLine,
            Key::Fn(Tab) if !ev.shift => Cmd::Complete,
            Key::Fn(Backspace) => Cmd::Delete(Movement::BackwardChar(1)),
            Key::Fn(Delete) => Cmd::Delete(Movement::ForwardChar(1)),
            Key::Fn(Left) => Cmd::Move(Movement::BackwardChar(1)),
            Key::Fn(Right) => Cmd::Move(Movement::ForwardChar(1)),
            Key::Fn(Home) => Cmd::Move(Movement::BeginningOfLine),
            Key::Fn(End) => Cmd::Move(Movement::EndOfLine),
            Key::Fn(Up) => Cmd::HistoryPrev,
            Key::Fn(Down) => Cmd::HistoryNext,
            Key::Char('h') if ev.ctrl => Cmd::Delete(Movement::BackwardChar(1)),
            Key::Char('d') if ev.ctrl => Cmd::DeleteOrEof,
            Key::Char('u') if ev.ctrl => Cmd::Kill(Movement::BeginningOfLine),
            Key::Char('w') if ev.ctrl => Cmd::Kill(Movement::BackwardWord(1, Word::Big)),
            Key::Char('y') if ev.ctrl => Cmd::Yank(1, Anchor::Before),
            Key::Char('r') if ev.ctrl => Cmd::ReverseSearch,
            Key::Char('l') if ev.ctrl => Cmd::ClearScreen,
            Key::Char(_) => return vec![DispatchStep::Unbound(ev)],
            _ => return vec![DispatchStep::Unbound(ev)],
        };
        vec![DispatchStep::Cmd(cmd)]
    }

    fn command_key(&mut self, ev: KeyEvent) -> Vec<DispatchStep> {
        use FnKey::*;

        if ev.meta {
            return vec![DispatchStep::Cmd(Cmd::Beep)];
        }

        // Count digits. A leading 0 is the line-start motion instead.
        if let Some(d) = plain_digit(&ev) {
            if d != 0 || self.count > 0 {
                self.count = self.count.saturating_mul(10).saturating_add(d);
                return vec![DispatchStep::Pending];
            }
        }

        let n = self.take_count();
        let cmd = match (ev.key, ev.ctrl) {
            (Key::Fn(Enter), _) => Cmd::AcceptLine,
            (Key::Fn(Escape), false) => Cmd::Noop,
            (Key::Fn(Tab), _) => Cmd::Complete,

            // Motions.
            (Key::Char('h'), false) | (Key::Fn(Backspace), _) | (Key::Fn(Left), _) => {
                Cmd::Move(Movement::BackwardChar(n))
            }
            (Key::Char('h'), true) => Cmd::Move(Movement::BackwardChar(n)),
            (Key::Char('l'), false) | (Key::Char(' '), false) | (Key::Fn(Right), _) => {
                Cmd::Move(Movement::ForwardChar(n))
            }
            (Key::Char('0'), false) | (Key::Fn(Home), _) => Cmd::Move(Movement::BeginningOfLine),
            (Key::Char('$'), false) | (Key::Fn(End), _) => Cmd::Move(Movement::EndOfLine),
            (Key::Char('^'), false) => Cmd::Move(Movement::FirstNonBlank),
            (Key::Char('w'), false) => Cmd::Move(Movement::ForwardWord(n, At::Start, Word::Vi)),
            (Key::Char('W'), false) => Cmd::Move(Movement::ForwardWord(n, At::Start, Word::Big)),
            (Key::Char('e'), false) => {
                Cmd::Move(Movement::ForwardWord(n, At::BeforeEnd, Word::Vi))
            }
            (Key::Char('E'), false) => {
                Cmd::Move(Movement::ForwardWord(n, At::BeforeEnd, Word::Big))
            }
            (Key::Char('b'), false) => Cmd::Move(Movement::BackwardWord(n, Word::Vi)),
            (Key::Char('B'), false) => Cmd::Move(Movement::BackwardWord(n, Word::Big)),

            // History.
            (Key::Char('j'), false) | (Key::Fn(Down), _) => Cmd::HistoryNext,
            (Key::Char('n'), true) => Cmd::HistoryNext,
            (Key::Char('k'), false) | (Key::Fn(Up), _) => Cmd::HistoryPrev,
            (Key::Char('p'), true) => Cmd::HistoryPrev,

            // Operators.
            (Key::Char('d'), false) => {
                self.state = ViState::PendingOperator(ViOp::Delete, n);
                return vec![DispatchStep::Pending];
            }
            (Key::Char('c'), false) => {
                self.state = ViState::PendingOperator(ViOp::Change, n);
                return vec![DispatchStep::Pending];
            }
            (Key::Char('y'), false) => {
                self.state = ViState::PendingOperator(ViOp::Yank, n);
                return vec![DispatchStep::Pending];
            }
            (Key::Char('D'), false) => Cmd::Kill(Movement::EndOfLine),
            (Key::Char('C'), false) => {
                self.state = ViState::Insert;
                Cmd::Kill(Movement::EndOfLine)
            }
            (Key::Char('Y'), false) => Cmd::CopyToKillRing(Movement::WholeLine),
            (Key::Char('S'), false) => {
                self.state = ViState::Insert;
                Cmd::Kill(Movement::WholeLine)
            }
            (Key::Char('s'), false) => {
                self.state = ViState::Insert;
                Cmd::Kill(Movement::ForwardChar(n))
            }

            // Deletes and paste.
            (Key::Char('x'), false) | (Key::Fn(Delete), _) => {
                Cmd::Kill(Movement::ForwardChar(n))
            }
            (Key::Char('X'), false) => Cmd::Kill(Movement::BackwardChar(n)),
            (Key::Char('p'), false) => Cmd::Yank(n, Anchor::After),
            (Key::Char('P'), false) => Cmd::Yank(n, Anchor::Before),

            (Key::Char('u'), false) => Cmd::Undo,

            // Insert-state entries.
            (Key::Char('i'), false) => {
                self.state = ViState::Insert;
                Cmd::Noop
            }
            (Key::Char('I'), false) => {
                self.state = ViState::Insert;
                Cmd::Move(Movement::FirstNonBlank)
            }
            (Key::Char('a'), false) => {
                self.state = ViState::Insert;
                Cmd::Move(Movement::ForwardChar(1))
            }
            // In a single-line buffer, open-line degenerates to append at
            // end of line.
            (Key::Char('A'), false) | (Key::Char('o'), false) => {
                self.state = ViState::Insert;
                Cmd::Move(Movement::EndOfLine)
            }

            (Key::Char('r'), false) => {
                self.state = ViState::PendingReplace(n);
                return vec![DispatchStep::Pending];
            }

            (Key::Char('/'), false) | (Key::Char('?'), false) => Cmd::ReverseSearch,
            (Key::Char('r'), true) => Cmd::ReverseSearch,
            (Key::Char('l'), true) => Cmd::ClearScreen,
            (Key::Char('d'), true) => Cmd::DeleteOrEof,

            _ => Cmd::Beep,
        };
        vec![DispatchStep::Cmd(cmd)]
    }

    fn operator_key(&mut self, op: ViOp, n1: RepeatCount, ev: KeyEvent) -> Vec<DispatchStep> {
        // Counts typed after the operator multiply the one before it.
        if let Some(d) = plain_digit(&ev) {
            if d != 0 || self.count > 0 {
                self.count = self.count.saturating_mul(10).saturating_add(d);
                self.state = ViState::PendingOperator(op, n1);
                return vec![DispatchStep::Pending];
            }
        }
        let n = n1.saturating_mul(self.take_count());
        self.state = ViState::Command;

        let movement = match ev.key {
            Key::Char(c) if c == op.key() && !ev.ctrl && !ev.meta => Some(Movement::WholeLine),
            Key::Char('h') | Key::Fn(FnKey::Backspace) => Some(Movement::BackwardChar(n)),
            Key::Char('l') | Key::Char(' ') => Some(Movement::ForwardChar(n)),
            Key::Char('0') => Some(Movement::BeginningOfLine),
            Key::Char('$') => Some(Movement::EndOfLine),
            Key::Char('^') => Some(Movement::FirstNonBlank),
            // `cw` acts like `ce`, per vi tradition.
            Key::Char('w') => Some(match op {
                ViOp::Change => Movement::ForwardWord(n, At::AfterEnd, Word::Vi),
                _ => Movement::ForwardWord(n, At::Start, Word::Vi),
            }),
            Key::Char('W') => Some(match op {
                ViOp::Change => Movement::ForwardWord(n, At::AfterEnd, Word::Big),
                _ => Movement::ForwardWord(n, At::Start, Word::Big),
            }),
            Key::Char('e') => Some(Movement::ForwardWord(n, At::AfterEnd, Word::Vi)),
            Key::Char('E') => Some(Movement::ForwardWord(n, At::AfterEnd, Word::Big)),
            Key::Char('b') => Some(Movement::BackwardWord(n, Word::Vi)),
            Key::Char('B') => Some(Movement::BackwardWord(n, Word::Big)),
            Key::Fn(FnKey::Escape) => None,
            _ => None,
        };

        let step = match movement {
            Some(m) => {
                let cmd = match op {
                    ViOp::Delete => Cmd::Kill(m),
                    ViOp::Change => {
                        self.state = ViState::Insert;
                        Cmd::Kill(m)
                    }
                    ViOp::Yank => Cmd::CopyToKillRing(m),
                };
                DispatchStep::Cmd(cmd)
            }
            None => {
                let cancelled = matches!(ev.key, Key::Fn(FnKey::Escape));
                DispatchStep::Cmd(if cancelled { Cmd::Noop } else { Cmd::Beep })
            }
        };
        vec![step]
    }

    fn replace_key(&mut self, n: RepeatCount, ev: KeyEvent) -> Vec<DispatchStep> {
        self.state = ViState::Command;
        let cmd = match ev.plain_char() {
            Some(c) if !c.is_control() => Cmd::Replace(n, c),
            _ => Cmd::Noop,
        };
        vec![DispatchStep::Cmd(cmd)]
    }
}

impl Default for ViMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn plain_digit(ev: &KeyEvent) -> Option<usize> {
    match ev.plain_char() {
        Some(c) => c.to_digit(10).map(|d| d as usize),
        None => None,
    }
}
