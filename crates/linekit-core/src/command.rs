//! The editing command vocabulary shared by both disciplines.
//!
//! Key maps and the Vi state machine translate key events into [`Cmd`]
//! values; the session interprets them against the line state, kill ring,
//! undo log, history and completer. Keeping the vocabulary flat means the
//! Emacs trie and the Vi modal machine can feed one interpreter.

use crate::line::Movement;

/// Numeric prefix applied to a command.
pub type RepeatCount = usize;

/// Where yanked text lands relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Insert at the cursor (Emacs `C-y`, Vi `P`).
    Before,
    /// Insert after the character under the cursor (Vi `p`).
    After,
}

/// One editing command.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    /// Insert a character `n` times.
    SelfInsert(RepeatCount, char),
    /// Insert a string as-is (paste).
    Insert(String),
    /// Move the cursor.
    Move(Movement),
    /// Delete to a motion target, pushing the text onto the kill ring.
    Kill(Movement),
    /// Delete to a motion target without touching the kill ring
    /// (single-character deletes).
    Delete(Movement),
    /// `C-d`: end-of-input on an empty line, forward delete otherwise.
    DeleteOrEof,
    /// Insert the kill-ring head.
    Yank(RepeatCount, Anchor),
    /// Replace the last yank with the next ring entry. Only valid directly
    /// after a yank; the session enforces the gate.
    YankPop,
    /// Copy to a motion target onto the kill ring without deleting (Vi `y`).
    CopyToKillRing(Movement),
    Undo,
    TransposeChars,
    ClearScreen,
    AcceptLine,
    Complete,
    HistoryPrev,
    HistoryNext,
    BeginningOfHistory,
    EndOfHistory,
    ReverseSearch,
    /// Replace the character under the cursor `n` times (Vi `r`).
    Replace(RepeatCount, char),
    /// Ring the bell.
    Beep,
    Noop,
}

/// What the dispatcher produced for one incoming key event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchStep {
    /// A complete command.
    Cmd(Cmd),
    /// The event extended a multi-key sequence; wait for more (or for the
    /// inter-key timeout).
    Pending,
    /// No binding consumed the event. The session self-inserts printable
    /// characters and beeps otherwise.
    Unbound(crate::key::KeyEvent),
}
