//! Core engines for the linekit line editor.
//!
//! This crate holds everything that is pure with respect to the terminal:
//! key definitions and the byte-level key parser, the cursor-split line
//! state with its editing operations, the kill ring and undo log, the
//! prefix-trie key maps with the Emacs bindings and the Vi state machine,
//! the history store, the completion engine, and user preferences. The
//! platform back-ends live in `linekit-term` and the session driver in
//! `linekit`.

pub mod command;
pub mod completion;
pub mod discipline;
pub mod emacs;
pub mod history;
pub mod key;
pub mod key_parser;
pub mod keymap;
pub mod kill_ring;
pub mod line;
pub mod prefs;
pub mod sequence_matcher;
pub mod undo;
pub mod unicode;
pub mod vi;

pub use command::{Anchor, Cmd, DispatchStep, RepeatCount};
pub use completion::{
    filename_completer, Completer, Completion, FallbackCompleter, QuotedWordCompleter,
    WordCompleter,
};
pub use discipline::{Discipline, EditMode};
pub use emacs::emacs_keymap;
pub use history::{History, HistoryCursor, HistoryDedup};
pub use key::{FnKey, Key, KeyEvent, TermEvent};
pub use key_parser::KeyParser;
pub use keymap::{KeyMap, KeyMatch, TrieDispatcher};
pub use kill_ring::{KillDirection, KillRing};
pub use line::{At, LineState, Movement, Word};
pub use prefs::{BellStyle, CompletionType, Prefs};
pub use sequence_matcher::{LongestMatch, MatchResult, SequenceMatcher};
pub use undo::UndoLog;
pub use vi::{ViMachine, ViOp, ViState};
