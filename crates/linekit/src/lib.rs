//! linekit — a portable, embeddable line editor.
//!
//! linekit reads edited input from a terminal the way `readline` does:
//! Emacs or Vi key bindings, a kill ring with yank/yank-pop, undo, history
//! with incremental reverse search, word/filename completion with quote and
//! escape handling, and multi-line prompt rendering with wide-character
//! support. It runs over a VT terminal, a dumb terminal or the Windows
//! console, and degrades to plain buffered reads when stdio is not a
//! terminal.
//!
//! # Example
//!
//! ```no_run
//! use linekit::prelude::*;
//!
//! fn main() -> Result<(), ReadlineError> {
//!     let settings = Settings::new().with_history_file(".demo_history");
//!     Session::run(Prefs::default(), settings, |session| {
//!         while let Some(line) = session.read_line("> ")? {
//!             session.output_line(&format!("you said: {line}"))?;
//!         }
//!         Ok(())
//!     })
//! }
//! ```

pub mod error;
pub mod prelude;
pub mod render;
pub mod session;

pub use error::ReadlineError;
pub use render::Renderer;
pub use session::{LogSink, Session, Settings};

// The core vocabulary most embedders need.
pub use linekit_core::{
    BellStyle, Completer, Completion, CompletionType, EditMode, History, HistoryDedup, KeyEvent,
    LineState, Prefs,
};
