//! Session-level errors.
//!
//! Only two things escape `read_line`: an interrupt the caller asked to
//! see, and terminal-setup catastrophes. Everything else (encoding noise,
//! completer failures, history I/O, malformed prefs) recovers locally and
//! at most reaches the session's logging sink.

use linekit_term::TermError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadlineError {
    /// SIGINT (or raw Ctrl-C) arrived during input. Catch it with
    /// [`Session::handle_interrupt`](crate::session::Session::handle_interrupt).
    #[error("interrupted")]
    Interrupted,

    /// The terminal back-end failed to set up or perform I/O.
    #[error(transparent)]
    Terminal(#[from] TermError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReadlineError>;
