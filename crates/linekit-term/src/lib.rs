//! Terminal back-ends for linekit.
//!
//! Three real back-ends share one pair of traits: the Unix VT back-end
//! (termios raw mode, ANSI output, poll-multiplexed input and signals), the
//! dumb fallback (no cursor motion; the renderer scrolls a single line
//! horizontally), and the Windows console back-end (direct console API).
//! A scripted mock back-end drives the integration tests.
//!
//! Input is a pull stream: [`TermInput::next_event`] blocks (with an
//! optional timeout) until a key, signal, resize or EOF arrives. Signals
//! are folded into the same ordered stream as keys, so the session's
//! dispatcher sees exactly one sequence of events.

use linekit_core::prefs::BellStyle;
use linekit_core::TermEvent;
use std::fmt;
use std::time::Duration;

#[cfg(unix)]
pub mod dumb;
pub mod mock;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

/// Back-end flavor, mostly for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    UnixVt,
    Dumb,
    WindowsConsole,
    Mock,
}

/// What a back-end can do; the renderer adapts to this.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub backend: BackendKind,
    /// False when stdin/stdout is not a terminal; the session then falls
    /// back to plain buffered reads with no editing.
    pub is_interactive: bool,
    /// False for dumb terminals: no cursor addressing, no clears.
    pub supports_cursor_motion: bool,
}

/// Terminal back-end errors.
#[derive(Debug, Clone)]
pub enum TermError {
    /// Underlying I/O failure.
    Io(String),
    /// Stdin or stdout is not a terminal.
    NotATty,
    /// The back-end cannot perform the requested primitive.
    Unsupported { what: &'static str },
    /// Terminal setup or teardown failed.
    Setup(String),
}

impl fmt::Display for TermError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermError::Io(msg) => write!(f, "terminal I/O error: {msg}"),
            TermError::NotATty => write!(f, "not a terminal"),
            TermError::Unsupported { what } => {
                write!(f, "operation not supported by this terminal: {what}")
            }
            TermError::Setup(msg) => write!(f, "terminal setup failed: {msg}"),
        }
    }
}

impl std::error::Error for TermError {}

pub type TermResult<T> = Result<T, TermError>;

/// RAII guard holding the terminal in raw mode.
///
/// Restoration runs exactly once: on drop, or earlier via
/// [`restore`](RawModeGuard::restore). Every exit path out of a session,
/// including panics, unwinds through the guard.
pub struct RawModeGuard {
    restore_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl RawModeGuard {
    pub fn new<F>(restore_fn: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        RawModeGuard {
            restore_fn: Some(Box::new(restore_fn)),
        }
    }

    /// A guard with nothing to restore (mock back-end).
    pub fn noop() -> Self {
        RawModeGuard { restore_fn: None }
    }

    /// Restore eagerly instead of waiting for drop.
    pub fn restore(mut self) {
        if let Some(f) = self.restore_fn.take() {
            f();
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Some(f) = self.restore_fn.take() {
            f();
        }
    }
}

/// The input half of a back-end: raw-mode control and the event stream.
pub trait TermInput {
    /// Enter raw mode; dropping the returned guard restores the exact
    /// previous terminal attributes.
    fn enable_raw_mode(&mut self) -> TermResult<RawModeGuard>;

    /// Next event, in arrival order. `None` means the timeout expired with
    /// no event; `timeout: None` blocks indefinitely.
    fn next_event(&mut self, timeout: Option<Duration>) -> TermResult<Option<TermEvent>>;

    /// Current window size as (columns, rows).
    fn window_size(&self) -> TermResult<(u16, u16)>;

    fn capabilities(&self) -> Capabilities;

    /// Deliver the pending stop to the process group (after the caller has
    /// dropped raw mode); returns once the process is continued.
    fn suspend_process(&mut self) -> TermResult<()> {
        Ok(())
    }
}

/// The output half: the primitives the renderer composes.
pub trait TermOutput {
    /// Write text at the cursor. In raw mode `\n` does not imply `\r`; the
    /// renderer writes explicit `\r\n` pairs.
    fn write_text(&mut self, text: &str) -> TermResult<()>;

    /// Write text in reverse video (used to highlight search matches).
    fn write_reversed(&mut self, text: &str) -> TermResult<()>;

    /// Move the cursor relative to its position: negative rows go up,
    /// negative cols go left.
    fn move_cursor_rel(&mut self, rows: i16, cols: i16) -> TermResult<()>;

    /// Return the cursor to column 0 of the current row.
    fn carriage_return(&mut self) -> TermResult<()>;

    fn clear_to_eol(&mut self) -> TermResult<()>;
    fn clear_to_eos(&mut self) -> TermResult<()>;

    /// Clear the whole screen and home the cursor.
    fn clear_screen(&mut self) -> TermResult<()>;

    fn bell(&mut self, style: BellStyle) -> TermResult<()>;

    /// Push buffered bytes to the device.
    fn flush(&mut self) -> TermResult<()>;
}

/// Construct the platform back-end for the process's stdio.
///
/// On Unix this picks the VT back-end, or the dumb back-end when `TERM` is
/// unset or `dumb`; [`TermError::NotATty`] is returned when stdio is not a
/// terminal so the caller can fall back to non-interactive reads. On
/// Windows the console back-end is used unconditionally.
pub fn stdio_backend() -> TermResult<(Box<dyn TermInput>, Box<dyn TermOutput>, Capabilities)> {
    #[cfg(unix)]
    {
        unix::stdio_backend()
    }
    #[cfg(windows)]
    {
        windows::stdio_backend()
    }
    #[cfg(not(any(unix, windows)))]
    {
        Err(TermError::Unsupported {
            what: "platform terminal",
        })
    }
}
