//! One-stop imports for embedding linekit.

pub use crate::error::ReadlineError;
pub use crate::session::{Session, Settings};

pub use linekit_core::completion::{
    filename_completer, Completer, Completion, FallbackCompleter, QuotedWordCompleter,
    WordCompleter,
};
pub use linekit_core::{BellStyle, CompletionType, EditMode, History, HistoryDedup, Prefs};
