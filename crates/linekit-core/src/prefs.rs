//! User preferences and the lenient prefs-file parser.
//!
//! The prefs file is a flat `key: value` list in the spirit of `inputrc`:
//! unknown keys are ignored, malformed values fall back to the default for
//! that key, and nothing in it can fail a session.

use crate::discipline::EditMode;
use crate::history::HistoryDedup;
use std::fs;
use std::io;
use std::path::Path;

/// How Tab presents multiple candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionType {
    /// Always list candidates below the line.
    #[default]
    List,
    /// Cycle through candidates inline on repeated Tab.
    Menu,
    /// List on the first Tab, then cycle.
    ListOrMenu,
}

/// What "ring the bell" does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BellStyle {
    None,
    Visual,
    #[default]
    Audible,
}

/// Session preferences. All fields have sensible defaults; a prefs file or
/// the embedding program may override any subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Prefs {
    pub edit_mode: EditMode,
    pub completion_type: CompletionType,
    /// Candidate count above which listing asks
    /// `Display all N possibilities? (y/n)` first.
    pub completion_prompt_limit: Option<usize>,
    pub max_history_size: usize,
    pub history_duplicates: HistoryDedup,
    /// Lines starting with a space stay out of history.
    pub history_ignore_space: bool,
    pub auto_add_history: bool,
    pub bell_style: BellStyle,
}

impl Default for Prefs {
    fn default() -> Self {
        Prefs {
            edit_mode: EditMode::Emacs,
            completion_type: CompletionType::default(),
            completion_prompt_limit: Some(100),
            max_history_size: crate::history::DEFAULT_HISTORY_SIZE,
            history_duplicates: HistoryDedup::default(),
            history_ignore_space: false,
            auto_add_history: true,
            bell_style: BellStyle::default(),
        }
    }
}

impl Prefs {
    /// Parse prefs text, ignoring anything unrecognized.
    pub fn parse_str(text: &str) -> Prefs {
        let mut prefs = Prefs::default();
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':').or_else(|| line.split_once('=')) else {
                continue;
            };
            prefs.apply(key.trim(), value.trim());
        }
        prefs
    }

    /// Load a prefs file; a missing or unreadable file is an error, but any
    /// content parses (leniently).
    pub fn load(path: &Path) -> io::Result<Prefs> {
        Ok(Self::parse_str(&fs::read_to_string(path)?))
    }

    fn apply(&mut self, key: &str, value: &str) {
        let value_lower = value.to_ascii_lowercase();
        match key.to_ascii_lowercase().as_str() {
            "editmode" => match value_lower.as_str() {
                "emacs" => self.edit_mode = EditMode::Emacs,
                "vi" => self.edit_mode = EditMode::Vi,
                _ => {}
            },
            "completiontype" => match value_lower.as_str() {
                "listcompletion" => self.completion_type = CompletionType::List,
                "menucompletion" => self.completion_type = CompletionType::Menu,
                "listcompletionormenu" => self.completion_type = CompletionType::ListOrMenu,
                _ => {}
            },
            "completionpromptlimit" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.completion_prompt_limit = Some(n);
                }
            }
            "maxhistorysize" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.max_history_size = n.max(1);
                }
            }
            "historyduplicates" => match value_lower.as_str() {
                "none" => self.history_duplicates = HistoryDedup::None,
                "consecutive" => self.history_duplicates = HistoryDedup::Consecutive,
                "all" => self.history_duplicates = HistoryDedup::All,
                _ => {}
            },
            "historyignorespace" => {
                if let Some(b) = parse_bool(&value_lower) {
                    self.history_ignore_space = b;
                }
            }
            "autoaddhistory" => {
                if let Some(b) = parse_bool(&value_lower) {
                    self.auto_add_history = b;
                }
            }
            "bellstyle" => match value_lower.as_str() {
                "none" => self.bell_style = BellStyle::None,
                "visual" => self.bell_style = BellStyle::Visual,
                "audible" => self.bell_style = BellStyle::Audible,
                _ => {}
            },
            _ => {}
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
