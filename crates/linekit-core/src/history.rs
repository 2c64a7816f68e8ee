//! Command history: bounded in-memory store, optional file persistence,
//! navigation cursor, and substring search for the incremental reverse
//! search UI.
//!
//! The persisted format is deliberately plain: UTF-8, one entry per line,
//! oldest first. Concurrent sessions share the file only at load/save
//! boundaries; the last writer wins.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Which duplicate entries `add` refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryDedup {
    /// Keep everything.
    None,
    /// Drop an entry equal to the most recent one.
    #[default]
    Consecutive,
    /// Drop the older copy whenever a duplicate is added.
    All,
}

pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Bounded, newest-last history list.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    max_size: usize,
    dedup: HistoryDedup,
    /// Classic readline `ignorespace`: lines starting with a space are not
    /// recorded.
    ignore_space: bool,
}

impl History {
    pub fn new() -> Self {
        History {
            entries: VecDeque::new(),
            max_size: DEFAULT_HISTORY_SIZE,
            dedup: HistoryDedup::default(),
            ignore_space: false,
        }
    }

    pub fn with_config(max_size: usize, dedup: HistoryDedup, ignore_space: bool) -> Self {
        History {
            entries: VecDeque::new(),
            max_size: max_size.max(1),
            dedup,
            ignore_space,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by index, 0 = oldest.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.as_str())
    }

    /// Record a completed line, honoring the dedup and ignore-space
    /// policies. Returns whether the line was stored.
    pub fn add(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        if self.ignore_space && line.starts_with(' ') {
            return false;
        }
        match self.dedup {
            HistoryDedup::None => {}
            HistoryDedup::Consecutive => {
                if self.entries.back().map(|s| s.as_str()) == Some(line) {
                    return false;
                }
            }
            HistoryDedup::All => {
                self.entries.retain(|s| s != line);
            }
        }
        self.entries.push_back(line.to_string());
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
        true
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append entries from a history file (one per line, oldest first).
    /// Returns how many were loaded.
    pub fn load(&mut self, path: &Path) -> io::Result<usize> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut loaded = 0;
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                self.entries.push_back(line);
                loaded += 1;
            }
        }
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
        Ok(loaded)
    }

    /// Truncate and rewrite the history file, capped at the configured
    /// size. Entries containing a newline cannot round-trip through the
    /// line-oriented format and are skipped.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        for entry in &self.entries {
            if entry.contains('\n') {
                continue;
            }
            writeln!(file, "{entry}")?;
        }
        file.flush()
    }

    /// Newest entry at or below `below` (entry index) containing `query`.
    /// Returns the entry index and the byte offset of the match within it.
    pub fn search_backward(&self, query: &str, below: usize) -> Option<(usize, usize)> {
        if query.is_empty() || self.entries.is_empty() {
            return None;
        }
        let start = below.min(self.entries.len() - 1);
        for idx in (0..=start).rev() {
            if let Some(offset) = self.entries[idx].find(query) {
                return Some((idx, offset));
            }
        }
        None
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-`read_line` navigation position within the history.
///
/// `None` is the "past the end" slot holding the user's in-progress line;
/// moving up stashes that line so moving back down restores it.
#[derive(Debug, Clone, Default)]
pub struct HistoryCursor {
    pos: Option<usize>,
    stash: String,
}

impl HistoryCursor {
    pub fn new() -> Self {
        HistoryCursor::default()
    }

    /// Step to an older entry. `current` is the text being edited right
    /// now, stashed on first departure. Returns the text to display, or
    /// `None` when already at the oldest entry.
    pub fn back<'h>(&mut self, history: &'h History, current: &str) -> Option<&'h str> {
        match self.pos {
            None => {
                if history.is_empty() {
                    return None;
                }
                self.stash = current.to_string();
                self.pos = Some(history.len() - 1);
            }
            Some(0) => return None,
            Some(p) => self.pos = Some(p - 1),
        }
        history.get(self.pos.expect("position set above"))
    }

    /// Step to a newer entry; past the newest restores the stashed
    /// in-progress line. Returns `None` when already past the end.
    pub fn forward(&mut self, history: &History) -> Option<String> {
        match self.pos {
            None => None,
            Some(p) if p + 1 < history.len() => {
                self.pos = Some(p + 1);
                history.get(p + 1).map(|s| s.to_string())
            }
            Some(_) => {
                self.pos = None;
                Some(std::mem::take(&mut self.stash))
            }
        }
    }

    /// Jump to the oldest entry.
    pub fn to_first<'h>(&mut self, history: &'h History, current: &str) -> Option<&'h str> {
        if history.is_empty() {
            return None;
        }
        if self.pos.is_none() {
            self.stash = current.to_string();
        }
        self.pos = Some(0);
        history.get(0)
    }

    /// Jump past the newest entry, restoring the in-progress line.
    pub fn to_last(&mut self) -> Option<String> {
        match self.pos.take() {
            Some(_) => Some(std::mem::take(&mut self.stash)),
            None => None,
        }
    }

    /// Current entry index; `None` while editing the in-progress line.
    pub fn position(&self) -> Option<usize> {
        self.pos
    }

    /// Forget any saved position (new `read_line`).
    pub fn reset(&mut self) {
        self.pos = None;
        self.stash.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(entries: &[&str]) -> History {
        let mut h = History::with_config(100, HistoryDedup::None, false);
        for e in entries {
            h.add(e);
        }
        h
    }

    #[test]
    fn add_appends_newest_last() {
        let h = history_with(&["a", "b"]);
        assert_eq!(h.get(0), Some("a"));
        assert_eq!(h.get(1), Some("b"));
    }

    #[test]
    fn consecutive_dedup_never_leaves_adjacent_equals() {
        let mut h = History::with_config(100, HistoryDedup::Consecutive, false);
        for line in ["x", "x", "y", "x", "x", "x"] {
            h.add(line);
        }
        let all: Vec<&str> = h.iter().collect();
        assert_eq!(all, vec!["x", "y", "x"]);
        for pair in all.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn dedup_all_keeps_only_newest_copy() {
        let mut h = History::with_config(100, HistoryDedup::All, false);
        for line in ["a", "b", "a", "c"] {
            h.add(line);
        }
        let all: Vec<&str> = h.iter().collect();
        assert_eq!(all, vec!["b", "a", "c"]);
    }

    #[test]
    fn max_size_drops_oldest() {
        let mut h = History::with_config(2, HistoryDedup::None, false);
        for line in ["a", "b", "c"] {
            h.add(line);
        }
        let all: Vec<&str> = h.iter().collect();
        assert_eq!(all, vec!["b", "c"]);
    }

    #[test]
    fn ignore_space_skips_leading_space_lines() {
        let mut h = History::with_config(100, HistoryDedup::None, true);
        assert!(!h.add(" secret"));
        assert!(h.add("visible"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history");
        let h = history_with(&["one", "two", "three"]);
        h.save(&path).expect("save");

        let mut loaded = History::with_config(100, HistoryDedup::None, false);
        loaded.load(&path).expect("load");
        assert_eq!(loaded.iter().collect::<Vec<_>>(), vec!["one", "two", "three"]);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let mut h = History::new();
        assert!(h.load(Path::new("/nonexistent/history")).is_err());
    }

    #[test]
    fn search_backward_prefers_newest() {
        let h = history_with(&["grep foo", "ls", "grep bar"]);
        assert_eq!(h.search_backward("grep", usize::MAX), Some((2, 0)));
        // Stepping older from just below the last match.
        assert_eq!(h.search_backward("grep", 1), Some((0, 0)));
        assert_eq!(h.search_backward("nope", usize::MAX), None);
    }

    #[test]
    fn cursor_walks_back_and_restores_stash() {
        let h = history_with(&["first", "second"]);
        let mut cursor = HistoryCursor::new();
        assert_eq!(cursor.back(&h, "draft"), Some("second"));
        assert_eq!(cursor.back(&h, "second"), Some("first"));
        // At the oldest entry, back is a no-op.
        assert_eq!(cursor.back(&h, "first"), None);
        assert_eq!(cursor.forward(&h), Some("second".to_string()));
        assert_eq!(cursor.forward(&h), Some("draft".to_string()));
        assert_eq!(cursor.forward(&h), None);
    }

    #[test]
    fn cursor_jumps() {
        let h = history_with(&["first", "second"]);
        let mut cursor = HistoryCursor::new();
        assert_eq!(cursor.to_first(&h, "draft"), Some("first"));
        assert_eq!(cursor.to_last(), Some("draft".to_string()));
        assert_eq!(cursor.to_last(), None);
    }
}
