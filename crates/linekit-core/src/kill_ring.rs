//! Ring of recently killed text, supporting yank and yank-pop.

use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 10;

/// Which side of the cursor a kill came from. Consecutive kills in the same
/// session of killing glue onto the head entry rather than pushing new ones,
/// and the direction decides which end the new text joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillDirection {
    /// Killed text was left of the cursor (`C-w`, `C-u`): prepend.
    Backward,
    /// Killed text was at/right of the cursor (`C-k`, `M-d`): append.
    Forward,
}

/// Bounded ring of killed strings, most recent at the head.
#[derive(Debug, Clone)]
pub struct KillRing {
    entries: VecDeque<String>,
    capacity: usize,
    /// True while the last command was a kill, so the next kill extends the
    /// head entry instead of pushing.
    chaining: bool,
}

impl KillRing {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        KillRing {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            chaining: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record killed text. While a kill chain is open the text merges into
    /// the head entry; otherwise it becomes a new head.
    pub fn kill(&mut self, text: &str, direction: KillDirection) {
        if text.is_empty() {
            return;
        }
        if self.chaining {
            if let Some(head) = self.entries.front_mut() {
                match direction {
                    KillDirection::Forward => head.push_str(text),
                    KillDirection::Backward => head.insert_str(0, text),
                }
                return;
            }
        }
        self.entries.push_front(text.to_string());
        self.entries.truncate(self.capacity);
        self.chaining = true;
    }

    /// Any command that is not a kill closes the chain.
    pub fn break_chain(&mut self) {
        self.chaining = false;
    }

    /// Most recently killed text.
    pub fn head(&self) -> Option<&str> {
        self.entries.front().map(|s| s.as_str())
    }

    /// Rotate for yank-pop: the head moves to the back and the next entry
    /// becomes current. Returns the new head.
    pub fn rotate(&mut self) -> Option<&str> {
        if self.entries.len() > 1 {
            let head = self.entries.pop_front().expect("nonempty");
            self.entries.push_back(head);
        }
        self.head()
    }
}

impl Default for KillRing {
    fn default() -> Self {
        Self::new()
    }
}
