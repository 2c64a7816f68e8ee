//! Trie-based matcher mapping terminal byte sequences to key events.
//!
//! The key parser needs to know, for any buffered byte sequence, whether it
//! is a complete escape sequence, a prefix of a longer one (wait for more
//! bytes), or recognizably invalid (flush and reinterpret). A trie answers
//! all three questions in a single walk.

use crate::key::{FnKey, KeyEvent};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct TrieNode {
    event: Option<KeyEvent>,
    children: BTreeMap<u8, TrieNode>,
}

impl TrieNode {
    fn new() -> Self {
        TrieNode {
            event: None,
            children: BTreeMap::new(),
        }
    }
}

/// Result of matching a byte sequence against the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// The sequence is exactly one known key.
    Exact(KeyEvent),
    /// The sequence is a proper prefix of one or more known keys.
    Prefix,
    /// No known key starts with this sequence.
    NoMatch,
}

/// The longest known key found at the start of a byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongestMatch {
    pub event: KeyEvent,
    pub consumed: usize,
}

/// Byte-sequence → key-event trie preloaded with the common VT100/xterm/rxvt
/// encodings.
pub struct SequenceMatcher {
    root: TrieNode,
}

impl SequenceMatcher {
    pub fn new() -> Self {
        let mut matcher = SequenceMatcher {
            root: TrieNode::new(),
        };
        matcher.build_standard_sequences();
        matcher
    }

    /// Classify `bytes` as an exact key, a prefix of one, or neither.
    pub fn match_sequence(&self, bytes: &[u8]) -> MatchResult {
        if bytes.is_empty() {
            return MatchResult::NoMatch;
        }
        match self.find_node(bytes) {
            Some(node) => match node.event {
                Some(ev) => MatchResult::Exact(ev),
                None => MatchResult::Prefix,
            },
            None => MatchResult::NoMatch,
        }
    }

    /// Longest known key at the start of `bytes`, used when a timed-out
    /// partial sequence has to be salvaged.
    pub fn find_longest_match(&self, bytes: &[u8]) -> Option<LongestMatch> {
        let mut longest = None;
        let mut node = &self.root;
        for (i, &byte) in bytes.iter().enumerate() {
            node = node.children.get(&byte)?;
            if let Some(ev) = node.event {
                longest = Some(LongestMatch {
                    event: ev,
                    consumed: i + 1,
                });
            }
        }
        longest
    }

    /// True if some longer known sequence starts with `bytes`.
    pub fn is_extensible(&self, bytes: &[u8]) -> bool {
        self.find_node(bytes)
            .map(|node| !node.children.is_empty())
            .unwrap_or(false)
    }

    fn find_node(&self, bytes: &[u8]) -> Option<&TrieNode> {
        let mut node = &self.root;
        for &byte in bytes {
            node = node.children.get(&byte)?;
        }
        Some(node)
    }

    /// Register a sequence, overriding any existing mapping.
    pub fn insert(&mut self, bytes: &[u8], event: KeyEvent) {
        let mut node = &mut self.root;
        for &byte in bytes {
            node = node.children.entry(byte).or_insert_with(TrieNode::new);
        }
        node.event = Some(event);
    }

    fn build_standard_sequences(&mut self) {
        use FnKey::*;

        // Single-byte controls. Ctrl-I/M/J are reported as Tab/Enter; the
        // disciplines that care bind both spellings.
        self.insert(&[0x1b], KeyEvent::fun(Escape));
        self.insert(&[0x00], KeyEvent::ctrl(' '));
        for b in 0x01u8..=0x1a {
            let ev = match b {
                0x09 => KeyEvent::fun(Tab),
                0x0a | 0x0d => KeyEvent::fun(Enter),
                _ => KeyEvent::ctrl((b'a' + b - 1) as char),
            };
            self.insert(&[b], ev);
        }
        self.insert(&[0x1c], KeyEvent::ctrl('\\'));
        self.insert(&[0x1d], KeyEvent::ctrl(']'));
        self.insert(&[0x1e], KeyEvent::ctrl('^'));
        self.insert(&[0x1f], KeyEvent::ctrl('_'));
        self.insert(&[0x7f], KeyEvent::fun(Backspace));

        // Arrows, CSI and SS3 variants.
        self.insert(b"\x1b[A", KeyEvent::fun(Up));
        self.insert(b"\x1b[B", KeyEvent::fun(Down));
        self.insert(b"\x1b[C", KeyEvent::fun(Right));
        self.insert(b"\x1b[D", KeyEvent::fun(Left));
        self.insert(b"\x1bOA", KeyEvent::fun(Up));
        self.insert(b"\x1bOB", KeyEvent::fun(Down));
        self.insert(b"\x1bOC", KeyEvent::fun(Right));
        self.insert(b"\x1bOD", KeyEvent::fun(Left));

        // Home/End variants.
        self.insert(b"\x1b[H", KeyEvent::fun(Home));
        self.insert(b"\x1b[F", KeyEvent::fun(End));
        self.insert(b"\x1bOH", KeyEvent::fun(Home));
        self.insert(b"\x1bOF", KeyEvent::fun(End));
        self.insert(b"\x1b[1~", KeyEvent::fun(Home));
        self.insert(b"\x1b[4~", KeyEvent::fun(End));
        self.insert(b"\x1b[7~", KeyEvent::fun(Home));
        self.insert(b"\x1b[8~", KeyEvent::fun(End));

        // Editing keys.
        self.insert(b"\x1b[2~", KeyEvent::fun(Insert));
        self.insert(b"\x1b[3~", KeyEvent::fun(Delete));
        self.insert(b"\x1b[3;5~", KeyEvent::fun(Delete).with_ctrl());
        self.insert(b"\x1b[5~", KeyEvent::fun(PageUp));
        self.insert(b"\x1b[6~", KeyEvent::fun(PageDown));
        self.insert(b"\x1b[Z", KeyEvent::fun(Tab).with_shift());

        // Modified arrows (xterm `CSI 1;m X` and the short rxvt forms).
        self.insert(b"\x1b[1;5A", KeyEvent::fun(Up).with_ctrl());
        self.insert(b"\x1b[1;5B", KeyEvent::fun(Down).with_ctrl());
        self.insert(b"\x1b[1;5C", KeyEvent::fun(Right).with_ctrl());
        self.insert(b"\x1b[1;5D", KeyEvent::fun(Left).with_ctrl());
        self.insert(b"\x1b[5A", KeyEvent::fun(Up).with_ctrl());
        self.insert(b"\x1b[5B", KeyEvent::fun(Down).with_ctrl());
        self.insert(b"\x1b[5C", KeyEvent::fun(Right).with_ctrl());
        self.insert(b"\x1b[5D", KeyEvent::fun(Left).with_ctrl());
        self.insert(b"\x1b[1;2A", KeyEvent::fun(Up).with_shift());
        self.insert(b"\x1b[1;2B", KeyEvent::fun(Down).with_shift());
        self.insert(b"\x1b[1;2C", KeyEvent::fun(Right).with_shift());
        self.insert(b"\x1b[1;2D", KeyEvent::fun(Left).with_shift());
        self.insert(b"\x1b[1;3A", KeyEvent::fun(Up).with_meta());
        self.insert(b"\x1b[1;3B", KeyEvent::fun(Down).with_meta());
        self.insert(b"\x1b[1;3C", KeyEvent::fun(Right).with_meta());
        self.insert(b"\x1b[1;3D", KeyEvent::fun(Left).with_meta());

        // Function keys F1-F12 (SS3 and CSI variants).
        self.insert(b"\x1bOP", KeyEvent::fun(F(1)));
        self.insert(b"\x1bOQ", KeyEvent::fun(F(2)));
        self.insert(b"\x1bOR", KeyEvent::fun(F(3)));
        self.insert(b"\x1bOS", KeyEvent::fun(F(4)));
        self.insert(b"\x1b[11~", KeyEvent::fun(F(1)));
        self.insert(b"\x1b[12~", KeyEvent::fun(F(2)));
        self.insert(b"\x1b[13~", KeyEvent::fun(F(3)));
        self.insert(b"\x1b[14~", KeyEvent::fun(F(4)));
        self.insert(b"\x1b[15~", KeyEvent::fun(F(5)));
        self.insert(b"\x1b[17~", KeyEvent::fun(F(6)));
        self.insert(b"\x1b[18~", KeyEvent::fun(F(7)));
        self.insert(b"\x1b[19~", KeyEvent::fun(F(8)));
        self.insert(b"\x1b[20~", KeyEvent::fun(F(9)));
        self.insert(b"\x1b[21~", KeyEvent::fun(F(10)));
        self.insert(b"\x1b[23~", KeyEvent::fun(F(11)));
        self.insert(b"\x1b[24~", KeyEvent::fun(F(12)));
    }
}

impl Default for SequenceMatcher {
    fn default() -> Self {
        Self::new()
    }
}
