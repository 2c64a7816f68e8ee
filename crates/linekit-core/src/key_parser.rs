//! State-machine parser turning raw terminal bytes into key events.
//!
//! Terminal input arrives as an undelimited byte stream: printable UTF-8,
//! single control bytes, and multi-byte escape sequences, possibly split
//! across reads. The parser buffers just enough to disambiguate and emits
//! [`KeyEvent`]s as soon as they are certain. Whatever cannot be decided
//! from the bytes alone — a lone ESC that might be the start of an arrow
//! key — is resolved by the back-end calling [`KeyParser::flush`] after its
//! inter-byte timeout expires.

use crate::key::{FnKey, KeyEvent};
use crate::sequence_matcher::{MatchResult, SequenceMatcher};

/// Upper bound on buffered escape-sequence bytes.
const MAX_SEQUENCE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Plain input; no partial sequence pending.
    Normal,
    /// One or more bytes of an escape sequence are buffered.
    EscapeSequence,
    /// A multi-byte UTF-8 character is being accumulated.
    Utf8 { remaining: u8, meta: bool },
}

/// Incremental byte → key-event decoder.
///
/// Feed it whatever arrived from the terminal; it returns the events that
/// became unambiguous. Call [`flush`](KeyParser::flush) when the input has
/// been quiet past the escape timeout (or hit EOF) to force a decision on
/// any buffered partial sequence.
pub struct KeyParser {
    state: ParserState,
    seq: Vec<u8>,
    utf8: Vec<u8>,
    matcher: SequenceMatcher,
}

impl KeyParser {
    pub fn new() -> Self {
        KeyParser {
            state: ParserState::Normal,
            seq: Vec::new(),
            utf8: Vec::new(),
            matcher: SequenceMatcher::new(),
        }
    }

    /// True if a partial sequence is buffered and a timeout should be armed.
    pub fn has_pending(&self) -> bool {
        self.state != ParserState::Normal
    }

    /// Process a chunk of input bytes, returning all completed events.
    pub fn feed(&mut self, data: &[u8]) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        for &byte in data {
            self.feed_byte(byte, &mut events);
        }
        events
    }

    /// Force a decision on any buffered partial sequence.
    ///
    /// A buffered ESC that never grew into a known sequence is emitted as
    /// the `Escape` key followed by its orphan bytes reinterpreted from
    /// scratch; a truncated UTF-8 character becomes U+FFFD.
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        match self.state {
            ParserState::Normal => {}
            ParserState::EscapeSequence => {
                let pending = std::mem::take(&mut self.seq);
                self.state = ParserState::Normal;
                self.resolve_pending(&pending, &mut events);
            }
            ParserState::Utf8 { .. } => {
                self.utf8.clear();
                self.state = ParserState::Normal;
                events.push(KeyEvent::ch(char::REPLACEMENT_CHARACTER));
            }
        }
        events
    }

    /// Discard all buffered state.
    pub fn reset(&mut self) {
        self.state = ParserState::Normal;
        self.seq.clear();
        self.utf8.clear();
    }

    fn feed_byte(&mut self, byte: u8, events: &mut Vec<KeyEvent>) {
        match self.state {
            ParserState::Normal => self.normal_byte(byte, false, events),
            ParserState::EscapeSequence => self.escape_byte(byte, events),
            ParserState::Utf8 { remaining, meta } => {
                self.utf8_byte(byte, remaining, meta, events)
            }
        }
    }

    fn normal_byte(&mut self, byte: u8, meta: bool, events: &mut Vec<KeyEvent>) {
        if byte == 0x1b && !meta {
            self.seq.push(byte);
            self.state = ParserState::EscapeSequence;
            return;
        }
        if byte < 0x80 {
            match self.matcher.match_sequence(&[byte]) {
                MatchResult::Exact(ev) => {
                    events.push(if meta { ev.with_meta() } else { ev });
                }
                _ => {
                    let ev = KeyEvent::ch(byte as char);
                    events.push(if meta { ev.with_meta() } else { ev });
                }
            }
            return;
        }
        // Start of a multi-byte UTF-8 character.
        let len = utf8_len(byte);
        match len {
            Some(n) => {
                self.utf8.clear();
                self.utf8.push(byte);
                self.state = ParserState::Utf8 {
                    remaining: n - 1,
                    meta,
                };
            }
            None => {
                // Stray continuation or invalid lead byte.
                events.push(KeyEvent::ch(char::REPLACEMENT_CHARACTER));
            }
        }
    }

    fn escape_byte(&mut self, byte: u8, events: &mut Vec<KeyEvent>) {
        // ESC followed by a printable character is the meta prefix, unless
        // the two bytes open a known sequence (ESC [ or ESC O).
        if self.seq.len() == 1 {
            let two = [0x1b, byte];
            match self.matcher.match_sequence(&two) {
                MatchResult::Prefix | MatchResult::Exact(_) => {
                    self.seq.push(byte);
                    self.try_complete(events);
                    return;
                }
                MatchResult::NoMatch => {
                    self.seq.clear();
                    self.state = ParserState::Normal;
                    if byte == 0x1b {
                        // ESC ESC: emit one Escape, keep parsing the second.
                        events.push(KeyEvent::fun(FnKey::Escape));
                        self.seq.push(byte);
                        self.state = ParserState::EscapeSequence;
                    } else {
                        self.normal_byte(byte, true, events);
                    }
                    return;
                }
            }
        }

        self.seq.push(byte);
        if self.seq.len() > MAX_SEQUENCE_LEN {
            let pending = std::mem::take(&mut self.seq);
            self.state = ParserState::Normal;
            self.resolve_pending(&pending, events);
            return;
        }
        self.try_complete(events);
    }

    fn try_complete(&mut self, events: &mut Vec<KeyEvent>) {
        match self.matcher.match_sequence(&self.seq) {
            MatchResult::Exact(ev) => {
                // A match that some longer binding extends (ESC itself is the
                // canonical case) stays buffered; the timeout decides it.
                if !self.matcher.is_extensible(&self.seq) {
                    events.push(ev);
                    self.seq.clear();
                    self.state = ParserState::Normal;
                }
            }
            MatchResult::Prefix => {}
            MatchResult::NoMatch => {
                let pending = std::mem::take(&mut self.seq);
                self.state = ParserState::Normal;
                self.resolve_pending(&pending, events);
            }
        }
    }

    /// Emit the longest recognizable head of `pending`, then reinterpret the
    /// rest as fresh input.
    fn resolve_pending(&mut self, pending: &[u8], events: &mut Vec<KeyEvent>) {
        if pending.is_empty() {
            return;
        }
        match self.matcher.find_longest_match(pending) {
            Some(m) => {
                events.push(m.event);
                let rest = pending[m.consumed..].to_vec();
                for byte in rest {
                    self.feed_byte(byte, events);
                }
            }
            None => {
                let mut iter = pending.iter();
                if let Some(&first) = iter.next() {
                    if first < 0x80 && !(first as char).is_control() {
                        events.push(KeyEvent::ch(first as char));
                    } else if first != 0x1b {
                        events.push(KeyEvent::ch(char::REPLACEMENT_CHARACTER));
                    }
                }
                for &byte in iter {
                    self.feed_byte(byte, events);
                }
            }
        }
    }

    fn utf8_byte(&mut self, byte: u8, remaining: u8, meta: bool, events: &mut Vec<KeyEvent>) {
        if byte & 0xc0 != 0x80 {
            // Not a continuation byte: the accumulated character is broken.
            self.utf8.clear();
            self.state = ParserState::Normal;
            events.push(KeyEvent::ch(char::REPLACEMENT_CHARACTER));
            self.feed_byte(byte, events);
            return;
        }
        self.utf8.push(byte);
        if remaining > 1 {
            self.state = ParserState::Utf8 {
                remaining: remaining - 1,
                meta,
            };
            return;
        }
        let ev = match std::str::from_utf8(&self.utf8) {
            Ok(s) => match s.chars().next() {
                Some(c) => KeyEvent::ch(c),
                None => KeyEvent::ch(char::REPLACEMENT_CHARACTER),
            },
            Err(_) => KeyEvent::ch(char::REPLACEMENT_CHARACTER),
        };
        self.utf8.clear();
        self.state = ParserState::Normal;
        events.push(if meta { ev.with_meta() } else { ev });
    }
}

impl Default for KeyParser {
    fn default() -> Self {
        Self::new()
    }
}

fn utf8_len(lead: u8) -> Option<u8> {
    match lead {
        0xc2..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf4 => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::FnKey;

    fn parse(bytes: &[u8]) -> Vec<KeyEvent> {
        let mut parser = KeyParser::new();
        let mut events = parser.feed(bytes);
        events.extend(parser.flush());
        events
    }

    #[test]
    fn plain_ascii() {
        assert_eq!(
            parse(b"hi"),
            vec![KeyEvent::ch('h'), KeyEvent::ch('i')]
        );
    }

    #[test]
    fn control_bytes() {
        assert_eq!(parse(&[0x01]), vec![KeyEvent::ctrl('a')]);
        assert_eq!(parse(&[0x09]), vec![KeyEvent::fun(FnKey::Tab)]);
        assert_eq!(parse(&[0x0d]), vec![KeyEvent::fun(FnKey::Enter)]);
        assert_eq!(parse(&[0x7f]), vec![KeyEvent::fun(FnKey::Backspace)]);
    }

    #[test]
    fn arrow_key_sequence() {
        assert_eq!(parse(b"\x1b[A"), vec![KeyEvent::fun(FnKey::Up)]);
        assert_eq!(parse(b"\x1bOC"), vec![KeyEvent::fun(FnKey::Right)]);
    }

    #[test]
    fn arrow_split_across_feeds() {
        let mut parser = KeyParser::new();
        assert!(parser.feed(b"\x1b").is_empty());
        assert!(parser.has_pending());
        assert!(parser.feed(b"[").is_empty());
        assert_eq!(parser.feed(b"A"), vec![KeyEvent::fun(FnKey::Up)]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn lone_escape_resolved_by_flush() {
        let mut parser = KeyParser::new();
        assert!(parser.feed(b"\x1b").is_empty());
        assert_eq!(parser.flush(), vec![KeyEvent::fun(FnKey::Escape)]);
    }

    #[test]
    fn escape_then_letter_is_meta() {
        assert_eq!(parse(b"\x1bf"), vec![KeyEvent::meta('f')]);
        assert_eq!(parse(b"\x1bd"), vec![KeyEvent::meta('d')]);
    }

    #[test]
    fn escape_escape_emits_both() {
        assert_eq!(
            parse(b"\x1b\x1b"),
            vec![KeyEvent::fun(FnKey::Escape), KeyEvent::fun(FnKey::Escape)]
        );
    }

    #[test]
    fn utf8_multibyte() {
        assert_eq!(parse("é".as_bytes()), vec![KeyEvent::ch('é')]);
        assert_eq!(parse("語".as_bytes()), vec![KeyEvent::ch('語')]);
        assert_eq!(parse("🦀".as_bytes()), vec![KeyEvent::ch('🦀')]);
    }

    #[test]
    fn utf8_split_across_feeds() {
        let bytes = "語".as_bytes();
        let mut parser = KeyParser::new();
        assert!(parser.feed(&bytes[..1]).is_empty());
        assert!(parser.feed(&bytes[1..2]).is_empty());
        assert_eq!(parser.feed(&bytes[2..]), vec![KeyEvent::ch('語')]);
    }

    #[test]
    fn invalid_bytes_become_replacement_char() {
        assert_eq!(
            parse(&[0xff]),
            vec![KeyEvent::ch(char::REPLACEMENT_CHARACTER)]
        );
        // Truncated 3-byte character flushed at timeout.
        let mut parser = KeyParser::new();
        parser.feed(&"語".as_bytes()[..2]);
        assert_eq!(
            parser.flush(),
            vec![KeyEvent::ch(char::REPLACEMENT_CHARACTER)]
        );
    }

    #[test]
    fn unknown_csi_falls_back_to_escape_plus_bytes() {
        let events = parse(b"\x1b[q");
        assert_eq!(events[0], KeyEvent::fun(FnKey::Escape));
        assert!(events.contains(&KeyEvent::ch('q')));
    }

    #[test]
    fn interleaved_sequences_stay_ordered() {
        let events = parse(b"a\x1b[Ab");
        assert_eq!(
            events,
            vec![
                KeyEvent::ch('a'),
                KeyEvent::fun(FnKey::Up),
                KeyEvent::ch('b'),
            ]
        );
    }
}
