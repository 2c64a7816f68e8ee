//! Prefix-trie key maps and the event-at-a-time dispatcher.
//!
//! A [`KeyMap`] maps key-event *sequences* to commands, so multi-key
//! bindings (`C-x C-u`) coexist with single keys. The dispatcher feeds one
//! event at a time: while the buffered events are a strict prefix of some
//! binding it reports [`DispatchStep::Pending`] and the caller arms the
//! inter-key timeout; [`TrieDispatcher::flush`] resolves the buffer when
//! that timeout fires.

use crate::command::DispatchStep;
use crate::key::KeyEvent;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct MapNode<C> {
    cmd: Option<C>,
    children: BTreeMap<KeyEvent, MapNode<C>>,
}

impl<C> MapNode<C> {
    fn new() -> Self {
        MapNode {
            cmd: None,
            children: BTreeMap::new(),
        }
    }
}

/// Result of looking up an event sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch<'a, C> {
    /// The sequence is bound to this command.
    Exact(&'a C),
    /// The sequence is a strict prefix of at least one binding.
    Prefix,
    /// Nothing is bound at or below this sequence.
    None,
}

/// Prefix trie over key-event sequences.
#[derive(Debug, Clone)]
pub struct KeyMap<C> {
    root: MapNode<C>,
}

impl<C: Clone> KeyMap<C> {
    pub fn new() -> Self {
        KeyMap {
            root: MapNode::new(),
        }
    }

    /// Bind a sequence to a command, overriding any previous binding of the
    /// exact same sequence.
    pub fn bind(&mut self, seq: &[KeyEvent], cmd: C) {
        let mut node = &mut self.root;
        for ev in seq {
            node = node.children.entry(*ev).or_insert_with(MapNode::new);
        }
        node.cmd = Some(cmd);
    }

    /// Bind a single key.
    pub fn bind_key(&mut self, ev: KeyEvent, cmd: C) {
        self.bind(&[ev], cmd);
    }

    /// Union with `other`; on collisions of the exact same sequence, `other`
    /// wins. Longer sequences always coexist with shorter prefixes (the
    /// more specific match is preferred at dispatch time).
    pub fn merge(&mut self, other: KeyMap<C>) {
        fn walk<C: Clone>(into: &mut MapNode<C>, from: MapNode<C>) {
            if let Some(cmd) = from.cmd {
                into.cmd = Some(cmd);
            }
            for (ev, child) in from.children {
                let slot = into.children.entry(ev).or_insert_with(MapNode::new);
                walk(slot, child);
            }
        }
        walk(&mut self.root, other.root);
    }

    pub fn lookup(&self, seq: &[KeyEvent]) -> KeyMatch<'_, C> {
        let mut node = &self.root;
        for ev in seq {
            match node.children.get(ev) {
                Some(child) => node = child,
                None => return KeyMatch::None,
            }
        }
        match &node.cmd {
            Some(cmd) => KeyMatch::Exact(cmd),
            None => {
                if node.children.is_empty() {
                    KeyMatch::None
                } else {
                    KeyMatch::Prefix
                }
            }
        }
    }

    /// True if some strictly longer binding extends `seq`.
    pub fn is_extensible(&self, seq: &[KeyEvent]) -> bool {
        let mut node = &self.root;
        for ev in seq {
            match node.children.get(ev) {
                Some(child) => node = child,
                None => return false,
            }
        }
        !node.children.is_empty()
    }

    /// Longest bound prefix of `seq` and how many events it consumed.
    pub fn longest_match(&self, seq: &[KeyEvent]) -> Option<(C, usize)> {
        let mut node = &self.root;
        let mut best = None;
        for (i, ev) in seq.iter().enumerate() {
            match node.children.get(ev) {
                Some(child) => {
                    node = child;
                    if let Some(cmd) = &node.cmd {
                        best = Some((cmd.clone(), i + 1));
                    }
                }
                None => break,
            }
        }
        best
    }
}

impl<C: Clone> Default for KeyMap<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful dispatcher walking a [`KeyMap`] one event at a time.
#[derive(Debug, Clone)]
pub struct TrieDispatcher<C> {
    map: KeyMap<C>,
    pending: Vec<KeyEvent>,
}

impl<C: Clone> TrieDispatcher<C> {
    pub fn new(map: KeyMap<C>) -> Self {
        TrieDispatcher {
            map,
            pending: Vec::new(),
        }
    }

    pub fn map(&self) -> &KeyMap<C> {
        &self.map
    }

    /// True while a partial sequence is buffered; the caller should arm the
    /// inter-key timeout and call [`flush`](Self::flush) when it expires.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Feed one event. Returns the steps that became decidable, in order.
    pub fn handle(&mut self, ev: KeyEvent) -> Vec<Step<C>> {
        self.pending.push(ev);
        self.resolve(false)
    }

    /// The inter-key timeout fired: commit the best available
    /// interpretation of the buffered events.
    pub fn flush(&mut self) -> Vec<Step<C>> {
        self.resolve(true)
    }

    fn resolve(&mut self, timed_out: bool) -> Vec<Step<C>> {
        let mut steps = Vec::new();
        loop {
            if self.pending.is_empty() {
                return steps;
            }
            match self.map.lookup(&self.pending) {
                KeyMatch::Exact(cmd) => {
                    // An exact match that a longer binding extends stays
                    // pending until the timeout decides it.
                    if self.map.is_extensible(&self.pending) && !timed_out {
                        steps.push(Step::Pending);
                        return steps;
                    }
                    let cmd = cmd.clone();
                    self.pending.clear();
                    steps.push(Step::Cmd(cmd));
                    return steps;
                }
                KeyMatch::Prefix => {
                    if !timed_out {
                        steps.push(Step::Pending);
                        return steps;
                    }
                    // Timed out inside an unbound prefix: salvage the
                    // longest bound head and reinterpret the rest.
                    match self.map.longest_match(&self.pending) {
                        Some((cmd, consumed)) => {
                            self.pending.drain(..consumed);
                            steps.push(Step::Cmd(cmd));
                        }
                        None => {
                            let ev = self.pending.remove(0);
                            steps.push(Step::Unbound(ev));
                        }
                    }
                }
                KeyMatch::None => match self.map.longest_match(&self.pending) {
                    Some((cmd, consumed)) => {
                        self.pending.drain(..consumed);
                        steps.push(Step::Cmd(cmd));
                    }
                    None => {
                        let ev = self.pending.remove(0);
                        steps.push(Step::Unbound(ev));
                    }
                },
            }
        }
    }
}

/// Dispatcher output, generic over the command type so key maps can hold
/// anything clonable. [`DispatchStep`] is the `Cmd`-specialized alias used
/// by the disciplines.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<C> {
    Cmd(C),
    Pending,
    Unbound(KeyEvent),
}

impl From<Step<crate::command::Cmd>> for DispatchStep {
    fn from(step: Step<crate::command::Cmd>) -> Self {
        match step {
            Step::Cmd(c) => DispatchStep::Cmd(c),
            Step::Pending => DispatchStep::Pending,
            Step::Unbound(ev) => DispatchStep::Unbound(ev),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(c: char) -> KeyEvent {
        KeyEvent::ch(c)
    }

    #[test]
    fn single_key_binding_dispatches_immediately() {
        let mut map = KeyMap::new();
        map.bind_key(KeyEvent::ctrl('a'), 1);
        let mut d = TrieDispatcher::new(map);
        assert_eq!(d.handle(KeyEvent::ctrl('a')), vec![Step::Cmd(1)]);
        assert!(!d.has_pending());
    }

    #[test]
    fn unbound_key_is_reported() {
        let map: KeyMap<u8> = KeyMap::new();
        let mut d = TrieDispatcher::new(map);
        assert_eq!(d.handle(ev('q')), vec![Step::Unbound(ev('q'))]);
    }

    #[test]
    fn two_key_sequence_waits_then_fires() {
        let mut map = KeyMap::new();
        map.bind(&[KeyEvent::ctrl('x'), KeyEvent::ctrl('u')], 7);
        let mut d = TrieDispatcher::new(map);
        assert_eq!(d.handle(KeyEvent::ctrl('x')), vec![Step::Pending]);
        assert!(d.has_pending());
        assert_eq!(d.handle(KeyEvent::ctrl('u')), vec![Step::Cmd(7)]);
    }

    #[test]
    fn longer_binding_shadows_shorter_until_timeout() {
        let mut map = KeyMap::new();
        map.bind(&[ev('g')], 1);
        map.bind(&[ev('g'), ev('g')], 2);
        let mut d = TrieDispatcher::new(map.clone());
        // 'g' alone is ambiguous.
        assert_eq!(d.handle(ev('g')), vec![Step::Pending]);
        // Timeout resolves to the shorter binding.
        assert_eq!(d.flush(), vec![Step::Cmd(1)]);

        // 'gg' fires the longer one.
        let mut d = TrieDispatcher::new(map);
        d.handle(ev('g'));
        assert_eq!(d.handle(ev('g')), vec![Step::Cmd(2)]);
    }

    #[test]
    fn broken_sequence_salvages_prefix_and_replays() {
        let mut map = KeyMap::new();
        map.bind(&[KeyEvent::ctrl('x'), KeyEvent::ctrl('u')], 7);
        map.bind_key(ev('a'), 9);
        let mut d = TrieDispatcher::new(map);
        d.handle(KeyEvent::ctrl('x'));
        // C-x followed by 'a': no binding consumes C-x, 'a' replays.
        let steps = d.handle(ev('a'));
        assert_eq!(
            steps,
            vec![Step::Unbound(KeyEvent::ctrl('x')), Step::Cmd(9)]
        );
    }

    #[test]
    fn merge_prefers_other_on_ties() {
        let mut base = KeyMap::new();
        base.bind_key(ev('a'), 1);
        base.bind_key(ev('b'), 2);
        let mut over = KeyMap::new();
        over.bind_key(ev('a'), 10);
        base.merge(over);
        assert!(matches!(base.lookup(&[ev('a')]), KeyMatch::Exact(&10)));
        assert!(matches!(base.lookup(&[ev('b')]), KeyMatch::Exact(&2)));
    }

    #[test]
    fn timeout_on_unbound_prefix_replays_events() {
        let mut map = KeyMap::new();
        map.bind(&[ev('g'), ev('g')], 2);
        map.bind_key(ev('x'), 5);
        let mut d = TrieDispatcher::new(map);
        d.handle(ev('g'));
        let steps = d.flush();
        assert_eq!(steps, vec![Step::Unbound(ev('g'))]);
    }
}
