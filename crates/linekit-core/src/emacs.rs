//! The default Emacs-flavor key map.

use crate::command::{Anchor, Cmd};
use crate::key::{FnKey, KeyEvent};
use crate::keymap::KeyMap;
use crate::line::{At, Movement, Word};

/// Build the standard Emacs bindings.
///
/// Printable characters are deliberately left unbound: the dispatcher
/// reports them as unbound and the session self-inserts, which keeps the
/// map small and lets user overrides of individual characters win.
pub fn emacs_keymap() -> KeyMap<Cmd> {
    use FnKey::*;
    let mut map = KeyMap::new();

    map.bind_key(KeyEvent::fun(Enter), Cmd::AcceptLine);

    // Motion.
    map.bind_key(KeyEvent::ctrl('a'), Cmd::Move(Movement::BeginningOfLine));
    map.bind_key(KeyEvent::fun(Home), Cmd::Move(Movement::BeginningOfLine));
    map.bind_key(KeyEvent::ctrl('e'), Cmd::Move(Movement::EndOfLine));
    map.bind_key(KeyEvent::fun(End), Cmd::Move(Movement::EndOfLine));
    map.bind_key(KeyEvent::ctrl('b'), Cmd::Move(Movement::BackwardChar(1)));
    map.bind_key(KeyEvent::fun(Left), Cmd::Move(Movement::BackwardChar(1)));
    map.bind_key(KeyEvent::ctrl('f'), Cmd::Move(Movement::ForwardChar(1)));
    map.bind_key(KeyEvent::fun(Right), Cmd::Move(Movement::ForwardChar(1)));
    map.bind_key(
        KeyEvent::meta('f'),
        Cmd::Move(Movement::ForwardWord(1, At::AfterEnd, Word::Emacs)),
    );
    map.bind_key(
        KeyEvent::meta('b'),
        Cmd::Move(Movement::BackwardWord(1, Word::Emacs)),
    );
    map.bind_key(
        KeyEvent::fun(Right).with_ctrl(),
        Cmd::Move(Movement::ForwardWord(1, At::AfterEnd, Word::Emacs)),
    );
    map.bind_key(
        KeyEvent::fun(Left).with_ctrl(),
        Cmd::Move(Movement::BackwardWord(1, Word::Emacs)),
    );

    // Deletion and kills.
    map.bind_key(KeyEvent::ctrl('d'), Cmd::DeleteOrEof);
    map.bind_key(KeyEvent::fun(Backspace), Cmd::Delete(Movement::BackwardChar(1)));
    map.bind_key(KeyEvent::ctrl('h'), Cmd::Delete(Movement::BackwardChar(1)));
    map.bind_key(KeyEvent::fun(Delete), Cmd::Delete(Movement::ForwardChar(1)));
    map.bind_key(KeyEvent::ctrl('k'), Cmd::Kill(Movement::EndOfLine));
    map.bind_key(KeyEvent::ctrl('u'), Cmd::Kill(Movement::BeginningOfLine));
    map.bind_key(
        KeyEvent::ctrl('w'),
        Cmd::Kill(Movement::BackwardWord(1, Word::Big)),
    );
    map.bind_key(
        KeyEvent::meta('d'),
        Cmd::Kill(Movement::ForwardWord(1, At::AfterEnd, Word::Emacs)),
    );
    map.bind_key(
        KeyEvent::fun(Backspace).with_meta(),
        Cmd::Kill(Movement::BackwardWord(1, Word::Emacs)),
    );

    // Kill ring.
    map.bind_key(KeyEvent::ctrl('y'), Cmd::Yank(1, Anchor::Before));
    map.bind_key(KeyEvent::meta('y'), Cmd::YankPop);

    // Misc editing.
    map.bind_key(KeyEvent::ctrl('t'), Cmd::TransposeChars);
    map.bind_key(KeyEvent::ctrl('l'), Cmd::ClearScreen);
    map.bind_key(KeyEvent::ctrl('_'), Cmd::Undo);
    map.bind(&[KeyEvent::ctrl('x'), KeyEvent::ctrl('u')], Cmd::Undo);
    map.bind_key(KeyEvent::ctrl('g'), Cmd::Beep);

    // History.
    map.bind_key(KeyEvent::fun(Up), Cmd::HistoryPrev);
    map.bind_key(KeyEvent::ctrl('p'), Cmd::HistoryPrev);
    map.bind_key(KeyEvent::fun(Down), Cmd::HistoryNext);
    map.bind_key(KeyEvent::ctrl('n'), Cmd::HistoryNext);
    map.bind_key(KeyEvent::meta('<'), Cmd::BeginningOfHistory);
    map.bind_key(KeyEvent::meta('>'), Cmd::EndOfHistory);
    map.bind_key(KeyEvent::ctrl('r'), Cmd::ReverseSearch);

    // Completion.
    map.bind_key(KeyEvent::fun(Tab), Cmd::Complete);

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::KeyMatch;

    #[test]
    fn core_bindings_present() {
        let map = emacs_keymap();
        assert!(matches!(
            map.lookup(&[KeyEvent::ctrl('a')]),
            KeyMatch::Exact(&Cmd::Move(Movement::BeginningOfLine))
        ));
        assert!(matches!(
            map.lookup(&[KeyEvent::fun(FnKey::Enter)]),
            KeyMatch::Exact(&Cmd::AcceptLine)
        ));
        assert!(matches!(
            map.lookup(&[KeyEvent::ctrl('y')]),
            KeyMatch::Exact(&Cmd::Yank(1, Anchor::Before))
        ));
    }

    #[test]
    fn ctrl_x_prefix_reaches_undo() {
        let map = emacs_keymap();
        assert!(matches!(
            map.lookup(&[KeyEvent::ctrl('x')]),
            KeyMatch::Prefix
        ));
        assert!(matches!(
            map.lookup(&[KeyEvent::ctrl('x'), KeyEvent::ctrl('u')]),
            KeyMatch::Exact(&Cmd::Undo)
        ));
    }

    #[test]
    fn printables_are_unbound() {
        let map = emacs_keymap();
        assert!(matches!(map.lookup(&[KeyEvent::ch('a')]), KeyMatch::None));
    }
}
