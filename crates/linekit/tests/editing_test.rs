//! End-to-end editing scenarios: keystrokes in, returned line out.

mod common;

use common::*;
use linekit::{EditMode, Prefs, ReadlineError, Settings};
use linekit_core::KeyEvent;
use linekit_core::TermEvent;

#[test]
fn typed_line_is_returned() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("hello");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("hello".to_string()));
}

#[test]
fn ctrl_a_then_ctrl_d_deletes_first_char() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("hello");
        input.push_key(KeyEvent::ctrl('a'));
        input.push_key(KeyEvent::ctrl('d'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("ello".to_string()));
}

#[test]
fn meta_b_meta_d_kills_word() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("foo bar");
        input.push_key(KeyEvent::meta('b'));
        input.push_key(KeyEvent::meta('d'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("foo ".to_string()));
}

#[test]
fn kill_then_yank_restores_initial_line() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('k'));
        input.push_key(KeyEvent::ctrl('y'));
        input.push_key(enter());
    });
    // Initial line "abc" with the cursor between 'a' and 'b'.
    assert_eq!(
        session.read_line_with_initial("> ", ("a", "bc")).unwrap(),
        Some("abc".to_string())
    );
}

#[test]
fn consecutive_kills_chain_into_one_yank() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("one two");
        input.push_key(KeyEvent::ctrl('w'));
        input.push_key(KeyEvent::ctrl('w'));
        input.push_key(KeyEvent::ctrl('y'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("one two".to_string()));
}

#[test]
fn yank_pop_rotates_to_older_kill() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("one");
        input.push_key(KeyEvent::ctrl('w'));
        input.push_text("two");
        input.push_key(KeyEvent::ctrl('w'));
        input.push_key(KeyEvent::ctrl('y'));
        input.push_key(KeyEvent::meta('y'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("one".to_string()));
}

#[test]
fn yank_pop_without_yank_beeps() {
    let (mut session, output) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("x");
        input.push_key(KeyEvent::meta('y'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("x".to_string()));
    assert!(output.bell_count() >= 1);
}

#[test]
fn undo_reverts_last_insertion() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("abc");
        input.push_key(KeyEvent::ctrl('_'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("ab".to_string()));
}

#[test]
fn undo_reverts_a_kill_completely() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("hello world");
        input.push_key(KeyEvent::ctrl('w'));
        input.push_key(KeyEvent::ctrl('_'));
        input.push_key(enter());
    });
    assert_eq!(
        session.read_line("> ").unwrap(),
        Some("hello world".to_string())
    );
}

#[test]
fn ctrl_x_ctrl_u_also_undoes() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("ab");
        input.push_key(KeyEvent::ctrl('x'));
        input.push_key(KeyEvent::ctrl('u'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("a".to_string()));
}

#[test]
fn transpose_swaps_last_two_chars() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("ab");
        input.push_key(KeyEvent::ctrl('t'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("ba".to_string()));
}

#[test]
fn wide_chars_edit_by_character() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("日本");
        input.push_key(KeyEvent::ctrl('b'));
        input.push_key(KeyEvent::ctrl('d'));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("日".to_string()));
}

#[test]
fn ctrl_d_on_empty_line_is_eof() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('d'));
    });
    assert_eq!(session.read_line("> ").unwrap(), None);
}

#[test]
fn input_eof_returns_none() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |_| {});
    assert_eq!(session.read_line("> ").unwrap(), None);
}

#[test]
fn interrupt_reaches_the_handler() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_event(TermEvent::Interrupt);
    });
    let result = session.handle_interrupt(
        |_| Ok(Some("Caught interrupted".to_string())),
        |s| s.read_line("> "),
    );
    assert_eq!(result.unwrap(), Some("Caught interrupted".to_string()));
}

#[test]
fn interrupt_without_handler_is_an_error() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("partial");
        input.push_event(TermEvent::Interrupt);
    });
    assert!(matches!(
        session.read_line("> "),
        Err(ReadlineError::Interrupted)
    ));
}

#[test]
fn resize_mid_edit_keeps_the_line() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("abc");
        input.push_event(TermEvent::Resize(40, 12));
        input.push_text("def");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("abcdef".to_string()));
}

#[test]
fn read_char_returns_first_key() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("xyz");
    });
    assert_eq!(session.read_char("press: ").unwrap(), Some('x'));
}

#[test]
fn read_password_masks_echo() {
    let (mut session, output) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("secret");
        input.push_key(enter());
    });
    let password = session.read_password("pw: ", Some('*')).unwrap();
    assert_eq!(password, Some("secret".to_string()));
    let written = output.written_text();
    assert!(written.contains("******"));
    assert!(!written.contains("secret"));
}

#[test]
fn read_password_backspace_edits() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("abcd");
        input.push_key(backspace());
        input.push_key(enter());
    });
    assert_eq!(
        session.read_password("pw: ", None).unwrap(),
        Some("abc".to_string())
    );
}

// --- Vi discipline -------------------------------------------------------

fn vi_prefs() -> Prefs {
    Prefs {
        edit_mode: EditMode::Vi,
        ..Prefs::default()
    }
}

#[test]
fn vi_dw_deletes_to_next_word() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("foo bar");
        input.push_key(esc());
        input.push_text("0dw");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("bar".to_string()));
}

#[test]
fn vi_count_applies_to_motion() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("abcdef");
        input.push_key(esc());
        input.push_text("03lx");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("abcef".to_string()));
}

#[test]
fn vi_cw_changes_word_and_inserts() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("foo bar");
        input.push_key(esc());
        input.push_text("0cw");
        input.push_text("baz");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("baz bar".to_string()));
}

#[test]
fn vi_dd_wipes_the_line() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("hello");
        input.push_key(esc());
        input.push_text("dd");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some(String::new()));
}

#[test]
fn vi_x_then_p_pastes_after_cursor() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("ab");
        input.push_key(esc());
        input.push_text("xp");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("ab".to_string()));
}

#[test]
fn vi_count_with_x_deletes_many() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("aaaa");
        input.push_key(esc());
        input.push_text("02x");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("aa".to_string()));
}

#[test]
fn vi_replace_char() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("abc");
        input.push_key(esc());
        input.push_text("0rz");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("zbc".to_string()));
}

#[test]
fn vi_undo_reverts_delete() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("hello");
        input.push_key(esc());
        input.push_text("ddu");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("hello".to_string()));
}

#[test]
fn vi_yy_then_p_duplicates_line() {
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("ab");
        input.push_key(esc());
        input.push_text("yy$p");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("abab".to_string()));
}

#[test]
fn vi_insert_entries_reposition() {
    // `A` appends at end of line even from the start.
    let (mut session, _) = scripted_session(vi_prefs(), Settings::new(), |input| {
        input.push_text("ab");
        input.push_key(esc());
        input.push_text("0A");
        input.push_text("c");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("abc".to_string()));
}
