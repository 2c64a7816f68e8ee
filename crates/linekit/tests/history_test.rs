//! History navigation, persistence across sessions, and incremental
//! reverse search, driven through full sessions.

mod common;

use common::*;
use linekit::{Prefs, Settings};
use linekit_core::{HistoryDedup, KeyEvent};

#[test]
fn up_recalls_previous_line() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("first");
        input.push_key(enter());
        input.push_key(up());
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("first".to_string()));
    assert_eq!(session.read_line("> ").unwrap(), Some("first".to_string()));
}

#[test]
fn down_restores_in_progress_line() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("old");
        input.push_key(enter());
        input.push_text("draft");
        input.push_key(up());
        input.push_key(KeyEvent::fun(linekit_core::FnKey::Down));
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("old".to_string()));
    assert_eq!(session.read_line("> ").unwrap(), Some("draft".to_string()));
}

#[test]
fn history_persists_across_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history");

    {
        let settings = Settings::new().with_history_file(&path);
        let (mut session, _) = scripted_session(Prefs::default(), settings, |input| {
            input.push_text("foo");
            input.push_key(enter());
        });
        assert_eq!(session.read_line("> ").unwrap(), Some("foo".to_string()));
        // Dropping the session persists history.
    }

    let settings = Settings::new().with_history_file(&path);
    let (mut session, _) = scripted_session(Prefs::default(), settings, |input| {
        input.push_key(up());
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("foo".to_string()));
}

#[test]
fn auto_add_respects_dedup_policy() {
    let prefs = Prefs {
        history_duplicates: HistoryDedup::Consecutive,
        ..Prefs::default()
    };
    let (mut session, _) = scripted_session(prefs, Settings::new(), |input| {
        for _ in 0..3 {
            input.push_text("same");
            input.push_key(enter());
        }
    });
    for _ in 0..3 {
        assert_eq!(session.read_line("> ").unwrap(), Some("same".to_string()));
    }
    assert_eq!(session.history().len(), 1);
}

#[test]
fn auto_add_can_be_disabled() {
    let prefs = Prefs {
        auto_add_history: false,
        ..Prefs::default()
    };
    let (mut session, _) = scripted_session(prefs, Settings::new(), |input| {
        input.push_text("line");
        input.push_key(enter());
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("line".to_string()));
    assert!(session.history().is_empty());
}

#[test]
fn reverse_search_finds_newest_match() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('r'));
        input.push_text("gr");
        input.push_key(enter());
    });
    session.modify_history(|h| {
        h.add("grep alpha");
        h.add("ls -l");
        h.add("grep beta");
    });
    assert_eq!(
        session.read_line("> ").unwrap(),
        Some("grep beta".to_string())
    );
}

#[test]
fn repeated_ctrl_r_steps_older() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('r'));
        input.push_text("gr");
        input.push_key(KeyEvent::ctrl('r'));
        input.push_key(enter());
    });
    session.modify_history(|h| {
        h.add("grep alpha");
        h.add("ls -l");
        h.add("grep beta");
    });
    assert_eq!(
        session.read_line("> ").unwrap(),
        Some("grep alpha".to_string())
    );
}

#[test]
fn aborted_search_restores_buffer() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_text("draft");
        input.push_key(KeyEvent::ctrl('r'));
        input.push_text("gr");
        input.push_key(KeyEvent::ctrl('g'));
        input.push_key(enter());
    });
    session.modify_history(|h| {
        h.add("grep alpha");
    });
    assert_eq!(session.read_line("> ").unwrap(), Some("draft".to_string()));
}

#[test]
fn search_prompt_and_highlight_are_rendered() {
    let (mut session, output) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('r'));
        input.push_text("ep");
        input.push_key(enter());
    });
    session.modify_history(|h| {
        h.add("grep alpha");
    });
    assert_eq!(
        session.read_line("> ").unwrap(),
        Some("grep alpha".to_string())
    );
    let written = output.written_text();
    assert!(written.contains("(reverse-i-search)"));
    // The match is drawn with the query span in reverse video.
    assert!(output
        .ops()
        .iter()
        .any(|op| matches!(op, linekit_term::mock::OutputOp::Reversed(s) if s == "ep")));
}

#[test]
fn editing_key_exits_search_with_match() {
    let (mut session, _) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('r'));
        input.push_text("bet");
        // End moves to end of line, leaving search mode first.
        input.push_key(KeyEvent::fun(linekit_core::FnKey::End));
        input.push_text("!");
        input.push_key(enter());
    });
    session.modify_history(|h| {
        h.add("grep beta");
    });
    assert_eq!(
        session.read_line("> ").unwrap(),
        Some("grep beta!".to_string())
    );
}

#[test]
fn failed_search_shows_failed_prompt() {
    let (mut session, output) = scripted_session(Prefs::default(), Settings::new(), |input| {
        input.push_key(KeyEvent::ctrl('r'));
        input.push_text("zzz");
        input.push_key(KeyEvent::ctrl('g'));
        input.push_key(enter());
    });
    session.modify_history(|h| {
        h.add("grep alpha");
    });
    assert_eq!(session.read_line("> ").unwrap(), Some(String::new()));
    assert!(output.written_text().contains("(failed reverse-i-search)"));
}
