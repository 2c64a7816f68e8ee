//! Completion: word extraction, quoting and escaping, filename candidates.
//!
//! A completer sees the line split at the cursor, with the left half in
//! reversed order so word scanning starts at the cursor and walks outward
//! in O(word). It consumes some of that left half (the word being
//! completed) and returns the rest untouched together with the candidate
//! replacements for the consumed part.

use crate::line::LineState;
use std::env;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Text that replaces the consumed word.
    pub replacement: String,
    /// What a candidate listing shows (usually the bare name).
    pub display: String,
    /// Whether the word is complete, so the caller should append a
    /// terminator (a space) after inserting the replacement.
    pub is_finished: bool,
}

impl Completion {
    /// A finished candidate whose display equals its replacement.
    pub fn simple(text: impl Into<String>) -> Self {
        let text = text.into();
        Completion {
            display: text.clone(),
            replacement: text,
            is_finished: true,
        }
    }
}

/// A completion provider.
///
/// `before_rev` is the text left of the cursor with the nearest character
/// first; `after` is the text from the cursor rightward. The result is the
/// unconsumed tail of `before_rev` (still reversed) plus the candidates
/// replacing the consumed head.
pub trait Completer {
    fn complete(&self, before_rev: &[char], after: &str) -> (Vec<char>, Vec<Completion>);
}

/// Closures with the right shape are completers.
impl<F> Completer for F
where
    F: Fn(&[char], &str) -> (Vec<char>, Vec<Completion>),
{
    fn complete(&self, before_rev: &[char], after: &str) -> (Vec<char>, Vec<Completion>) {
        self(before_rev, after)
    }
}

/// Splits the word to complete out of the reversed left half.
///
/// The word extends from the cursor back to the nearest unescaped break
/// character. A character is escaped when an odd run of the escape
/// character immediately precedes it (readline convention).
fn scan_word_rev(
    before_rev: &[char],
    escape: Option<char>,
    is_break: &dyn Fn(char) -> bool,
) -> usize {
    let mut consumed = 0;
    while consumed < before_rev.len() {
        let c = before_rev[consumed];
        if is_break(c) {
            let escapes = match escape {
                Some(e) => before_rev[consumed + 1..]
                    .iter()
                    .take_while(|&&x| x == e)
                    .count(),
                None => 0,
            };
            if escapes % 2 == 0 {
                break;
            }
        }
        consumed += 1;
    }
    consumed
}

/// Remove escape characters from a word (natural order).
fn unescape(word: &str, escape: Option<char>) -> String {
    let Some(e) = escape else {
        return word.to_string();
    };
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars();
    while let Some(c) = chars.next() {
        if c == e {
            match chars.next() {
                Some(n) => out.push(n),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape break characters and the escape character itself.
fn escape_word(word: &str, escape: Option<char>, is_break: &dyn Fn(char) -> bool) -> String {
    let Some(e) = escape else {
        return word.to_string();
    };
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if c == e || is_break(c) {
            out.push(e);
        }
        out.push(c);
    }
    out
}

/// Completes a single whitespace-ish-delimited word through a candidate
/// function, handling escape characters on both the way in and the way
/// out.
pub struct WordCompleter<F> {
    escape: Option<char>,
    is_break: fn(char) -> bool,
    candidates: F,
}

impl<F> WordCompleter<F>
where
    F: Fn(&str) -> Vec<Completion>,
{
    pub fn new(escape: Option<char>, is_break: fn(char) -> bool, candidates: F) -> Self {
        WordCompleter {
            escape,
            is_break,
            candidates,
        }
    }
}

impl<F> Completer for WordCompleter<F>
where
    F: Fn(&str) -> Vec<Completion>,
{
    fn complete(&self, before_rev: &[char], _after: &str) -> (Vec<char>, Vec<Completion>) {
        let is_break = self.is_break;
        let consumed = scan_word_rev(before_rev, self.escape, &|c| is_break(c));
        let word_raw: String = before_rev[..consumed].iter().rev().collect();
        let word = unescape(&word_raw, self.escape);
        let unused = before_rev[consumed..].to_vec();
        let candidates = (self.candidates)(&word)
            .into_iter()
            .map(|mut c| {
                c.replacement = escape_word(&c.replacement, self.escape, &|ch| is_break(ch));
                c
            })
            .collect();
        (unused, candidates)
    }
}

/// Wraps a word completer with quote awareness: when the cursor sits inside
/// an open quote, the quoted span is the word and replacements stay
/// quoted.
pub struct QuotedWordCompleter<I> {
    quotes: Vec<char>,
    escape: Option<char>,
    inner: I,
    /// Produces candidates for the quoted word; the inner completer is only
    /// consulted outside quotes.
    candidates: fn(&str) -> Vec<Completion>,
}

impl<I: Completer> QuotedWordCompleter<I> {
    pub fn new(
        quotes: Vec<char>,
        escape: Option<char>,
        candidates: fn(&str) -> Vec<Completion>,
        inner: I,
    ) -> Self {
        QuotedWordCompleter {
            quotes,
            escape,
            inner,
            candidates,
        }
    }

    /// If the cursor is inside an open quote, the index (in natural order)
    /// of the opening quote char and which quote it is.
    fn open_quote(&self, left: &[char]) -> Option<(usize, char)> {
        let mut open: Option<(usize, char)> = None;
        let mut i = 0;
        while i < left.len() {
            let c = left[i];
            if Some(c) == self.escape {
                i += 2;
                continue;
            }
            match open {
                None if self.quotes.contains(&c) => open = Some((i, c)),
                Some((_, q)) if c == q => open = None,
                _ => {}
            }
            i += 1;
        }
        open
    }
}

impl<I: Completer> Completer for QuotedWordCompleter<I> {
    fn complete(&self, before_rev: &[char], after: &str) -> (Vec<char>, Vec<Completion>) {
        let left: Vec<char> = before_rev.iter().rev().copied().collect();
        let Some((quote_pos, quote)) = self.open_quote(&left) else {
            return self.inner.complete(before_rev, after);
        };

        let content: String = left[quote_pos + 1..].iter().collect();
        let word = unescape(&content, self.escape);
        // Everything up to and including the opening quote stays.
        let unused: Vec<char> = before_rev[left.len() - quote_pos - 1..].to_vec();

        let escape = self.escape;
        let quotes = self.quotes.clone();
        let candidates = (self.candidates)(&word)
            .into_iter()
            .map(|mut c| {
                let mut quoted =
                    escape_word(&c.replacement, escape, &|ch| quotes.contains(&ch));
                if c.is_finished {
                    quoted.push(quote);
                }
                c.replacement = quoted;
                c
            })
            .collect();
        (unused, candidates)
    }
}

/// Runs `first`; when it yields no candidates, falls back to `second`.
pub struct FallbackCompleter<A, B> {
    first: A,
    second: B,
}

impl<A: Completer, B: Completer> FallbackCompleter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        FallbackCompleter { first, second }
    }
}

impl<A: Completer, B: Completer> Completer for FallbackCompleter<A, B> {
    fn complete(&self, before_rev: &[char], after: &str) -> (Vec<char>, Vec<Completion>) {
        let (unused, candidates) = self.first.complete(before_rev, after);
        if candidates.is_empty() {
            self.second.complete(before_rev, after)
        } else {
            (unused, candidates)
        }
    }
}

/// Word-break characters for filename completion.
pub fn filename_word_break(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '`' | '@' | '$' | '>' | '<' | '=' | ';' | '|' | '&' | '{' | '(')
}

/// Resolve a leading `~/` through `HOME`.
fn expand_tilde(word: &str) -> PathBuf {
    if let Some(rest) = word.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(word)
}

/// List directory entries matching the partial path `word`.
///
/// Directories come back with a trailing separator and `is_finished =
/// false` so the user can keep descending; listing errors yield no
/// candidates rather than failing the session.
pub fn list_files(word: &str) -> Vec<Completion> {
    let expanded = expand_tilde(word);
    let expanded_str = expanded.to_string_lossy();
    let (dir_part, file_prefix) = match expanded_str.rfind(MAIN_SEPARATOR) {
        Some(pos) => (
            expanded_str[..=pos].to_string(),
            expanded_str[pos + 1..].to_string(),
        ),
        None => (String::new(), expanded_str.to_string()),
    };
    // The replacement must splice back into what the user typed, so keep
    // the original (unexpanded) directory spelling.
    let typed_dir = match word.rfind(MAIN_SEPARATOR) {
        Some(pos) => word[..=pos].to_string(),
        None => String::new(),
    };
    let list_in = if dir_part.is_empty() {
        ".".to_string()
    } else {
        dir_part
    };

    let entries = match fs::read_dir(&list_in) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&file_prefix) {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let mut replacement = format!("{typed_dir}{name}");
        let mut display = name;
        if is_dir {
            replacement.push(MAIN_SEPARATOR);
            display.push(MAIN_SEPARATOR);
        }
        out.push(Completion {
            replacement,
            display,
            is_finished: !is_dir,
        });
    }
    out.sort_by(|a, b| a.display.cmp(&b.display));
    out
}

/// The stock completer: quote-aware filename completion, `"`/`'` quotes and
/// backslash escapes, falling back to plain word scanning outside quotes.
pub fn filename_completer(
) -> QuotedWordCompleter<WordCompleter<fn(&str) -> Vec<Completion>>> {
    let inner: WordCompleter<fn(&str) -> Vec<Completion>> =
        WordCompleter::new(Some('\\'), filename_word_break, list_files);
    QuotedWordCompleter::new(vec!['"', '\''], Some('\\'), list_files, inner)
}

/// Longest common prefix of all candidate replacements.
pub fn common_prefix(candidates: &[Completion]) -> String {
    let mut iter = candidates.iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.replacement.chars().collect();
    for c in iter {
        let chars: Vec<char> = c.replacement.chars().collect();
        let common = prefix
            .iter()
            .zip(chars.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(common);
        if prefix.is_empty() {
            break;
        }
    }
    prefix.into_iter().collect()
}

/// Splice a completion back into the line: the consumed word is replaced,
/// the cursor lands after the replacement, and the right half is
/// untouched.
pub fn replace_word(state: &LineState, unused_left: &[char], replacement: &str) -> LineState {
    let left: String = unused_left.iter().rev().collect();
    LineState::from_parts(&format!("{left}{replacement}"), &state.after_cursor())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(s: &str) -> Vec<char> {
        s.chars().rev().collect()
    }

    fn static_candidates(words: &'static [&'static str]) -> impl Fn(&str) -> Vec<Completion> {
        move |word: &str| {
            words
                .iter()
                .filter(|w| w.starts_with(word))
                .map(|w| Completion::simple(*w))
                .collect()
        }
    }

    #[test]
    fn word_completer_scans_back_to_whitespace() {
        let completer = WordCompleter::new(
            None,
            |c| c.is_whitespace(),
            static_candidates(&["barley", "barn"]),
        );
        let (unused, candidates) = completer.complete(&rev("echo bar"), "");
        let unused_str: String = unused.iter().rev().collect();
        assert_eq!(unused_str, "echo ");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].replacement, "barley");
    }

    #[test]
    fn unused_left_is_a_suffix_of_left() {
        let completer = WordCompleter::new(
            None,
            |c| c.is_whitespace(),
            static_candidates(&["barn"]),
        );
        let before = rev("a b ba");
        let (unused, _) = completer.complete(&before, "");
        assert!(before.ends_with(&unused[..]));
    }

    #[test]
    fn escaped_whitespace_stays_in_the_word() {
        let completer = WordCompleter::new(
            Some('\\'),
            |c| c.is_whitespace(),
            |word: &str| vec![Completion::simple(format!("{word}!"))],
        );
        let (unused, candidates) = completer.complete(&rev("say hello\\ wor"), "");
        let unused_str: String = unused.iter().rev().collect();
        assert_eq!(unused_str, "say ");
        // The candidate function saw the unescaped word, and the
        // replacement was re-escaped on the way out.
        assert_eq!(candidates[0].replacement, "hello\\ wor!");
    }

    #[test]
    fn escape_then_unescape_is_identity() {
        let is_break = |c: char| c.is_whitespace();
        for word in ["plain", "two words", "tab\there", "back\\slash"] {
            let escaped = escape_word(word, Some('\\'), &is_break);
            assert_eq!(unescape(&escaped, Some('\\')), word);
        }
    }

    #[test]
    fn quoted_completer_detects_open_quote() {
        let inner = WordCompleter::new(
            Some('\\'),
            filename_word_break,
            static_candidates(&["never"]),
        );
        fn quoted_candidates(word: &str) -> Vec<Completion> {
            if "my file.txt".starts_with(word) {
                vec![Completion::simple("my file.txt")]
            } else {
                Vec::new()
            }
        }
        let completer =
            QuotedWordCompleter::new(vec!['"', '\''], Some('\\'), quoted_candidates, inner);
        let (unused, candidates) = completer.complete(&rev("open \"my fi"), "");
        let unused_str: String = unused.iter().rev().collect();
        assert_eq!(unused_str, "open \"");
        assert_eq!(candidates[0].replacement, "my file.txt\"");
        assert!(candidates[0].is_finished);
    }

    #[test]
    fn closed_quote_defers_to_inner() {
        fn no_candidates(_: &str) -> Vec<Completion> {
            Vec::new()
        }
        let inner = WordCompleter::new(Some('\\'), filename_word_break, |word: &str| {
            vec![Completion::simple(format!("inner:{word}"))]
        });
        let completer =
            QuotedWordCompleter::new(vec!['"'], Some('\\'), no_candidates, inner);
        let (_, candidates) = completer.complete(&rev("\"done\" wo"), "");
        assert_eq!(candidates[0].replacement, "inner:wo");
    }

    #[test]
    fn fallback_runs_second_on_empty() {
        let first = WordCompleter::new(None, |c| c.is_whitespace(), |_: &str| Vec::new());
        let second = WordCompleter::new(None, |c| c.is_whitespace(), |w: &str| {
            vec![Completion::simple(format!("{w}2"))]
        });
        let completer = FallbackCompleter::new(first, second);
        let (_, candidates) = completer.complete(&rev("x"), "");
        assert_eq!(candidates[0].replacement, "x2");
    }

    #[test]
    fn common_prefix_of_candidates() {
        let candidates = vec![
            Completion::simple("barley"),
            Completion::simple("barn"),
            Completion::simple("bark"),
        ];
        assert_eq!(common_prefix(&candidates), "bar");
        assert_eq!(common_prefix(&[]), "");
        assert_eq!(
            common_prefix(&[Completion::simple("solo")]),
            "solo"
        );
    }

    #[test]
    fn replace_word_rebuilds_line() {
        let state = LineState::from_parts("echo bar", " tail");
        let completer = WordCompleter::new(
            None,
            |c: char| c.is_whitespace(),
            static_candidates(&["barley"]),
        );
        let (unused, candidates) =
            completer.complete(&rev("echo bar"), " tail");
        let next = replace_word(&state, &unused, &candidates[0].replacement);
        assert_eq!(next.text(), "echo barley tail");
        assert_eq!(next.cursor(), "echo barley".chars().count());
    }

    #[test]
    fn list_files_completes_directories_unfinished() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        std::fs::write(dir.path().join("subfile"), b"x").expect("write");
        let word = format!("{}/su", dir.path().display());
        let candidates = list_files(&word);
        assert_eq!(candidates.len(), 2);
        let dir_cand = candidates
            .iter()
            .find(|c| c.display.ends_with(MAIN_SEPARATOR))
            .expect("dir candidate");
        assert!(!dir_cand.is_finished);
        assert!(dir_cand.replacement.ends_with(MAIN_SEPARATOR));
        let file_cand = candidates
            .iter()
            .find(|c| c.display == "subfile")
            .expect("file candidate");
        assert!(file_cand.is_finished);
    }

    #[test]
    fn list_files_on_missing_dir_is_empty() {
        assert!(list_files("/definitely/not/here/x").is_empty());
    }
}
