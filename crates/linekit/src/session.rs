//! The session driver: the `read_line` contract and everything behind it.
//!
//! A [`Session`] owns one terminal, one history list and one kill ring.
//! Each `read_line` call enters raw mode (released on every exit path via
//! the guard), then loops: draw, pull one event, dispatch it through the
//! active discipline, interpret the resulting command against the line
//! state. Completion, history navigation and incremental search are
//! interpreted here too, so the core stays pure.
//!
//! When stdio is not a terminal the session degrades to plain buffered
//! reads with no editing, which keeps `read_line` usable in pipelines.

use std::io::{self, BufRead, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

use linekit_core::completion::{common_prefix, filename_completer, replace_word};
use linekit_core::prefs::CompletionType;
use linekit_core::{
    Anchor, Cmd, Completer, Completion, Discipline, DispatchStep, FnKey, History, HistoryCursor,
    KeyEvent, KillDirection, KillRing, LineState, Movement, Prefs, TermEvent, UndoLog,
};
use linekit_term::{
    stdio_backend, RawModeGuard, TermError, TermInput, TermOutput,
};

use crate::error::{ReadlineError, Result};
use crate::render::Renderer;

/// How long a multi-key binding may wait for its next key.
const KEYSEQ_TIMEOUT: Duration = Duration::from_millis(500);

/// Sink for recovered errors (history I/O, completer failures). The
/// session never prints diagnostics to the terminal it is editing on.
pub type LogSink = Box<dyn FnMut(&str)>;

/// Per-session wiring that is not a preference: where history persists,
/// how to complete, where to report recovered errors.
pub struct Settings {
    pub history_file: Option<PathBuf>,
    pub completer: Option<Box<dyn Completer>>,
    pub logger: Option<LogSink>,
}

impl Settings {
    pub fn new() -> Self {
        Settings {
            history_file: None,
            completer: None,
            logger: None,
        }
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = Some(path.into());
        self
    }

    pub fn with_completer(mut self, completer: impl Completer + 'static) -> Self {
        self.completer = Some(Box::new(completer));
        self
    }

    pub fn with_logger(mut self, logger: impl FnMut(&str) + 'static) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

enum Backend {
    Interactive {
        input: Box<dyn TermInput>,
        renderer: Renderer,
    },
    /// Stdio is not a terminal: line-buffered reads, no editing.
    Plain,
}

/// An interactive line-editing session.
pub struct Session {
    backend: Backend,
    prefs: Prefs,
    completer: Box<dyn Completer>,
    history: History,
    history_file: Option<PathBuf>,
    kill_ring: KillRing,
    logger: Option<LogSink>,
}

impl Session {
    /// Open a session on the process's stdio, falling back to
    /// non-interactive reads when stdio is not a terminal.
    pub fn new(prefs: Prefs, settings: Settings) -> Result<Session> {
        let backend = match stdio_backend() {
            Ok((input, output, caps)) => {
                let mut renderer = Renderer::new(output, caps.supports_cursor_motion);
                renderer.set_bell_style(prefs.bell_style);
                Backend::Interactive { input, renderer }
            }
            Err(TermError::NotATty) => Backend::Plain,
            Err(err) => return Err(err.into()),
        };
        Ok(Self::assemble(backend, prefs, settings))
    }

    /// Build a session over explicit back-end halves. This is how the test
    /// suite drives a full session against the scripted mock terminal.
    pub fn with_backend(
        input: Box<dyn TermInput>,
        output: Box<dyn TermOutput>,
        prefs: Prefs,
        settings: Settings,
    ) -> Session {
        let supports_motion = input.capabilities().supports_cursor_motion;
        let mut renderer = Renderer::new(output, supports_motion);
        renderer.set_bell_style(prefs.bell_style);
        Self::assemble(Backend::Interactive { input, renderer }, prefs, settings)
    }

    fn assemble(backend: Backend, prefs: Prefs, settings: Settings) -> Session {
        let mut history = History::with_config(
            prefs.max_history_size,
            prefs.history_duplicates,
            prefs.history_ignore_space,
        );
        let mut logger = settings.logger;
        if let Some(path) = &settings.history_file {
            if path.exists() {
                if let Err(err) = history.load(path) {
                    log_to(&mut logger, &format!("history load failed: {err}"));
                }
            }
        }
        Session {
            backend,
            prefs,
            completer: settings
                .completer
                .unwrap_or_else(|| Box::new(filename_completer())),
            history,
            history_file: settings.history_file,
            kill_ring: KillRing::new(),
            logger,
        }
    }

    /// Create a session, run `body`, persist history. The session is also
    /// persisted on drop; this form just makes the scope explicit.
    pub fn run<T>(
        prefs: Prefs,
        settings: Settings,
        body: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let mut session = Session::new(prefs, settings)?;
        let result = body(&mut session);
        session.save_history();
        result
    }

    /// Read one edited line. `Ok(None)` is end-of-input (`Ctrl-D` on an
    /// empty line, or stdin closing); `Err(Interrupted)` is `Ctrl-C`.
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.read_line_with_initial(prompt, ("", ""))
    }

    /// Like [`read_line`](Self::read_line) with the buffer pre-filled:
    /// `initial.0` sits left of the cursor, `initial.1` right of it.
    pub fn read_line_with_initial(
        &mut self,
        prompt: &str,
        initial: (&str, &str),
    ) -> Result<Option<String>> {
        let result = match &mut self.backend {
            Backend::Plain => plain_read_line(prompt)?,
            Backend::Interactive { input, renderer } => {
                let mut edit = EditLoop {
                    input: input.as_mut(),
                    renderer,
                    prefs: &self.prefs,
                    history: &mut self.history,
                    kill_ring: &mut self.kill_ring,
                    completer: self.completer.as_ref(),
                    logger: &mut self.logger,
                    discipline: Discipline::new(self.prefs.edit_mode),
                    ctx: EditCtx::new(prompt, initial),
                    raw: None,
                    replay: None,
                };
                edit.run()?
            }
        };
        if self.prefs.auto_add_history {
            if let Some(line) = &result {
                self.history.add(line);
            }
        }
        Ok(result)
    }

    /// Read one key and return its character. Function keys are ignored;
    /// Enter yields `'\n'`.
    pub fn read_char(&mut self, prompt: &str) -> Result<Option<char>> {
        match &mut self.backend {
            Backend::Plain => {
                Ok(plain_read_line(prompt)?.and_then(|line| line.chars().next()))
            }
            Backend::Interactive { input, renderer } => {
                let _raw = input.enable_raw_mode()?;
                if let Ok((w, _)) = input.window_size() {
                    renderer.set_width(w);
                }
                renderer.draw(prompt, "", 0, None)?;
                loop {
                    match input.next_event(None)? {
                        Some(TermEvent::Key(k)) => {
                            let ch = match k.key {
                                linekit_core::Key::Fn(FnKey::Enter) => Some('\n'),
                                _ => k.plain_char(),
                            };
                            if let Some(c) = ch {
                                renderer.finish_line()?;
                                return Ok(Some(c));
                            }
                        }
                        Some(TermEvent::Interrupt) => {
                            renderer.finish_line()?;
                            return Err(ReadlineError::Interrupted);
                        }
                        Some(TermEvent::Eof) => {
                            renderer.finish_line()?;
                            return Ok(None);
                        }
                        Some(TermEvent::Resize(w, _)) => renderer.resize(w)?,
                        _ => {}
                    }
                }
            }
        }
    }

    /// Read a line without echo; `mask` substitutes each typed character,
    /// `None` shows nothing. No history, no completion, no kill ring.
    pub fn read_password(&mut self, prompt: &str, mask: Option<char>) -> Result<Option<String>> {
        match &mut self.backend {
            Backend::Plain => plain_read_line(prompt).map_err(Into::into),
            Backend::Interactive { input, renderer } => {
                let _raw = input.enable_raw_mode()?;
                if let Ok((w, _)) = input.window_size() {
                    renderer.set_width(w);
                }
                let mut buffer = String::new();
                loop {
                    let display = match mask {
                        Some(c) => c.to_string().repeat(buffer.chars().count()),
                        None => String::new(),
                    };
                    let cursor = display.chars().count();
                    renderer.draw(prompt, &display, cursor, None)?;
                    match input.next_event(None)? {
                        Some(TermEvent::Key(k)) => match k.key {
                            linekit_core::Key::Fn(FnKey::Enter) => {
                                renderer.finish_line()?;
                                return Ok(Some(buffer));
                            }
                            linekit_core::Key::Fn(FnKey::Backspace) => {
                                buffer.pop();
                            }
                            _ if k == KeyEvent::ctrl('h') => {
                                buffer.pop();
                            }
                            _ if k == KeyEvent::ctrl('u') => buffer.clear(),
                            _ => {
                                if let Some(c) = k.plain_char().filter(|c| !c.is_control()) {
                                    buffer.push(c);
                                }
                            }
                        },
                        Some(TermEvent::Interrupt) => {
                            renderer.finish_line()?;
                            return Err(ReadlineError::Interrupted);
                        }
                        Some(TermEvent::Eof) => {
                            renderer.finish_line()?;
                            return Ok(if buffer.is_empty() {
                                None
                            } else {
                                Some(buffer)
                            });
                        }
                        Some(TermEvent::Resize(w, _)) => renderer.resize(w)?,
                        _ => {}
                    }
                }
            }
        }
    }

    /// Run `body`; if it is interrupted (`Ctrl-C`), run `handler` instead.
    /// Interrupts inside a session always surface as
    /// [`ReadlineError::Interrupted`], so this is the only wrapping most
    /// callers need.
    pub fn handle_interrupt<T>(
        &mut self,
        handler: impl FnOnce(&mut Session) -> Result<T>,
        body: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<T> {
        match body(self) {
            Err(ReadlineError::Interrupted) => handler(self),
            other => other,
        }
    }

    /// Print a line above the prompt without corrupting it. Safe to call
    /// between `read_line` calls.
    pub fn output_line(&mut self, text: &str) -> Result<()> {
        match &mut self.backend {
            Backend::Plain => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                writeln!(out, "{text}")?;
                out.flush()?;
                Ok(())
            }
            Backend::Interactive { renderer, .. } => {
                renderer.print_line(text)?;
                Ok(())
            }
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn modify_history(&mut self, f: impl FnOnce(&mut History)) {
        f(&mut self.history);
    }

    /// Persist history now (also happens on drop).
    pub fn save_history(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(err) = self.history.save(path) {
                log_to(&mut self.logger, &format!("history save failed: {err}"));
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.save_history();
    }
}

fn log_to(logger: &mut Option<LogSink>, message: &str) {
    if let Some(sink) = logger {
        sink(message);
    }
}

/// Prompt on stdout, read a line from stdin, no editing.
fn plain_read_line(prompt: &str) -> io::Result<Option<String>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(prompt.as_bytes())?;
    out.flush()?;
    let stdin = io::stdin();
    let mut line = String::new();
    if stdin.lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

// --- the per-line edit loop ----------------------------------------------

/// Tracks the insertion made by the last yank so yank-pop can swap it.
struct YankState {
    at: usize,
    len: usize,
}

/// Inline menu-completion state: repeated Tab cycles, anything else
/// commits.
struct MenuState {
    candidates: Vec<Completion>,
    unused_left: Vec<char>,
    index: usize,
    base: LineState,
}

struct EditCtx {
    prompt: String,
    line: LineState,
    undo: UndoLog,
    cursor: HistoryCursor,
    yank: Option<YankState>,
    menu: Option<MenuState>,
    /// ListOrMenu: a listing has been shown; the next Tab starts cycling.
    menu_armed: bool,
}

impl EditCtx {
    fn new(prompt: &str, initial: (&str, &str)) -> Self {
        EditCtx {
            prompt: prompt.to_string(),
            line: LineState::from_parts(initial.0, initial.1),
            undo: UndoLog::new(),
            cursor: HistoryCursor::new(),
            yank: None,
            menu: None,
            menu_armed: false,
        }
    }
}

enum Flow {
    Continue,
    Accept,
    Eof,
}

struct EditLoop<'a> {
    input: &'a mut dyn TermInput,
    renderer: &'a mut Renderer,
    prefs: &'a Prefs,
    history: &'a mut History,
    kill_ring: &'a mut KillRing,
    completer: &'a dyn Completer,
    logger: &'a mut Option<LogSink>,
    discipline: Discipline,
    ctx: EditCtx,
    raw: Option<RawModeGuard>,
    /// Event handed back by a sub-mode (incremental search) to be
    /// redispatched through the normal path.
    replay: Option<TermEvent>,
}

impl<'a> EditLoop<'a> {
    fn run(&mut self) -> Result<Option<String>> {
        self.raw = Some(self.input.enable_raw_mode()?);
        if let Ok((w, _)) = self.input.window_size() {
            self.renderer.set_width(w);
        }
        self.kill_ring.break_chain();
        self.discipline.reset();

        loop {
            self.draw()?;
            let timeout = if self.discipline.has_pending() {
                Some(KEYSEQ_TIMEOUT)
            } else {
                None
            };
            let event = match self.replay.take() {
                Some(event) => Some(event),
                None => self.input.next_event(timeout)?,
            };
            let Some(event) = event else {
                let steps = self.discipline.flush();
                match self.drive(steps)? {
                    Flow::Continue => continue,
                    Flow::Accept => return self.accept(),
                    Flow::Eof => return self.eof(),
                }
            };
            match event {
                TermEvent::Key(key) => {
                    let steps = self.discipline.handle(key);
                    match self.drive(steps)? {
                        Flow::Continue => {}
                        Flow::Accept => return self.accept(),
                        Flow::Eof => return self.eof(),
                    }
                }
                TermEvent::Resize(w, _) => self.renderer.resize(w)?,
                TermEvent::Interrupt => {
                    self.renderer.finish_line()?;
                    return Err(ReadlineError::Interrupted);
                }
                TermEvent::Suspend => self.handle_suspend()?,
                TermEvent::Eof => {
                    if self.ctx.line.is_empty() {
                        return self.eof();
                    }
                    return self.accept();
                }
            }
        }
    }

    fn accept(&mut self) -> Result<Option<String>> {
        let text = self.ctx.line.text();
        self.renderer.finish_line()?;
        Ok(Some(text))
    }

    fn eof(&mut self) -> Result<Option<String>> {
        self.renderer.finish_line()?;
        Ok(None)
    }

    fn draw(&mut self) -> Result<()> {
        self.renderer.draw(
            &self.ctx.prompt,
            &self.ctx.line.text(),
            self.ctx.line.cursor(),
            None,
        )?;
        Ok(())
    }

    fn drive(&mut self, steps: Vec<DispatchStep>) -> Result<Flow> {
        for step in steps {
            let flow = match step {
                DispatchStep::Cmd(cmd) => self.apply(cmd)?,
                DispatchStep::Pending => Flow::Continue,
                DispatchStep::Unbound(ev) => {
                    match ev.plain_char().filter(|c| !c.is_control()) {
                        Some(c) => self.apply(Cmd::SelfInsert(1, c))?,
                        None => {
                            self.renderer.bell()?;
                            Flow::Continue
                        }
                    }
                }
            };
            match flow {
                Flow::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_suspend(&mut self) -> Result<()> {
        if let Some(guard) = self.raw.take() {
            guard.restore();
        }
        self.input.suspend_process()?;
        self.raw = Some(self.input.enable_raw_mode()?);
        self.renderer.invalidate();
        Ok(())
    }

    fn bell(&mut self) -> Result<()> {
        self.renderer.bell()?;
        Ok(())
    }

    fn log(&mut self, message: &str) {
        log_to(self.logger, message);
    }

    fn record_undo(&mut self) {
        self.ctx.undo.record(&self.ctx.line);
    }

    /// Interpret one command against the session state.
    fn apply(&mut self, cmd: Cmd) -> Result<Flow> {
        // Menu completion commits on anything that is not another Tab.
        if !matches!(cmd, Cmd::Complete) {
            self.ctx.menu = None;
            self.ctx.menu_armed = false;
        }
        let preserves_yank = matches!(cmd, Cmd::Yank(..) | Cmd::YankPop);
        let is_kill = matches!(cmd, Cmd::Kill(_));

        let flow = match cmd {
            Cmd::SelfInsert(n, c) => {
                self.record_undo();
                for _ in 0..n.max(1) {
                    self.ctx.line = self.ctx.line.insert_char(c);
                }
                Flow::Continue
            }
            Cmd::Insert(text) => {
                self.record_undo();
                self.ctx.line = self.ctx.line.insert_str(&text);
                Flow::Continue
            }
            Cmd::Move(movement) => {
                self.ctx.line = self.ctx.line.apply_movement(&movement);
                Flow::Continue
            }
            Cmd::Kill(movement) => {
                let direction = if self.ctx.line.target(&movement) < self.ctx.line.cursor() {
                    KillDirection::Backward
                } else {
                    KillDirection::Forward
                };
                let (next, killed) = self.ctx.line.delete_from_move(&movement);
                if killed.is_empty() {
                    self.bell()?;
                } else {
                    self.record_undo();
                    self.kill_ring.kill(&killed, direction);
                    self.ctx.line = next;
                }
                Flow::Continue
            }
            Cmd::Delete(movement) => {
                let (next, deleted) = self.ctx.line.delete_from_move(&movement);
                if deleted.is_empty() {
                    self.bell()?;
                } else {
                    self.record_undo();
                    self.ctx.line = next;
                }
                Flow::Continue
            }
            Cmd::DeleteOrEof => {
                if self.ctx.line.is_empty() {
                    Flow::Eof
                } else {
                    let (next, deleted) =
                        self.ctx.line.delete_from_move(&Movement::ForwardChar(1));
                    if deleted.is_empty() {
                        self.bell()?;
                    } else {
                        self.record_undo();
                        self.ctx.line = next;
                    }
                    Flow::Continue
                }
            }
            Cmd::Yank(n, anchor) => {
                self.do_yank(n, anchor)?;
                Flow::Continue
            }
            Cmd::YankPop => {
                self.do_yank_pop()?;
                Flow::Continue
            }
            Cmd::CopyToKillRing(movement) => {
                let (_, text) = self.ctx.line.delete_from_move(&movement);
                if text.is_empty() {
                    self.bell()?;
                } else {
                    self.kill_ring.break_chain();
                    self.kill_ring.kill(&text, KillDirection::Forward);
                }
                Flow::Continue
            }
            Cmd::Undo => {
                match self.ctx.undo.undo() {
                    Some(previous) => self.ctx.line = previous,
                    None => self.bell()?,
                }
                Flow::Continue
            }
            Cmd::TransposeChars => {
                let next = self.ctx.line.transpose_chars();
                if next == self.ctx.line {
                    self.bell()?;
                } else {
                    self.record_undo();
                    self.ctx.line = next;
                }
                Flow::Continue
            }
            Cmd::Replace(n, c) => {
                let n = n.max(1);
                if self.ctx.line.cursor() + n <= self.ctx.line.len() {
                    self.record_undo();
                    for _ in 0..n {
                        self.ctx.line = self.ctx.line.replace_char(c).right();
                    }
                    self.ctx.line = self.ctx.line.left();
                } else {
                    self.bell()?;
                }
                Flow::Continue
            }
            Cmd::ClearScreen => {
                self.renderer.clear_screen()?;
                Flow::Continue
            }
            Cmd::AcceptLine => Flow::Accept,
            Cmd::Complete => {
                self.do_complete()?;
                Flow::Continue
            }
            Cmd::HistoryPrev => {
                let current = self.ctx.line.text();
                let recalled = self
                    .ctx
                    .cursor
                    .back(self.history, &current)
                    .map(|s| s.to_string());
                match recalled {
                    Some(text) => {
                        self.record_undo();
                        self.ctx.line = LineState::from_parts(&text, "");
                    }
                    None => self.bell()?,
                }
                Flow::Continue
            }
            Cmd::HistoryNext => {
                match self.ctx.cursor.forward(self.history) {
                    Some(text) => {
                        self.record_undo();
                        self.ctx.line = LineState::from_parts(&text, "");
                    }
                    None => self.bell()?,
                }
                Flow::Continue
            }
            Cmd::BeginningOfHistory => {
                let current = self.ctx.line.text();
                let recalled = self
                    .ctx
                    .cursor
                    .to_first(self.history, &current)
                    .map(|s| s.to_string());
                match recalled {
                    Some(text) => {
                        self.record_undo();
                        self.ctx.line = LineState::from_parts(&text, "");
                    }
                    None => self.bell()?,
                }
                Flow::Continue
            }
            Cmd::EndOfHistory => {
                match self.ctx.cursor.to_last() {
                    Some(text) => {
                        self.record_undo();
                        self.ctx.line = LineState::from_parts(&text, "");
                    }
                    None => self.bell()?,
                }
                Flow::Continue
            }
            Cmd::ReverseSearch => self.reverse_search()?,
            Cmd::Beep => {
                self.bell()?;
                Flow::Continue
            }
            Cmd::Noop => Flow::Continue,
        };

        if !is_kill {
            self.kill_ring.break_chain();
        }
        if !preserves_yank {
            self.ctx.yank = None;
        }
        // In Vi command-like states the cursor rests ON a character, never
        // past the end.
        if self.discipline.vi_command_state()
            && self.ctx.line.cursor() == self.ctx.line.len()
            && !self.ctx.line.is_empty()
        {
            self.ctx.line = self.ctx.line.left();
        }
        Ok(flow)
    }

    fn do_yank(&mut self, n: usize, anchor: Anchor) -> Result<()> {
        let Some(text) = self.kill_ring.head().map(String::from) else {
            return self.bell();
        };
        self.record_undo();
        if anchor == Anchor::After && self.ctx.line.char_at_cursor().is_some() {
            self.ctx.line = self.ctx.line.right();
        }
        let at = self.ctx.line.cursor();
        let mut inserted = String::new();
        for _ in 0..n.max(1) {
            inserted.push_str(&text);
        }
        self.ctx.line = self.ctx.line.insert_str(&inserted);
        self.ctx.yank = Some(YankState {
            at,
            len: inserted.chars().count(),
        });
        Ok(())
    }

    fn do_yank_pop(&mut self) -> Result<()> {
        let Some(previous) = self.ctx.yank.take() else {
            return self.bell();
        };
        let Some(text) = self.kill_ring.rotate().map(String::from) else {
            return self.bell();
        };
        self.record_undo();
        let (stripped, _) = self
            .ctx
            .line
            .delete_from_move(&Movement::BackwardChar(previous.len));
        self.ctx.line = stripped.insert_str(&text);
        self.ctx.yank = Some(YankState {
            at: previous.at,
            len: text.chars().count(),
        });
        Ok(())
    }

    // --- completion ------------------------------------------------------

    fn do_complete(&mut self) -> Result<()> {
        // Repeated Tab in menu mode cycles candidates in place.
        if let Some(menu) = &mut self.ctx.menu {
            menu.index = (menu.index + 1) % menu.candidates.len();
            let candidate = &menu.candidates[menu.index];
            self.ctx.line = replace_word(&menu.base, &menu.unused_left, &candidate.replacement);
            return Ok(());
        }

        let before_rev: Vec<char> = self.ctx.line.prefix_reversed().to_vec();
        let after = self.ctx.line.after_cursor();
        let completer = self.completer;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            completer.complete(&before_rev, &after)
        }));
        let (unused, candidates) = match outcome {
            Ok(result) => result,
            Err(_) => {
                self.log("completer failed; input continues");
                return self.bell();
            }
        };
        if candidates.is_empty() {
            return self.bell();
        }

        if candidates.len() == 1 {
            let candidate = &candidates[0];
            self.record_undo();
            self.ctx.line = replace_word(&self.ctx.line, &unused, &candidate.replacement);
            if candidate.is_finished {
                self.ctx.line = self.ctx.line.insert_char(' ');
            }
            return Ok(());
        }

        match self.prefs.completion_type {
            CompletionType::Menu => self.enter_menu(unused, candidates),
            CompletionType::List => self.list_step(unused, candidates, false),
            CompletionType::ListOrMenu => self.list_step(unused, candidates, true),
        }
    }

    fn enter_menu(&mut self, unused_left: Vec<char>, candidates: Vec<Completion>) -> Result<()> {
        self.record_undo();
        let base = self.ctx.line.clone();
        self.ctx.line = replace_word(&base, &unused_left, &candidates[0].replacement);
        self.ctx.menu = Some(MenuState {
            candidates,
            unused_left,
            index: 0,
            base,
        });
        Ok(())
    }

    fn list_step(
        &mut self,
        unused: Vec<char>,
        candidates: Vec<Completion>,
        menu_on_repeat: bool,
    ) -> Result<()> {
        // A well-behaved completer returns a suffix of the left half as
        // unused; clamp in case a user completer does not.
        let word_len = self.ctx.line.cursor().saturating_sub(unused.len());
        let word: String = self
            .ctx
            .line
            .prefix_reversed()[..word_len]
            .iter()
            .rev()
            .collect();
        let prefix = common_prefix(&candidates);
        if !prefix.is_empty() && prefix != word {
            // Progress: extend to the longest common prefix.
            self.record_undo();
            self.ctx.line = replace_word(&self.ctx.line, &unused, &prefix);
            return Ok(());
        }
        if menu_on_repeat && self.ctx.menu_armed {
            return self.enter_menu(unused, candidates);
        }
        self.bell()?;
        self.list_candidates(&candidates)?;
        self.ctx.menu_armed = true;
        Ok(())
    }

    fn list_candidates(&mut self, candidates: &[Completion]) -> Result<()> {
        if let Some(limit) = self.prefs.completion_prompt_limit {
            if candidates.len() > limit && !self.confirm_listing(candidates.len())? {
                return Ok(());
            }
        }
        let displays: Vec<&str> = candidates.iter().map(|c| c.display.as_str()).collect();
        let listing = format_columns(&displays, self.renderer.width());
        self.renderer.print_below(&listing)?;
        Ok(())
    }

    /// `Display all N possibilities? (y/n)` — wait for the answer.
    fn confirm_listing(&mut self, count: usize) -> Result<bool> {
        self.renderer
            .print_below(&format!("Display all {count} possibilities? (y/n)"))?;
        loop {
            match self.input.next_event(None)? {
                Some(TermEvent::Key(k)) => match k.plain_char() {
                    Some('y') | Some('Y') => return Ok(true),
                    Some('n') | Some('N') => return Ok(false),
                    _ => {
                        if k == KeyEvent::ctrl('g')
                            || k == KeyEvent::fun(FnKey::Escape)
                            || k == KeyEvent::fun(FnKey::Enter)
                        {
                            return Ok(false);
                        }
                    }
                },
                Some(TermEvent::Interrupt) => return Err(ReadlineError::Interrupted),
                Some(TermEvent::Eof) | None => return Ok(false),
                Some(TermEvent::Resize(w, _)) => self.renderer.resize(w)?,
                Some(TermEvent::Suspend) => self.handle_suspend()?,
            }
        }
    }

    // --- incremental reverse search --------------------------------------

    fn reverse_search(&mut self) -> Result<Flow> {
        let saved = self.ctx.line.clone();
        let mut query = String::new();
        let mut found: Option<(usize, usize)> = None;
        let mut failing = false;

        loop {
            let (text, cursor, highlight) = match found {
                Some((idx, offset)) => {
                    let entry = self.history.get(idx).unwrap_or("").to_string();
                    let start = entry[..offset].chars().count();
                    let qlen = query.chars().count();
                    (entry, start, Some((start, start + qlen)))
                }
                None => (saved.text(), saved.cursor(), None),
            };
            let prompt = format!(
                "({}reverse-i-search)`{query}': ",
                if failing { "failed " } else { "" }
            );
            self.renderer.draw(&prompt, &text, cursor, highlight)?;

            let Some(event) = self.input.next_event(None)? else {
                continue;
            };
            match event {
                TermEvent::Key(k) => {
                    if k == KeyEvent::ctrl('r') {
                        let below = match found {
                            Some((0, _)) => {
                                failing = true;
                                continue;
                            }
                            Some((idx, _)) => idx - 1,
                            None => usize::MAX,
                        };
                        match self.history.search_backward(&query, below) {
                            Some(hit) => {
                                found = Some(hit);
                                failing = false;
                            }
                            None => failing = true,
                        }
                    } else if k == KeyEvent::ctrl('g') || k == KeyEvent::fun(FnKey::Escape) {
                        self.ctx.line = saved;
                        return Ok(Flow::Continue);
                    } else if k == KeyEvent::fun(FnKey::Enter) {
                        if let Some((idx, _)) = found {
                            let entry = self.history.get(idx).unwrap_or("").to_string();
                            self.ctx.line = LineState::from_parts(&entry, "");
                        } else {
                            self.ctx.line = saved;
                        }
                        return Ok(Flow::Accept);
                    } else if k == KeyEvent::fun(FnKey::Backspace) || k == KeyEvent::ctrl('h') {
                        query.pop();
                        if query.is_empty() {
                            found = None;
                            failing = false;
                        } else {
                            match self.history.search_backward(&query, usize::MAX) {
                                Some(hit) => {
                                    found = Some(hit);
                                    failing = false;
                                }
                                None => failing = true,
                            }
                        }
                    } else if let Some(c) = k.plain_char().filter(|c| !c.is_control()) {
                        query.push(c);
                        let below = found.map(|(idx, _)| idx).unwrap_or(usize::MAX);
                        match self.history.search_backward(&query, below) {
                            Some(hit) => {
                                found = Some(hit);
                                failing = false;
                            }
                            // The failed query stays visible; the display
                            // keeps the last good match.
                            None => failing = true,
                        }
                    } else {
                        // Any editing key leaves search mode, adopting the
                        // current match, and is redispatched normally.
                        if let Some((idx, offset)) = found {
                            let entry = self.history.get(idx).unwrap_or("").to_string();
                            let start: String =
                                entry.chars().take(entry[..offset].chars().count()).collect();
                            let rest: String = entry.chars().skip(start.chars().count()).collect();
                            self.ctx.line = LineState::from_parts(&start, &rest);
                        }
                        self.replay = Some(TermEvent::Key(k));
                        return Ok(Flow::Continue);
                    }
                }
                TermEvent::Resize(w, _) => self.renderer.resize(w)?,
                TermEvent::Interrupt => {
                    self.ctx.line = saved;
                    self.renderer.finish_line()?;
                    return Err(ReadlineError::Interrupted);
                }
                TermEvent::Suspend => self.handle_suspend()?,
                TermEvent::Eof => {
                    self.ctx.line = saved;
                    return Ok(Flow::Continue);
                }
            }
        }
    }
}

/// Lay candidate names out in columns that fit the terminal width.
fn format_columns(names: &[&str], width: usize) -> String {
    use linekit_core::unicode::str_width;

    let col_width = names.iter().map(|n| str_width(n)).max().unwrap_or(0) + 2;
    let columns = (width / col_width.max(1)).max(1);
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        out.push_str(name);
        let at_row_end = (i + 1) % columns == 0;
        if i + 1 < names.len() {
            if at_row_end {
                out.push('\n');
            } else {
                for _ in str_width(name)..col_width {
                    out.push(' ');
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_columns_fits_width() {
        let names = ["alpha", "beta", "gamma", "delta"];
        let out = format_columns(&names, 20);
        for line in out.lines() {
            assert!(linekit_core::unicode::str_width(line) <= 20);
        }
        for name in names {
            assert!(out.contains(name));
        }
    }

    #[test]
    fn format_columns_single_column_when_narrow() {
        let names = ["longcandidatename", "anotherlongname"];
        let out = format_columns(&names, 10);
        assert_eq!(out.lines().count(), 2);
    }
}
