//! Unix VT back-end: termios raw mode, ANSI output, poll-multiplexed
//! input.
//!
//! Keystrokes and signals converge on one queue. The input fd is read
//! non-blocking under `poll(2)`; SIGINT, SIGWINCH and SIGTSTP handlers
//! write a byte down a self-pipe whose read end sits in the same `poll`
//! set, which keeps signal delivery ordered with respect to keystrokes
//! without any locking in the handler.

use std::collections::VecDeque;
use std::env;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use linekit_core::prefs::BellStyle;
use linekit_core::{KeyEvent, KeyParser, TermEvent};

use crate::dumb::DumbOutput;
use crate::{BackendKind, Capabilities, RawModeGuard, TermError, TermInput, TermOutput, TermResult};

/// How long a partial escape sequence may wait for its next byte before the
/// parser is flushed and the lone ESC (plus orphans) is emitted.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

fn io_err(err: io::Error) -> TermError {
    TermError::Io(err.to_string())
}

fn last_os_error() -> TermError {
    io_err(io::Error::last_os_error())
}

// --- signal plumbing -----------------------------------------------------

/// Write end of the self-pipe, visible to the async signal handler. Only
/// one Unix input exists per process (the terminal device is exclusive for
/// the duration of a session).
static SIGNAL_PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);

extern "C" fn forward_signal(sig: libc::c_int) {
    let fd = SIGNAL_PIPE_WRITE.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = sig as u8;
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

const FORWARDED_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGWINCH, libc::SIGTSTP];

struct SignalGuard {
    read_fd: RawFd,
    write_fd: RawFd,
    saved: Vec<(libc::c_int, libc::sigaction)>,
}

impl SignalGuard {
    fn install() -> TermResult<Self> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(last_os_error());
        }
        for fd in fds {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                let fd_flags = libc::fcntl(fd, libc::F_GETFD);
                libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC);
            }
        }
        SIGNAL_PIPE_WRITE.store(fds[1], Ordering::Relaxed);

        let mut saved = Vec::new();
        for sig in FORWARDED_SIGNALS {
            let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
            action.sa_sigaction = forward_signal as usize;
            unsafe { libc::sigemptyset(&mut action.sa_mask) };
            let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
            if unsafe { libc::sigaction(sig, &action, &mut old) } == -1 {
                return Err(last_os_error());
            }
            saved.push((sig, old));
        }
        Ok(SignalGuard {
            read_fd: fds[0],
            write_fd: fds[1],
            saved,
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (sig, old) in &self.saved {
            unsafe {
                libc::sigaction(*sig, old, std::ptr::null_mut());
            }
        }
        SIGNAL_PIPE_WRITE.store(-1, Ordering::Relaxed);
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

// --- input ---------------------------------------------------------------

pub struct UnixTermInput {
    stdin_fd: RawFd,
    parser: KeyParser,
    queue: VecDeque<TermEvent>,
    signals: SignalGuard,
}

impl UnixTermInput {
    pub fn new() -> TermResult<Self> {
        let stdin_fd = libc::STDIN_FILENO;
        if unsafe { libc::isatty(stdin_fd) } == 0 {
            return Err(TermError::NotATty);
        }
        Ok(UnixTermInput {
            stdin_fd,
            parser: KeyParser::new(),
            queue: VecDeque::new(),
            signals: SignalGuard::install()?,
        })
    }

    fn queue_key(&mut self, key: KeyEvent) {
        // Raw mode turns off the kernel's signal generation, so Ctrl-C and
        // Ctrl-Z arrive as plain bytes and are synthesized into the same
        // events a real signal produces.
        let event = if key == KeyEvent::ctrl('c') {
            TermEvent::Interrupt
        } else if key == KeyEvent::ctrl('z') {
            TermEvent::Suspend
        } else {
            TermEvent::Key(key)
        };
        self.queue.push_back(event);
    }

    fn read_stdin(&mut self) -> TermResult<()> {
        let mut buf = [0u8; 256];
        let n = unsafe {
            libc::read(
                self.stdin_fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(());
            }
            return Err(io_err(err));
        }
        if n == 0 {
            self.queue.push_back(TermEvent::Eof);
            return Ok(());
        }
        let keys = self.parser.feed(&buf[..n as usize]);
        for key in keys {
            self.queue_key(key);
        }
        Ok(())
    }

    fn drain_signals(&mut self) -> TermResult<()> {
        let mut buf = [0u8; 32];
        loop {
            let n = unsafe {
                libc::read(
                    self.signals.read_fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                return Ok(());
            }
            for &byte in &buf[..n as usize] {
                match byte as libc::c_int {
                    libc::SIGINT => self.queue.push_back(TermEvent::Interrupt),
                    libc::SIGTSTP => self.queue.push_back(TermEvent::Suspend),
                    libc::SIGWINCH => {
                        let (cols, rows) = self.window_size()?;
                        self.queue.push_back(TermEvent::Resize(cols, rows));
                    }
                    _ => {}
                }
            }
        }
    }
}

impl TermInput for UnixTermInput {
    fn enable_raw_mode(&mut self) -> TermResult<RawModeGuard> {
        let fd = self.stdin_fd;
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
            return Err(TermError::Setup(io::Error::last_os_error().to_string()));
        }
        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON
            | libc::ECHO
            | libc::ECHOE
            | libc::ECHOK
            | libc::ECHONL
            | libc::ISIG
            | libc::IEXTEN);
        raw.c_iflag &= !(libc::IXON
            | libc::IXOFF
            | libc::ICRNL
            | libc::INLCR
            | libc::IGNCR
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP);
        raw.c_oflag &= !libc::OPOST;
        raw.c_cflag &= !libc::CSIZE;
        raw.c_cflag |= libc::CS8;
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(TermError::Setup(io::Error::last_os_error().to_string()));
        }
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags == -1 {
            return Err(last_os_error());
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
            return Err(last_os_error());
        }
        Ok(RawModeGuard::new(move || unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &original);
            libc::fcntl(fd, libc::F_SETFL, flags);
        }))
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> TermResult<Option<TermEvent>> {
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }

            let remaining = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return Ok(None);
                    }
                    Some(d - now)
                }
                None => None,
            };
            let wait = match (remaining, self.parser.has_pending()) {
                (Some(r), true) => Some(r.min(ESCAPE_TIMEOUT)),
                (Some(r), false) => Some(r),
                (None, true) => Some(ESCAPE_TIMEOUT),
                (None, false) => None,
            };
            let poll_ms: libc::c_int = match wait {
                Some(d) => d.as_millis().min(i32::MAX as u128) as libc::c_int,
                None => -1,
            };

            let mut fds = [
                libc::pollfd {
                    fd: self.stdin_fd,
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: self.signals.read_fd,
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, poll_ms) };
            if rc == -1 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(io_err(err));
            }
            if rc == 0 {
                if self.parser.has_pending() {
                    let keys = self.parser.flush();
                    for key in keys {
                        self.queue_key(key);
                    }
                    continue;
                }
                return Ok(None);
            }
            // Signals first: they were conceptually delivered before any
            // bytes poll reported in the same wakeup were read.
            if fds[1].revents & libc::POLLIN != 0 {
                self.drain_signals()?;
            }
            if fds[0].revents & libc::POLLIN != 0 {
                self.read_stdin()?;
            } else if fds[0].revents & (libc::POLLHUP | libc::POLLERR) != 0 {
                self.queue.push_back(TermEvent::Eof);
            }
        }
    }

    fn window_size(&self) -> TermResult<(u16, u16)> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) } == -1 {
            return Err(last_os_error());
        }
        Ok((ws.ws_col, ws.ws_row))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BackendKind::UnixVt,
            is_interactive: true,
            supports_cursor_motion: true,
        }
    }

    fn suspend_process(&mut self) -> TermResult<()> {
        // Hand the stop to the default disposition, then re-arm forwarding
        // once the process is continued.
        unsafe {
            let mut default_action: libc::sigaction = std::mem::zeroed();
            default_action.sa_sigaction = libc::SIG_DFL;
            libc::sigemptyset(&mut default_action.sa_mask);
            let mut forwarding: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(libc::SIGTSTP, &default_action, &mut forwarding) == -1 {
                return Err(last_os_error());
            }
            libc::raise(libc::SIGTSTP);
            // Execution resumes here after SIGCONT.
            if libc::sigaction(libc::SIGTSTP, &forwarding, std::ptr::null_mut()) == -1 {
                return Err(last_os_error());
            }
        }
        Ok(())
    }
}

// --- output --------------------------------------------------------------

/// ANSI output over the stdout fd, buffered until `flush`.
pub struct UnixTermOutput {
    stdout_fd: RawFd,
    buffer: Vec<u8>,
}

impl UnixTermOutput {
    pub fn new() -> TermResult<Self> {
        if unsafe { libc::isatty(libc::STDOUT_FILENO) } == 0 {
            return Err(TermError::NotATty);
        }
        Ok(UnixTermOutput {
            stdout_fd: libc::STDOUT_FILENO,
            buffer: Vec::with_capacity(1024),
        })
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn write_direct(&self, bytes: &[u8]) -> TermResult<()> {
        let mut written = 0;
        while written < bytes.len() {
            let n = unsafe {
                libc::write(
                    self.stdout_fd,
                    bytes[written..].as_ptr() as *const libc::c_void,
                    bytes.len() - written,
                )
            };
            if n == -1 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(io_err(err));
            }
            written += n as usize;
        }
        Ok(())
    }
}

impl TermOutput for UnixTermOutput {
    fn write_text(&mut self, text: &str) -> TermResult<()> {
        self.push(text.as_bytes());
        Ok(())
    }

    fn write_reversed(&mut self, text: &str) -> TermResult<()> {
        self.push(b"\x1b[7m");
        self.push(text.as_bytes());
        self.push(b"\x1b[27m");
        Ok(())
    }

    fn move_cursor_rel(&mut self, rows: i16, cols: i16) -> TermResult<()> {
        if rows > 0 {
            self.push(format!("\x1b[{rows}B").as_bytes());
        } else if rows < 0 {
            self.push(format!("\x1b[{}A", -rows).as_bytes());
        }
        if cols > 0 {
            self.push(format!("\x1b[{cols}C").as_bytes());
        } else if cols < 0 {
            self.push(format!("\x1b[{}D", -cols).as_bytes());
        }
        Ok(())
    }

    fn carriage_return(&mut self) -> TermResult<()> {
        self.push(b"\r");
        Ok(())
    }

    fn clear_to_eol(&mut self) -> TermResult<()> {
        self.push(b"\x1b[K");
        Ok(())
    }

    fn clear_to_eos(&mut self) -> TermResult<()> {
        self.push(b"\x1b[J");
        Ok(())
    }

    fn clear_screen(&mut self) -> TermResult<()> {
        self.push(b"\x1b[H\x1b[2J");
        Ok(())
    }

    fn bell(&mut self, style: BellStyle) -> TermResult<()> {
        match style {
            BellStyle::None => Ok(()),
            BellStyle::Audible => {
                self.push(b"\x07");
                Ok(())
            }
            BellStyle::Visual => {
                // Flash via DECSCNM reverse video, briefly.
                self.push(b"\x1b[?5h");
                self.flush()?;
                std::thread::sleep(Duration::from_millis(30));
                self.push(b"\x1b[?5l");
                self.flush()
            }
        }
    }

    fn flush(&mut self) -> TermResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.buffer);
        self.write_direct(&bytes)
    }
}

/// Pick the right Unix back-end for the process's stdio.
pub fn stdio_backend() -> TermResult<(Box<dyn TermInput>, Box<dyn TermOutput>, Capabilities)> {
    let input = UnixTermInput::new()?;
    let term = env::var("TERM").unwrap_or_default();
    if term.is_empty() || term == "dumb" {
        let output = DumbOutput::new()?;
        let caps = Capabilities {
            backend: BackendKind::Dumb,
            is_interactive: true,
            supports_cursor_motion: false,
        };
        return Ok((Box::new(input), Box::new(output), caps));
    }
    let output = UnixTermOutput::new()?;
    let caps = input.capabilities();
    Ok((Box::new(input), Box::new(output), caps))
}
