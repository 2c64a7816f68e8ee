//! Output half of the dumb-terminal fallback.
//!
//! A dumb terminal (`TERM=dumb`, or no `TERM` at all) has no cursor
//! addressing and no clears. The only primitives that work are plain text,
//! carriage return and the audible bell; the renderer keeps everything on
//! one physical line and overwrites with spaces. Input still goes through
//! the normal Unix event stream.

use linekit_core::prefs::BellStyle;
use std::io;
use std::os::unix::io::RawFd;

use crate::{TermError, TermOutput, TermResult};

pub struct DumbOutput {
    stdout_fd: RawFd,
    buffer: Vec<u8>,
}

impl DumbOutput {
    pub fn new() -> TermResult<Self> {
        Ok(DumbOutput {
            stdout_fd: libc::STDOUT_FILENO,
            buffer: Vec::with_capacity(256),
        })
    }
}

impl TermOutput for DumbOutput {
    fn write_text(&mut self, text: &str) -> TermResult<()> {
        self.buffer.extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn write_reversed(&mut self, text: &str) -> TermResult<()> {
        // No attributes on a dumb terminal.
        self.write_text(text)
    }

    fn move_cursor_rel(&mut self, _rows: i16, _cols: i16) -> TermResult<()> {
        Err(TermError::Unsupported {
            what: "cursor motion",
        })
    }

    fn carriage_return(&mut self) -> TermResult<()> {
        self.buffer.push(b'\r');
        Ok(())
    }

    fn clear_to_eol(&mut self) -> TermResult<()> {
        Err(TermError::Unsupported {
            what: "clear to end of line",
        })
    }

    fn clear_to_eos(&mut self) -> TermResult<()> {
        Err(TermError::Unsupported {
            what: "clear to end of screen",
        })
    }

    fn clear_screen(&mut self) -> TermResult<()> {
        Err(TermError::Unsupported {
            what: "clear screen",
        })
    }

    fn bell(&mut self, style: BellStyle) -> TermResult<()> {
        if style != BellStyle::None {
            self.buffer.push(0x07);
        }
        Ok(())
    }

    fn flush(&mut self) -> TermResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.buffer);
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
                return Err(TermError::Io(err.to_string()));
            }
            written += n as usize;
        }
        Ok(())
    }
}
