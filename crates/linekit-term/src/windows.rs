//! Windows console back-end.
//!
//! Uses the console API directly for both halves: `ReadConsoleInputW` for
//! key and resize records (no escape-sequence parsing needed) and screen
//! buffer calls for cursor motion and clearing. Declarations are kept
//! local; only the handful of calls this back-end needs are bound.

#![cfg(windows)]

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use linekit_core::prefs::BellStyle;
use linekit_core::{FnKey, Key, KeyEvent, TermEvent};

use crate::{BackendKind, Capabilities, RawModeGuard, TermError, TermInput, TermOutput, TermResult};

type BOOL = i32;
type HANDLE = isize;
type DWORD = u32;
type WORD = u16;
type WCHAR = u16;
type SHORT = i16;

const STD_INPUT_HANDLE: DWORD = 0xFFFF_FFF6; // (DWORD)-10
const STD_OUTPUT_HANDLE: DWORD = 0xFFFF_FFF5; // (DWORD)-11
const INVALID_HANDLE_VALUE: HANDLE = -1;
const WAIT_OBJECT_0: DWORD = 0x0000_0000;
const WAIT_TIMEOUT: DWORD = 0x0000_0102;

const KEY_EVENT: WORD = 0x0001;
const WINDOW_BUFFER_SIZE_EVENT: WORD = 0x0004;

const ENABLE_PROCESSED_INPUT: DWORD = 0x0001;
const ENABLE_LINE_INPUT: DWORD = 0x0002;
const ENABLE_ECHO_INPUT: DWORD = 0x0004;
const ENABLE_WINDOW_INPUT: DWORD = 0x0008;

const LEFT_CTRL_PRESSED: DWORD = 0x0008;
const RIGHT_CTRL_PRESSED: DWORD = 0x0004;
const LEFT_ALT_PRESSED: DWORD = 0x0002;
const RIGHT_ALT_PRESSED: DWORD = 0x0001;
const SHIFT_PRESSED: DWORD = 0x0010;

#[repr(C)]
#[derive(Copy, Clone)]
struct COORD {
    x: SHORT,
    y: SHORT,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct SMALL_RECT {
    left: SHORT,
    top: SHORT,
    right: SHORT,
    bottom: SHORT,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct CONSOLE_SCREEN_BUFFER_INFO {
    size: COORD,
    cursor_position: COORD,
    attributes: WORD,
    window: SMALL_RECT,
    maximum_window_size: COORD,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct KEY_EVENT_RECORD {
    key_down: BOOL,
    repeat_count: WORD,
    virtual_key_code: WORD,
    virtual_scan_code: WORD,
    unicode_char: WCHAR,
    control_key_state: DWORD,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct INPUT_RECORD {
    event_type: WORD,
    // The event union is DWORD-aligned, hence the explicit padding; the
    // array is large enough for every record variant.
    _padding: WORD,
    event: [u8; 16],
}

extern "system" {
    fn GetStdHandle(handle: DWORD) -> HANDLE;
    fn GetConsoleMode(handle: HANDLE, mode: *mut DWORD) -> BOOL;
    fn SetConsoleMode(handle: HANDLE, mode: DWORD) -> BOOL;
    fn ReadConsoleInputW(
        handle: HANDLE,
        buffer: *mut INPUT_RECORD,
        length: DWORD,
        read: *mut DWORD,
    ) -> BOOL;
    fn WaitForSingleObject(handle: HANDLE, timeout_ms: DWORD) -> DWORD;
    fn GetConsoleScreenBufferInfo(handle: HANDLE, info: *mut CONSOLE_SCREEN_BUFFER_INFO) -> BOOL;
    fn SetConsoleCursorPosition(handle: HANDLE, pos: COORD) -> BOOL;
    fn WriteConsoleW(
        handle: HANDLE,
        buffer: *const WCHAR,
        length: DWORD,
        written: *mut DWORD,
        reserved: *mut core::ffi::c_void,
    ) -> BOOL;
    fn FillConsoleOutputCharacterW(
        handle: HANDLE,
        ch: WCHAR,
        length: DWORD,
        start: COORD,
        written: *mut DWORD,
    ) -> BOOL;
    fn SetConsoleTextAttribute(handle: HANDLE, attributes: WORD) -> BOOL;
    fn MessageBeep(beep_type: DWORD) -> BOOL;
}

fn last_error() -> TermError {
    TermError::Io(io::Error::last_os_error().to_string())
}

pub struct WindowsTermInput {
    handle: HANDLE,
    queue: VecDeque<TermEvent>,
}

impl WindowsTermInput {
    pub fn new() -> TermResult<Self> {
        let handle = unsafe { GetStdHandle(STD_INPUT_HANDLE) };
        if handle == INVALID_HANDLE_VALUE {
            return Err(last_error());
        }
        let mut mode = 0;
        if unsafe { GetConsoleMode(handle, &mut mode) } == 0 {
            return Err(TermError::NotATty);
        }
        Ok(WindowsTermInput {
            handle,
            queue: VecDeque::new(),
        })
    }

    fn read_record(&mut self) -> TermResult<()> {
        let mut record: INPUT_RECORD = unsafe { std::mem::zeroed() };
        let mut read: DWORD = 0;
        if unsafe { ReadConsoleInputW(self.handle, &mut record, 1, &mut read) } == 0 {
            return Err(last_error());
        }
        if read == 0 {
            return Ok(());
        }
        match record.event_type {
            KEY_EVENT => {
                let key: KEY_EVENT_RECORD = unsafe {
                    std::ptr::read_unaligned(record.event.as_ptr() as *const KEY_EVENT_RECORD)
                };
                if key.key_down == 0 {
                    return Ok(());
                }
                for _ in 0..key.repeat_count.max(1) {
                    if let Some(event) = translate_key(&key) {
                        self.queue.push_back(event);
                    }
                }
            }
            WINDOW_BUFFER_SIZE_EVENT => {
                let (cols, rows) = self.window_size()?;
                self.queue.push_back(TermEvent::Resize(cols, rows));
            }
            _ => {}
        }
        Ok(())
    }
}

fn translate_key(key: &KEY_EVENT_RECORD) -> Option<TermEvent> {
    let ctrl = key.control_key_state & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0;
    let meta = key.control_key_state & (LEFT_ALT_PRESSED | RIGHT_ALT_PRESSED) != 0;
    let shift = key.control_key_state & SHIFT_PRESSED != 0;

    let fn_key = match key.virtual_key_code {
        0x25 => Some(FnKey::Left),
        0x26 => Some(FnKey::Up),
        0x27 => Some(FnKey::Right),
        0x28 => Some(FnKey::Down),
        0x21 => Some(FnKey::PageUp),
        0x22 => Some(FnKey::PageDown),
        0x23 => Some(FnKey::End),
        0x24 => Some(FnKey::Home),
        0x2d => Some(FnKey::Insert),
        0x2e => Some(FnKey::Delete),
        0x70..=0x7b => Some(FnKey::F((key.virtual_key_code - 0x6f) as u8)),
        _ => None,
    };
    if let Some(f) = fn_key {
        let mut event = KeyEvent::fun(f);
        event.ctrl = ctrl;
        event.meta = meta;
        event.shift = shift;
        return Some(TermEvent::Key(event));
    }

    let unit = key.unicode_char;
    if unit == 0 {
        return None;
    }
    let c = char::from_u32(unit as u32)?;
    let event = match c {
        '\x03' => return Some(TermEvent::Interrupt),
        '\x1a' => return Some(TermEvent::Suspend),
        '\r' | '\n' => KeyEvent::fun(FnKey::Enter),
        '\t' => KeyEvent {
            key: Key::Fn(FnKey::Tab),
            ctrl: false,
            meta,
            shift,
        },
        '\x08' | '\x7f' => KeyEvent::fun(FnKey::Backspace),
        '\x1b' => KeyEvent::fun(FnKey::Escape),
        c if (c as u32) < 0x20 => {
            let letter = ((c as u8) - 1 + b'a') as char;
            let mut event = KeyEvent::ctrl(letter);
            event.meta = meta;
            event
        }
        c => {
            let mut event = KeyEvent::ch(c);
            event.meta = meta;
            event
        }
    };
    Some(TermEvent::Key(event))
}

impl TermInput for WindowsTermInput {
    fn enable_raw_mode(&mut self) -> TermResult<RawModeGuard> {
        let handle = self.handle;
        let mut original: DWORD = 0;
        if unsafe { GetConsoleMode(handle, &mut original) } == 0 {
            return Err(TermError::Setup(io::Error::last_os_error().to_string()));
        }
        let raw = (original & !(ENABLE_PROCESSED_INPUT | ENABLE_LINE_INPUT | ENABLE_ECHO_INPUT))
            | ENABLE_WINDOW_INPUT;
        if unsafe { SetConsoleMode(handle, raw) } == 0 {
            return Err(TermError::Setup(io::Error::last_os_error().to_string()));
        }
        Ok(RawModeGuard::new(move || unsafe {
            SetConsoleMode(handle, original);
        }))
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> TermResult<Option<TermEvent>> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            let wait_ms = timeout
                .map(|d| d.as_millis().min(DWORD::MAX as u128 - 1) as DWORD)
                .unwrap_or(DWORD::MAX); // INFINITE
            match unsafe { WaitForSingleObject(self.handle, wait_ms) } {
                WAIT_OBJECT_0 => self.read_record()?,
                WAIT_TIMEOUT => return Ok(None),
                _ => return Err(last_error()),
            }
        }
    }

    fn window_size(&self) -> TermResult<(u16, u16)> {
        let out = unsafe { GetStdHandle(STD_OUTPUT_HANDLE) };
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        if unsafe { GetConsoleScreenBufferInfo(out, &mut info) } == 0 {
            return Err(last_error());
        }
        let cols = (info.window.right - info.window.left + 1) as u16;
        let rows = (info.window.bottom - info.window.top + 1) as u16;
        Ok((cols, rows))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BackendKind::WindowsConsole,
            is_interactive: true,
            supports_cursor_motion: true,
        }
    }
}

pub struct WindowsTermOutput {
    handle: HANDLE,
}

impl WindowsTermOutput {
    pub fn new() -> TermResult<Self> {
        let handle = unsafe { GetStdHandle(STD_OUTPUT_HANDLE) };
        if handle == INVALID_HANDLE_VALUE {
            return Err(last_error());
        }
        let mut mode = 0;
        if unsafe { GetConsoleMode(handle, &mut mode) } == 0 {
            return Err(TermError::NotATty);
        }
        Ok(WindowsTermOutput { handle })
    }

    fn info(&self) -> TermResult<CONSOLE_SCREEN_BUFFER_INFO> {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        if unsafe { GetConsoleScreenBufferInfo(self.handle, &mut info) } == 0 {
            return Err(last_error());
        }
        Ok(info)
    }

    fn write_units(&self, units: &[WCHAR]) -> TermResult<()> {
        let mut written: DWORD = 0;
        if unsafe {
            WriteConsoleW(
                self.handle,
                units.as_ptr(),
                units.len() as DWORD,
                &mut written,
                std::ptr::null_mut(),
            )
        } == 0
        {
            return Err(last_error());
        }
        Ok(())
    }

    fn fill_from(&self, start: COORD, length: DWORD) -> TermResult<()> {
        let mut written: DWORD = 0;
        if unsafe { FillConsoleOutputCharacterW(self.handle, b' ' as WCHAR, length, start, &mut written) }
            == 0
        {
            return Err(last_error());
        }
        Ok(())
    }
}

impl TermOutput for WindowsTermOutput {
    fn write_text(&mut self, text: &str) -> TermResult<()> {
        let units: Vec<WCHAR> = text.encode_utf16().collect();
        self.write_units(&units)
    }

    fn write_reversed(&mut self, text: &str) -> TermResult<()> {
        let info = self.info()?;
        // Swap the foreground and background nibbles.
        let attrs = info.attributes;
        let reversed = ((attrs & 0x0f) << 4) | ((attrs & 0xf0) >> 4) | (attrs & 0xff00);
        unsafe { SetConsoleTextAttribute(self.handle, reversed) };
        let result = self.write_text(text);
        unsafe { SetConsoleTextAttribute(self.handle, attrs) };
        result
    }

    fn move_cursor_rel(&mut self, rows: i16, cols: i16) -> TermResult<()> {
        let info = self.info()?;
        let pos = COORD {
            x: (info.cursor_position.x + cols).max(0),
            y: (info.cursor_position.y + rows).max(0),
        };
        if unsafe { SetConsoleCursorPosition(self.handle, pos) } == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn carriage_return(&mut self) -> TermResult<()> {
        let info = self.info()?;
        let pos = COORD {
            x: 0,
            y: info.cursor_position.y,
        };
        if unsafe { SetConsoleCursorPosition(self.handle, pos) } == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn clear_to_eol(&mut self) -> TermResult<()> {
        let info = self.info()?;
        let remaining = (info.size.x - info.cursor_position.x).max(0) as DWORD;
        self.fill_from(info.cursor_position, remaining)
    }

    fn clear_to_eos(&mut self) -> TermResult<()> {
        let info = self.info()?;
        let to_eol = (info.size.x - info.cursor_position.x).max(0) as DWORD;
        let rows_below = (info.size.y - info.cursor_position.y - 1).max(0) as DWORD;
        self.fill_from(
            info.cursor_position,
            to_eol + rows_below * info.size.x as DWORD,
        )
    }

    fn clear_screen(&mut self) -> TermResult<()> {
        let info = self.info()?;
        let origin = COORD { x: 0, y: 0 };
        let cells = info.size.x as DWORD * info.size.y as DWORD;
        self.fill_from(origin, cells)?;
        if unsafe { SetConsoleCursorPosition(self.handle, origin) } == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn bell(&mut self, style: BellStyle) -> TermResult<()> {
        if style != BellStyle::None {
            unsafe { MessageBeep(0xFFFF_FFFF) };
        }
        Ok(())
    }

    fn flush(&mut self) -> TermResult<()> {
        // WriteConsoleW is unbuffered.
        Ok(())
    }
}

/// The console back-end is used unconditionally on Windows.
pub fn stdio_backend() -> TermResult<(Box<dyn TermInput>, Box<dyn TermOutput>, Capabilities)> {
    let input = WindowsTermInput::new()?;
    let output = WindowsTermOutput::new()?;
    let caps = input.capabilities();
    Ok((Box::new(input), Box::new(output), caps))
}
