//! Projects the logical line onto the physical terminal.
//!
//! The renderer owns the output half of the back-end and remembers the
//! footprint of its previous paint (how many rows, where the cursor was
//! left). Each `draw` repositions to the footprint's origin with relative
//! motions, rewrites, and clears what the new content no longer covers, so
//! a redraw costs one pass over the visible text and nothing flickers.
//!
//! Wrapping is column-exact: wide characters never straddle a row edge (a
//! dangling wide character wraps early) and a row that exactly fills the
//! terminal is terminated by writing one space into the margin and
//! returning the carriage, which forces the wrap on auto-margin terminals
//! instead of guessing whether it happened.
//!
//! Dumb terminals get a different projection entirely: one physical line,
//! horizontally scrolled so the cursor stays visible, with `<`/`>` marking
//! clipped text.

use linekit_core::prefs::BellStyle;
use linekit_core::unicode::{char_width, str_width};
use linekit_term::{TermOutput, TermResult};

#[derive(Debug, Clone, Copy)]
struct Cell {
    ch: char,
    width: usize,
    highlighted: bool,
}

pub struct Renderer {
    out: Box<dyn TermOutput>,
    width: usize,
    supports_motion: bool,
    bell_style: BellStyle,
    /// Rows the previous paint occupied (cursor-addressable terminals).
    last_rows: usize,
    /// Row within the previous paint where the physical cursor was parked.
    last_cursor_row: usize,
    /// Columns painted by the previous dumb-mode paint.
    last_cols: usize,
    /// First visible line character in dumb mode.
    scroll: usize,
}

impl Renderer {
    pub fn new(out: Box<dyn TermOutput>, supports_motion: bool) -> Self {
        Renderer {
            out,
            width: 80,
            supports_motion,
            bell_style: BellStyle::default(),
            last_rows: 0,
            last_cursor_row: 0,
            last_cols: 0,
            scroll: 0,
        }
    }

    pub fn set_bell_style(&mut self, style: BellStyle) {
        self.bell_style = style;
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = (width as usize).max(4);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Window size changed: forget the old footprint (the terminal already
    /// rewrapped it), clear what we can, and let the next draw start
    /// fresh.
    pub fn resize(&mut self, width: u16) -> TermResult<()> {
        self.set_width(width);
        if self.supports_motion {
            self.out.carriage_return()?;
            if self.last_cursor_row > 0 {
                self.out.move_cursor_rel(-(self.last_cursor_row as i16), 0)?;
            }
            self.out.clear_to_eos()?;
        }
        self.reset_tracking();
        Ok(())
    }

    fn reset_tracking(&mut self) {
        self.last_rows = 0;
        self.last_cursor_row = 0;
        self.last_cols = 0;
    }

    /// Forget the previous footprint without touching the screen (used
    /// after output the renderer did not produce, e.g. suspension).
    pub fn invalidate(&mut self) {
        self.reset_tracking();
    }

    pub fn bell(&mut self) -> TermResult<()> {
        self.out.bell(self.bell_style)?;
        self.out.flush()
    }

    /// Clear the whole screen (Ctrl-L); the next draw paints at the top.
    pub fn clear_screen(&mut self) -> TermResult<()> {
        if self.supports_motion {
            self.out.clear_screen()?;
        } else {
            self.out.write_text("\r\n")?;
        }
        self.reset_tracking();
        Ok(())
    }

    /// Paint `prompt` and `line` with the cursor before `cursor` (a char
    /// index into `line`). `highlight` is a char range of `line` drawn in
    /// reverse video (the incremental-search match).
    pub fn draw(
        &mut self,
        prompt: &str,
        line: &str,
        cursor: usize,
        highlight: Option<(usize, usize)>,
    ) -> TermResult<()> {
        if !self.supports_motion {
            return self.draw_dumb(prompt, line, cursor);
        }
        let cells = build_cells(prompt, line, highlight);
        let cursor_index = prompt.chars().count() + cursor;
        let (rows, cur_row, cur_col) = wrap(&cells, self.width, cursor_index);

        // Reposition to the origin of the previous paint.
        self.out.carriage_return()?;
        if self.last_cursor_row > 0 {
            self.out.move_cursor_rel(-(self.last_cursor_row as i16), 0)?;
        }

        let mut end_row = rows.len() - 1;
        for (i, row) in rows.iter().enumerate() {
            self.write_row(row)?;
            let row_width: usize = row.iter().map(|c| c.width).sum();
            let last = i + 1 == rows.len();
            if row_width >= self.width {
                // Row reaches the margin: force the wrap.
                self.out.write_text(" ")?;
                self.out.carriage_return()?;
                if last {
                    self.out.clear_to_eol()?;
                    end_row = rows.len();
                }
            } else {
                self.out.clear_to_eol()?;
                if !last {
                    self.out.write_text("\r\n")?;
                }
            }
        }
        self.out.clear_to_eos()?;

        // Park the cursor.
        let up = end_row - cur_row;
        if up > 0 {
            self.out.move_cursor_rel(-(up as i16), 0)?;
        }
        self.out.carriage_return()?;
        if cur_col > 0 {
            self.out.move_cursor_rel(0, cur_col as i16)?;
        }

        self.last_rows = rows.len();
        self.last_cursor_row = cur_row;
        self.out.flush()
    }

    fn write_row(&mut self, row: &[Cell]) -> TermResult<()> {
        let mut run = String::new();
        let mut run_highlighted = false;
        for cell in row {
            if cell.highlighted != run_highlighted && !run.is_empty() {
                self.write_run(&run, run_highlighted)?;
                run.clear();
            }
            run_highlighted = cell.highlighted;
            run.push(cell.ch);
        }
        if !run.is_empty() {
            self.write_run(&run, run_highlighted)?;
        }
        Ok(())
    }

    fn write_run(&mut self, text: &str, highlighted: bool) -> TermResult<()> {
        if highlighted {
            self.out.write_reversed(text)
        } else {
            self.out.write_text(text)
        }
    }

    /// Single-line projection for terminals without cursor motion.
    fn draw_dumb(&mut self, prompt: &str, line: &str, cursor: usize) -> TermResult<()> {
        let chars: Vec<char> = line.chars().collect();
        let prompt_width = str_width(prompt);
        let avail = self.width.saturating_sub(prompt_width + 2).max(1);

        // Keep the cursor inside the scroll window.
        if cursor < self.scroll {
            self.scroll = cursor;
        }
        let mut end;
        loop {
            let mut used = 0;
            end = self.scroll;
            while end < chars.len() {
                let w = char_width(chars[end]);
                if used + w > avail {
                    break;
                }
                used += w;
                end += 1;
            }
            if cursor <= end {
                break;
            }
            self.scroll += 1;
        }

        let left_marker = if self.scroll > 0 { "<" } else { "" };
        let right_marker = if end < chars.len() { ">" } else { "" };
        let visible: String = chars[self.scroll..end].iter().collect();
        let visible_to_cursor: String = chars[self.scroll..cursor].iter().collect();

        let painted = prompt_width
            + str_width(left_marker)
            + str_width(&visible)
            + str_width(right_marker);

        self.out.carriage_return()?;
        self.out.write_text(prompt)?;
        self.out.write_text(left_marker)?;
        self.out.write_text(&visible)?;
        self.out.write_text(right_marker)?;
        // Erase whatever the previous, possibly longer, paint left behind.
        for _ in painted..self.last_cols {
            self.out.write_text(" ")?;
        }
        // Park the cursor by rewriting up to it.
        self.out.carriage_return()?;
        self.out.write_text(prompt)?;
        self.out.write_text(left_marker)?;
        self.out.write_text(&visible_to_cursor)?;

        self.last_cols = painted;
        self.out.flush()
    }

    /// Print text on its own line below the current paint (candidate
    /// listings, `Display all …?` prompts). The next draw repaints the
    /// prompt underneath.
    pub fn print_below(&mut self, text: &str) -> TermResult<()> {
        if self.supports_motion {
            let down = self
                .last_rows
                .saturating_sub(1)
                .saturating_sub(self.last_cursor_row);
            if down > 0 {
                self.out.move_cursor_rel(down as i16, 0)?;
            }
        }
        self.out.write_text("\r\n")?;
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.write_text("\r\n")?;
            }
            self.out.write_text(line)?;
        }
        self.out.write_text("\r\n")?;
        self.reset_tracking();
        self.out.flush()
    }

    /// The line was accepted or abandoned: move past it and start a fresh
    /// row.
    pub fn finish_line(&mut self) -> TermResult<()> {
        if self.supports_motion {
            let down = self
                .last_rows
                .saturating_sub(1)
                .saturating_sub(self.last_cursor_row);
            if down > 0 {
                self.out.move_cursor_rel(down as i16, 0)?;
            }
        }
        self.out.write_text("\r\n")?;
        self.reset_tracking();
        self.out.flush()
    }

    /// Write a standalone line (the `output_line` API).
    pub fn print_line(&mut self, text: &str) -> TermResult<()> {
        self.out.carriage_return()?;
        if self.supports_motion {
            self.out.clear_to_eol()?;
        }
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.write_text("\r\n")?;
            }
            self.out.write_text(line)?;
        }
        self.out.write_text("\r\n")?;
        self.reset_tracking();
        self.out.flush()
    }
}

fn build_cells(prompt: &str, line: &str, highlight: Option<(usize, usize)>) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(prompt.len() + line.len());
    for ch in prompt.chars() {
        cells.push(Cell {
            ch,
            width: char_width(ch),
            highlighted: false,
        });
    }
    for (i, ch) in line.chars().enumerate() {
        let highlighted = match highlight {
            Some((start, end)) => i >= start && i < end,
            None => false,
        };
        cells.push(Cell {
            ch,
            width: char_width(ch),
            highlighted,
        });
    }
    cells
}

/// Fold cells into rows no wider than `width`; returns the rows plus the
/// (row, column) where the cursor lands.
fn wrap(cells: &[Cell], width: usize, cursor_index: usize) -> (Vec<Vec<Cell>>, usize, usize) {
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new()];
    let mut col = 0;
    let mut cursor = (0, 0);
    for (i, cell) in cells.iter().enumerate() {
        if col + cell.width > width {
            rows.push(Vec::new());
            col = 0;
        }
        if i == cursor_index {
            cursor = (rows.len() - 1, col);
        }
        rows.last_mut().expect("rows nonempty").push(*cell);
        col += cell.width;
    }
    if cursor_index >= cells.len() {
        if col >= width {
            rows.push(Vec::new());
            col = 0;
        }
        cursor = (rows.len() - 1, col);
    }
    (rows, cursor.0, cursor.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linekit_term::mock::{CapturedOutput, OutputOp};

    fn cells_of(s: &str) -> Vec<Cell> {
        build_cells("", s, None)
    }

    #[test]
    fn wrap_fits_short_line_on_one_row() {
        let (rows, r, c) = wrap(&cells_of("hello"), 10, 5);
        assert_eq!(rows.len(), 1);
        assert_eq!((r, c), (0, 5));
    }

    #[test]
    fn wrap_splits_at_width() {
        let (rows, r, c) = wrap(&cells_of("abcdefghij"), 4, 10);
        assert_eq!(rows.len(), 3); // 4 + 4 + 2
        assert_eq!((r, c), (2, 2));
    }

    #[test]
    fn wrap_cursor_at_exact_margin_goes_to_next_row() {
        let (rows, r, c) = wrap(&cells_of("abcd"), 4, 4);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), 0);
        assert_eq!((r, c), (1, 0));
    }

    #[test]
    fn wide_char_never_straddles_rows() {
        // Width 5: "ab" (2 cols) + "語" (2) = 4, next "語" would span
        // columns 5-6, so it wraps early.
        let (rows, _, _) = wrap(&cells_of("ab語語"), 5, 0);
        assert_eq!(rows.len(), 2);
        let first: String = rows[0].iter().map(|c| c.ch).collect();
        assert_eq!(first, "ab語");
        let row_width: usize = rows[0].iter().map(|c| c.width).sum();
        assert_eq!(row_width, 4);
    }

    #[test]
    fn width_claim_matches_char_widths() {
        for text in ["hello", "日本語", "a日b", ""] {
            let cells = cells_of(text);
            let total: usize = cells.iter().map(|c| c.width).sum();
            assert_eq!(total, str_width(text));
        }
    }

    #[test]
    fn draw_writes_prompt_and_line() {
        let observer = CapturedOutput::new();
        let mut r = Renderer::new(Box::new(observer.clone()), true);
        r.set_width(80);
        r.draw("> ", "hello", 5, None).unwrap();
        assert!(observer.written_text().contains("> "));
        assert!(observer.written_text().contains("hello"));
        assert!(observer.ops().contains(&OutputOp::Flush));
    }

    #[test]
    fn draw_highlights_requested_range() {
        let observer = CapturedOutput::new();
        let mut r = Renderer::new(Box::new(observer.clone()), true);
        r.set_width(80);
        r.draw("", "hay needle hay", 4, Some((4, 10))).unwrap();
        assert!(observer
            .ops()
            .contains(&OutputOp::Reversed("needle".to_string())));
    }

    #[test]
    fn dumb_draw_scrolls_to_keep_cursor_visible() {
        let observer = CapturedOutput::new();
        let mut r = Renderer::new(Box::new(observer.clone()), false);
        r.set_width(12);
        let line = "abcdefghijklmnopqrstuvwxyz";
        r.draw("> ", line, 26, None).unwrap();
        let text = observer.written_text();
        // Scrolled: the left marker shows and the tail is visible.
        assert!(text.contains('<'));
        assert!(text.contains('z'));
        assert!(!text.contains("abc"));
    }

    #[test]
    fn dumb_draw_marks_clipped_tail() {
        let observer = CapturedOutput::new();
        let mut r = Renderer::new(Box::new(observer.clone()), false);
        r.set_width(12);
        let line = "abcdefghijklmnopqrstuvwxyz";
        r.draw("> ", line, 0, None).unwrap();
        let text = observer.written_text();
        assert!(text.contains('>'));
        assert!(!text.contains('<'));
    }

    #[test]
    fn print_below_then_draw_starts_fresh() {
        let observer = CapturedOutput::new();
        let mut r = Renderer::new(Box::new(observer.clone()), true);
        r.set_width(80);
        r.draw("> ", "ab", 2, None).unwrap();
        r.print_below("one two").unwrap();
        observer.clear();
        r.draw("> ", "ab", 2, None).unwrap();
        // Fresh paint: no upward motion to a previous footprint.
        assert!(!observer
            .ops()
            .iter()
            .any(|op| matches!(op, OutputOp::MoveRel(r, _) if *r < 0)));
    }
}
