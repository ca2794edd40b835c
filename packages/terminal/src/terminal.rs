//! The terminal grid and its change notifications.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::colour::{index_char, Colour};
use crate::error::TerminalError;
use crate::palette::Palette;
use crate::text_buffer::TextBuffer;

/// What changed on a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Dimensions changed. Contents may have been reflowed.
    Resized { width: usize, height: usize },
    /// Cell contents changed.
    Contents,
    /// Cursor position, blink or current colours changed.
    Cursor,
    /// A palette slot changed.
    Palette,
}

/// Handle returned by [`Terminal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&TerminalEvent) + Send + Sync>;

/// A full copy of a terminal's state.
///
/// The three layers always hold exactly `height` rows of exactly `width` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSnapshot {
    pub width: usize,
    pub height: usize,
    pub cursor_x: i32,
    pub cursor_y: i32,
    pub cursor_blink: bool,
    pub text_colour: usize,
    pub background_colour: usize,
    pub text: Vec<TextBuffer>,
    pub text_colour_lines: Vec<TextBuffer>,
    pub background_colour_lines: Vec<TextBuffer>,
    pub palette: Palette,
}

impl TerminalSnapshot {
    fn new(width: usize, height: usize, colour: bool) -> Self {
        let mut snapshot = Self {
            width,
            height,
            cursor_x: 0,
            cursor_y: 0,
            cursor_blink: false,
            text_colour: Colour::White.index(),
            background_colour: Colour::Black.index(),
            text: Vec::with_capacity(height),
            text_colour_lines: Vec::with_capacity(height),
            background_colour_lines: Vec::with_capacity(height),
            palette: Palette::new(colour),
        };
        for _ in 0..height {
            snapshot.push_blank_row();
        }
        snapshot
    }

    fn blank_rows(&self) -> (TextBuffer, TextBuffer, TextBuffer) {
        (
            TextBuffer::new(' ', self.width),
            TextBuffer::new(index_char(self.text_colour), self.width),
            TextBuffer::new(index_char(self.background_colour), self.width),
        )
    }

    fn push_blank_row(&mut self) {
        let (text, fg, bg) = self.blank_rows();
        self.text.push(text);
        self.text_colour_lines.push(fg);
        self.background_colour_lines.push(bg);
    }

    fn cursor_row(&self) -> Option<usize> {
        usize::try_from(self.cursor_y)
            .ok()
            .filter(|y| *y < self.height)
    }

    fn clear_row(&mut self, y: usize) {
        self.text[y].fill(' ');
        self.text_colour_lines[y].fill(index_char(self.text_colour));
        self.background_colour_lines[y].fill(index_char(self.background_colour));
    }

    fn has_valid_shape(&self) -> bool {
        let rows_ok = |rows: &[TextBuffer]| {
            rows.len() == self.height && rows.iter().all(|r| r.len() == self.width)
        };
        rows_ok(&self.text) && rows_ok(&self.text_colour_lines) && rows_ok(&self.background_colour_lines)
    }
}

/// A width x height grid of glyphs and colours, with a cursor and palette.
///
/// Every mutator takes the terminal's single lock, so a renderer can read from
/// another thread while a script writes. Mutators that actually change state
/// notify subscribers after the lock is released and set the dirty flag read
/// by [`Terminal::take_changed`].
pub struct Terminal {
    colour: bool,
    state: Mutex<TerminalSnapshot>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    changed: AtomicBool,
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Terminal")
            .field("width", &state.width)
            .field("height", &state.height)
            .field("colour", &self.colour)
            .finish()
    }
}

impl Terminal {
    pub fn new(width: usize, height: usize, colour: bool) -> Self {
        Self {
            colour,
            state: Mutex::new(TerminalSnapshot::new(width, height, colour)),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            changed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TerminalSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: TerminalEvent) {
        self.changed.store(true, Ordering::Release);
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, listener) in listeners.iter() {
            listener(&event);
        }
    }

    /// Register a listener for change events.
    ///
    /// Listeners run on the mutating thread after the terminal lock has been
    /// released. They must not subscribe or unsubscribe from inside the callback.
    pub fn subscribe(&self, listener: impl Fn(&TerminalEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        listeners.len() != before
    }

    /// Whether anything changed since the last call, clearing the flag.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    pub fn is_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    pub fn width(&self) -> usize {
        self.lock().width
    }

    pub fn height(&self) -> usize {
        self.lock().height
    }

    pub fn is_colour(&self) -> bool {
        self.colour
    }

    /// Restore the cursor, colours and palette to defaults and blank the screen.
    pub fn reset(&self) {
        {
            let mut state = self.lock();
            state.text_colour = Colour::White.index();
            state.background_colour = Colour::Black.index();
            state.cursor_x = 0;
            state.cursor_y = 0;
            state.cursor_blink = false;
            for y in 0..state.height {
                state.clear_row(y);
            }
            state.palette.reset_colours();
        }
        self.notify(TerminalEvent::Contents);
        self.notify(TerminalEvent::Palette);
    }

    /// Change the dimensions, keeping whatever content still fits.
    ///
    /// New cells are blank in the current colours. Resizing to the current
    /// dimensions does nothing.
    pub fn resize(&self, width: usize, height: usize) {
        {
            let mut state = self.lock();
            if state.width == width && state.height == height {
                return;
            }

            let old_text = std::mem::take(&mut state.text);
            let old_fg = std::mem::take(&mut state.text_colour_lines);
            let old_bg = std::mem::take(&mut state.background_colour_lines);
            let old_width = state.width;
            state.width = width;
            state.height = height;

            for (y, ((text, fg), bg)) in old_text
                .into_iter()
                .zip(old_fg)
                .zip(old_bg)
                .take(height)
                .enumerate()
            {
                if width == old_width {
                    state.text.push(text);
                    state.text_colour_lines.push(fg);
                    state.background_colour_lines.push(bg);
                } else {
                    state.push_blank_row();
                    state.text[y].write_buffer(&text);
                    state.text_colour_lines[y].write_buffer(&fg);
                    state.background_colour_lines[y].write_buffer(&bg);
                }
            }
            while state.text.len() < height {
                state.push_blank_row();
            }
            tracing::trace!(width, height, "terminal resized");
        }
        self.notify(TerminalEvent::Resized { width, height });
    }

    pub fn cursor_pos(&self) -> (i32, i32) {
        let state = self.lock();
        (state.cursor_x, state.cursor_y)
    }

    pub fn set_cursor_pos(&self, x: i32, y: i32) {
        let changed = {
            let mut state = self.lock();
            let changed = state.cursor_x != x || state.cursor_y != y;
            state.cursor_x = x;
            state.cursor_y = y;
            changed
        };
        if changed {
            self.notify(TerminalEvent::Cursor);
        }
    }

    pub fn cursor_blink(&self) -> bool {
        self.lock().cursor_blink
    }

    pub fn set_cursor_blink(&self, blink: bool) {
        let changed = std::mem::replace(&mut self.lock().cursor_blink, blink) != blink;
        if changed {
            self.notify(TerminalEvent::Cursor);
        }
    }

    /// Current foreground palette index.
    pub fn text_colour(&self) -> usize {
        self.lock().text_colour
    }

    /// Set the foreground palette index. Only the low four bits are kept.
    pub fn set_text_colour(&self, colour: usize) {
        let colour = colour & 0xF;
        let changed = std::mem::replace(&mut self.lock().text_colour, colour) != colour;
        if changed {
            self.notify(TerminalEvent::Cursor);
        }
    }

    /// Current background palette index.
    pub fn background_colour(&self) -> usize {
        self.lock().background_colour
    }

    /// Set the background palette index. Only the low four bits are kept.
    pub fn set_background_colour(&self, colour: usize) {
        let colour = colour & 0xF;
        let changed = std::mem::replace(&mut self.lock().background_colour, colour) != colour;
        if changed {
            self.notify(TerminalEvent::Cursor);
        }
    }

    /// Write `text` at the cursor in the current colours.
    ///
    /// The cursor does not move. Cells outside the row are dropped, and a
    /// cursor outside the grid makes this a no-op.
    pub fn write(&self, text: &str) {
        let written = {
            let mut state = self.lock();
            match state.cursor_row() {
                Some(y) => {
                    let x = state.cursor_x;
                    let end = x as i64 + text.chars().count() as i64;
                    let (fg, bg) = (index_char(state.text_colour), index_char(state.background_colour));
                    state.text[y].write(text, x);
                    state.text_colour_lines[y].fill_range(fg, x, end);
                    state.background_colour_lines[y].fill_range(bg, x, end);
                    true
                }
                None => false,
            }
        };
        if written {
            self.notify(TerminalEvent::Contents);
        }
    }

    /// Write glyphs and both colour layers at the cursor in one call.
    pub fn blit(&self, text: &str, text_colour: &str, background_colour: &str) -> Result<(), TerminalError> {
        let (len, fg_len, bg_len) = (
            text.chars().count(),
            text_colour.chars().count(),
            background_colour.chars().count(),
        );
        if len != fg_len || len != bg_len {
            return Err(TerminalError::BlitLengthMismatch {
                text: len,
                foreground: fg_len,
                background: bg_len,
            });
        }

        let written = {
            let mut state = self.lock();
            match state.cursor_row() {
                Some(y) => {
                    let x = state.cursor_x;
                    state.text[y].write(text, x);
                    state.text_colour_lines[y].write(text_colour, x);
                    state.background_colour_lines[y].write(background_colour, x);
                    true
                }
                None => false,
            }
        };
        if written {
            self.notify(TerminalEvent::Contents);
        }
        Ok(())
    }

    /// Shift rows by `y_diff`. Positive values move content up.
    ///
    /// Revealed rows are blank in the current colours.
    pub fn scroll(&self, y_diff: i32) {
        if y_diff == 0 {
            return;
        }
        {
            let mut state = self.lock();
            let height = state.height as i64;
            let mut old_text: Vec<Option<TextBuffer>> =
                std::mem::take(&mut state.text).into_iter().map(Some).collect();
            let mut old_fg: Vec<Option<TextBuffer>> =
                std::mem::take(&mut state.text_colour_lines).into_iter().map(Some).collect();
            let mut old_bg: Vec<Option<TextBuffer>> =
                std::mem::take(&mut state.background_colour_lines).into_iter().map(Some).collect();

            for y in 0..height {
                let old_y = y + y_diff as i64;
                let moved = if (0..height).contains(&old_y) {
                    let i = old_y as usize;
                    match (old_text[i].take(), old_fg[i].take(), old_bg[i].take()) {
                        (Some(t), Some(f), Some(b)) => Some((t, f, b)),
                        _ => None,
                    }
                } else {
                    None
                };
                let (text, fg, bg) = moved.unwrap_or_else(|| state.blank_rows());
                state.text.push(text);
                state.text_colour_lines.push(fg);
                state.background_colour_lines.push(bg);
            }
        }
        self.notify(TerminalEvent::Contents);
    }

    /// Blank every cell using the current colours.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            for y in 0..state.height {
                state.clear_row(y);
            }
        }
        self.notify(TerminalEvent::Contents);
    }

    /// Blank the cursor's row. No-op when the cursor is off-screen.
    pub fn clear_line(&self) {
        let cleared = {
            let mut state = self.lock();
            match state.cursor_row() {
                Some(y) => {
                    state.clear_row(y);
                    true
                }
                None => false,
            }
        };
        if cleared {
            self.notify(TerminalEvent::Contents);
        }
    }

    pub fn get_line(&self, y: usize) -> Option<TextBuffer> {
        self.lock().text.get(y).cloned()
    }

    pub fn get_text_colour_line(&self, y: usize) -> Option<TextBuffer> {
        self.lock().text_colour_lines.get(y).cloned()
    }

    pub fn get_background_colour_line(&self, y: usize) -> Option<TextBuffer> {
        self.lock().background_colour_lines.get(y).cloned()
    }

    /// Overwrite row `y` from column 0 in all three layers.
    pub fn set_line(&self, y: usize, text: &str, text_colour: &str, background_colour: &str) -> Result<(), TerminalError> {
        {
            let mut state = self.lock();
            if y >= state.height {
                return Err(TerminalError::LineOutOfRange {
                    line: y,
                    height: state.height,
                });
            }
            state.text[y].write(text, 0);
            state.text_colour_lines[y].write(text_colour, 0);
            state.background_colour_lines[y].write(background_colour, 0);
        }
        self.notify(TerminalEvent::Contents);
        Ok(())
    }

    pub fn palette(&self) -> Palette {
        self.lock().palette.clone()
    }

    pub fn set_palette_colour(&self, index: usize, r: f64, g: f64, b: f64) -> Result<(), TerminalError> {
        let changed = {
            let mut state = self.lock();
            let before = state.palette.raw_colour(index);
            state.palette.set_colour(index, r, g, b)?;
            before != Some([r, g, b])
        };
        if changed {
            self.notify(TerminalEvent::Palette);
        }
        Ok(())
    }

    /// Copy the whole state out under one lock acquisition.
    pub fn snapshot(&self) -> TerminalSnapshot {
        self.lock().clone()
    }

    /// Replace the whole state.
    ///
    /// Snapshots whose layers do not match their declared dimensions are
    /// ignored and false is returned.
    pub fn restore(&self, mut snapshot: TerminalSnapshot) -> bool {
        if !snapshot.has_valid_shape() {
            return false;
        }
        snapshot.text_colour &= 0xF;
        snapshot.background_colour &= 0xF;
        let resized = {
            let mut state = self.lock();
            let resized = state.width != snapshot.width || state.height != snapshot.height;
            let palette_colour = state.palette.is_colour();
            if snapshot.palette.is_colour() != palette_colour {
                let mut palette = Palette::new(palette_colour);
                for i in 0..crate::palette::PALETTE_SIZE {
                    if let Some([r, g, b]) = snapshot.palette.raw_colour(i) {
                        let _ = palette.set_colour(i, r, g, b);
                    }
                }
                snapshot.palette = palette;
            }
            *state = snapshot;
            resized.then_some((state.width, state.height))
        };
        if let Some((width, height)) = resized {
            self.notify(TerminalEvent::Resized { width, height });
        }
        self.notify(TerminalEvent::Contents);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn line(term: &Terminal, y: usize) -> String {
        term.get_line(y).unwrap().to_string()
    }

    fn counting(term: &Terminal) -> Arc<AtomicU64> {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        term.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn new_terminal_is_blank() {
        let term = Terminal::new(3, 2, true);
        assert_eq!(line(&term, 0), "   ");
        assert_eq!(term.get_text_colour_line(1).unwrap().to_string(), "000");
        assert_eq!(term.get_background_colour_line(1).unwrap().to_string(), "fff");
        assert!(!term.is_changed());
    }

    #[test]
    fn write_at_cursor() {
        let term = Terminal::new(10, 3, true);
        term.set_cursor_pos(4, 1);
        term.write("X");
        assert_eq!(term.get_line(1).unwrap().char_at(4), Some('X'));
        assert_eq!(term.cursor_pos(), (4, 1));
    }

    #[test]
    fn write_uses_current_colours() {
        let term = Terminal::new(6, 1, true);
        term.set_text_colour(Colour::Red.index());
        term.set_background_colour(Colour::Blue.index());
        term.set_cursor_pos(1, 0);
        term.write("hi");
        assert_eq!(term.get_text_colour_line(0).unwrap().to_string(), "0ee000");
        assert_eq!(term.get_background_colour_line(0).unwrap().to_string(), "fbbfff");
    }

    #[test]
    fn write_off_screen_is_noop() {
        let term = Terminal::new(4, 2, true);
        let count = counting(&term);
        term.set_cursor_pos(0, 5);
        count.store(0, Ordering::SeqCst);
        term.write("abc");
        term.set_cursor_pos(0, -1);
        count.store(0, Ordering::SeqCst);
        term.write("abc");
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(line(&term, 0), "    ");
    }

    #[test]
    fn write_clips_negative_x() {
        let term = Terminal::new(4, 1, true);
        term.set_cursor_pos(-2, 0);
        term.write("abcd");
        assert_eq!(line(&term, 0), "cd  ");
    }

    #[test]
    fn blit_requires_equal_lengths() {
        let term = Terminal::new(4, 1, true);
        assert!(matches!(
            term.blit("ab", "0", "ff"),
            Err(TerminalError::BlitLengthMismatch { text: 2, foreground: 1, background: 2 })
        ));
        term.blit("ab", "12", "34").unwrap();
        assert_eq!(line(&term, 0), "ab  ");
        assert_eq!(term.get_text_colour_line(0).unwrap().to_string(), "1200");
        assert_eq!(term.get_background_colour_line(0).unwrap().to_string(), "34ff");
    }

    #[test]
    fn scroll_moves_content_up() {
        let term = Terminal::new(2, 3, true);
        for (y, s) in ["aa", "bb", "cc"].iter().enumerate() {
            term.set_line(y, s, "00", "ff").unwrap();
        }
        term.set_background_colour(Colour::Green.index());
        term.scroll(1);
        assert_eq!(line(&term, 0), "bb");
        assert_eq!(line(&term, 1), "cc");
        assert_eq!(line(&term, 2), "  ");
        assert_eq!(term.get_background_colour_line(2).unwrap().to_string(), "dd");
    }

    #[test]
    fn scroll_negative_moves_content_down() {
        let term = Terminal::new(1, 3, true);
        for (y, s) in ["a", "b", "c"].iter().enumerate() {
            term.set_line(y, s, "0", "f").unwrap();
        }
        term.scroll(-2);
        assert_eq!(line(&term, 0), " ");
        assert_eq!(line(&term, 1), " ");
        assert_eq!(line(&term, 2), "a");
    }

    #[test]
    fn scroll_zero_is_silent() {
        let term = Terminal::new(1, 1, true);
        let count = counting(&term);
        term.scroll(0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scroll_past_height_blanks() {
        let term = Terminal::new(1, 2, true);
        term.set_line(0, "a", "0", "f").unwrap();
        term.scroll(10);
        assert_eq!(line(&term, 0), " ");
        assert_eq!(line(&term, 1), " ");
    }

    #[test]
    fn resize_same_size_is_silent() {
        let term = Terminal::new(5, 5, true);
        let count = counting(&term);
        term.resize(5, 5);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!term.is_changed());
    }

    #[test]
    fn resize_grow_then_shrink_preserves_overlap() {
        let term = Terminal::new(3, 2, true);
        term.set_line(0, "abc", "123", "456").unwrap();
        term.set_line(1, "def", "789", "abc").unwrap();
        term.resize(6, 4);
        assert_eq!(line(&term, 0), "abc   ");
        assert_eq!(line(&term, 3), "      ");
        term.resize(3, 2);
        assert_eq!(line(&term, 0), "abc");
        assert_eq!(line(&term, 1), "def");
        assert_eq!(term.get_text_colour_line(1).unwrap().to_string(), "789");
        assert_eq!(term.get_background_colour_line(0).unwrap().to_string(), "456");
    }

    #[test]
    fn resize_crops() {
        let term = Terminal::new(4, 3, true);
        term.set_line(2, "wxyz", "0000", "ffff").unwrap();
        term.set_line(0, "abcd", "0000", "ffff").unwrap();
        term.resize(2, 2);
        let snap = term.snapshot();
        assert_eq!(snap.text.len(), 2);
        assert!(snap.text.iter().all(|r| r.len() == 2));
        assert_eq!(line(&term, 0), "ab");
    }

    #[test]
    fn unchanged_setters_do_not_notify() {
        let term = Terminal::new(2, 2, true);
        let count = counting(&term);
        term.set_cursor_pos(0, 0);
        term.set_cursor_blink(false);
        term.set_text_colour(0);
        term.set_background_colour(15);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        term.set_cursor_blink(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(term.take_changed());
        assert!(!term.take_changed());
    }

    #[test]
    fn unsubscribe_stops_events() {
        let term = Terminal::new(2, 2, true);
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let id = term.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        term.clear();
        assert!(term.unsubscribe(id));
        assert!(!term.unsubscribe(id));
        term.clear();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_restores_defaults() {
        let term = Terminal::new(3, 1, true);
        term.set_text_colour(3);
        term.set_background_colour(4);
        term.set_cursor_pos(2, 0);
        term.set_cursor_blink(true);
        term.write("x");
        term.set_palette_colour(0, 0.0, 0.0, 0.0).unwrap();
        term.reset();

        assert_eq!(term.cursor_pos(), (0, 0));
        assert!(!term.cursor_blink());
        assert_eq!(term.text_colour(), 0);
        assert_eq!(term.background_colour(), 15);
        assert_eq!(line(&term, 0), "   ");
        assert_eq!(term.get_background_colour_line(0).unwrap().to_string(), "fff");
        assert_eq!(crate::encode_rgb8(term.palette().get_colour(0).unwrap()), 0xF0F0F0);
    }

    #[test]
    fn clear_line_only_touches_cursor_row() {
        let term = Terminal::new(2, 2, true);
        term.set_line(0, "ab", "00", "ff").unwrap();
        term.set_line(1, "cd", "00", "ff").unwrap();
        term.set_cursor_pos(0, 1);
        term.clear_line();
        assert_eq!(line(&term, 0), "ab");
        assert_eq!(line(&term, 1), "  ");
    }

    #[test]
    fn set_line_out_of_range() {
        let term = Terminal::new(2, 2, true);
        assert_eq!(
            term.set_line(2, "", "", ""),
            Err(TerminalError::LineOutOfRange { line: 2, height: 2 })
        );
    }

    #[test]
    fn restore_rejects_bad_shape() {
        let term = Terminal::new(2, 2, true);
        let mut snap = term.snapshot();
        snap.text.pop();
        assert!(!term.restore(snap));

        let other = Terminal::new(4, 1, true);
        other.write("abcd");
        assert!(term.restore(other.snapshot()));
        assert_eq!(term.width(), 4);
        assert_eq!(line(&term, 0), "abcd");
    }

    #[test]
    fn events_are_typed() {
        let term = Terminal::new(2, 2, true);
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        term.subscribe(move |event| e.lock().unwrap().push(*event));
        term.resize(3, 3);
        term.set_cursor_pos(1, 1);
        term.write("a");
        term.set_palette_colour(1, 0.5, 0.5, 0.5).unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                TerminalEvent::Resized { width: 3, height: 3 },
                TerminalEvent::Cursor,
                TerminalEvent::Contents,
                TerminalEvent::Palette,
            ]
        );
    }
}
