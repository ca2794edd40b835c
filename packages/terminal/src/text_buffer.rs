//! A single fixed-width row of characters.

use std::fmt;

/// One row of one terminal layer.
///
/// The width never changes after construction. Writes are clipped to the row:
/// characters landing before column 0 or past the end are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextBuffer {
    chars: Vec<char>,
}

impl TextBuffer {
    /// A row of `width` copies of `c`.
    pub fn new(c: char, width: usize) -> Self {
        Self {
            chars: vec![c; width],
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Character at `index`, if it is inside the row.
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Overwrite cells starting at `start`, which may be negative.
    pub fn write(&mut self, text: &str, start: i32) {
        self.write_chars(text.chars(), start);
    }

    /// Overwrite cells starting at `start` from a character iterator.
    pub fn write_chars(&mut self, text: impl IntoIterator<Item = char>, start: i32) {
        let width = self.chars.len() as i64;
        let mut pos = start as i64;
        for c in text {
            if pos >= width {
                break;
            }
            if pos >= 0 {
                self.chars[pos as usize] = c;
            }
            pos += 1;
        }
    }

    /// Copy another row in from column 0, clipped to whichever is shorter.
    pub fn write_buffer(&mut self, other: &TextBuffer) {
        let n = self.chars.len().min(other.chars.len());
        self.chars[..n].copy_from_slice(&other.chars[..n]);
    }

    pub fn fill(&mut self, c: char) {
        self.chars.fill(c);
    }

    /// Fill the half-open column range `start..end`, clipped to the row.
    pub fn fill_range(&mut self, c: char, start: i32, end: i64) {
        let width = self.chars.len() as i64;
        let start = (start as i64).clamp(0, width) as usize;
        let end = end.clamp(0, width) as usize;
        if start < end {
            self.chars[start..end].fill(c);
        }
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.chars {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
