//! Error types for terminal operations.

use thiserror::Error;

/// Errors raised by terminal mutators that validate their input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminalError {
    /// The three `blit` layers had different lengths.
    #[error("arguments must be the same length (text {text}, foreground {foreground}, background {background})")]
    BlitLengthMismatch {
        text: usize,
        foreground: usize,
        background: usize,
    },

    /// A row index outside the terminal.
    #[error("line {line} is out of range (height {height})")]
    LineOutOfRange { line: usize, height: usize },

    /// A palette slot outside `0..16`.
    #[error("palette index {0} is out of range")]
    PaletteIndex(usize),
}
