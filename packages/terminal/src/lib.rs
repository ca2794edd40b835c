//! Terminal buffers for virtual computers.
//!
//! A terminal is a fixed-size grid of character cells. Every cell carries a glyph
//! and two colour indices (foreground and background) into a 16-entry palette:
//! - `TextBuffer`: one row of cells for a single layer (glyphs, or colour digits)
//! - `Palette`: the 16 index -> RGB mappings
//! - `Terminal`: the grid, cursor and palette behind a single lock
//!
//! Colours are stored in the colour layers as lower-case hex digits (`0`-`f`),
//! the same form scripts use with `blit`.
//!
//! # Example
//!
//! ```rust
//! use cubicle_terminal::Terminal;
//!
//! let term = Terminal::new(51, 19, true);
//! term.set_cursor_pos(2, 0);
//! term.write("hello");
//! assert_eq!(term.get_line(0).unwrap().to_string().trim_end(), "  hello");
//! ```

mod colour;
mod error;
mod palette;
mod terminal;
mod text_buffer;

pub use colour::{Colour, BASE_16};
pub use error::TerminalError;
pub use palette::{channel_byte, decode_rgb8, encode_rgb8, Palette, PALETTE_SIZE};
pub use terminal::{ListenerId, Terminal, TerminalEvent, TerminalSnapshot};
pub use text_buffer::TextBuffer;
