//! Terminal synchronisation.
//!
//! A terminal is sent as its cursor, one byte per glyph, one packed colour
//! byte per cell and the palette. Glyphs outside Latin-1 are truncated to
//! their low byte.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes};
use cubicle_terminal::{channel_byte, Colour, Palette, Terminal, TextBuffer, BASE_16, PALETTE_SIZE};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{ProtocolError, Result};
use crate::wire::{ensure, read_bool, read_bytes, read_length, write_bool, write_length};

/// Cursor x and y, blink and the packed cursor colours.
const CURSOR_SIZE: usize = 4 + 4 + 1 + 1;

const PALETTE_BYTES: usize = PALETTE_SIZE * 3;

/// Bytes [`write_terminal`] produces for a terminal of the given size.
pub fn encoded_size(width: usize, height: usize) -> Option<usize> {
    width
        .checked_mul(height)?
        .checked_mul(2)?
        .checked_add(CURSOR_SIZE + PALETTE_BYTES)
}

fn glyph_byte(c: char) -> u8 {
    (u32::from(c) & 0xFF) as u8
}

fn colour_digit(index: u8) -> char {
    char::from(BASE_16.as_bytes()[usize::from(index & 0xF)])
}

fn packed_colour(foreground: char, background: char) -> u8 {
    let foreground = Colour::index_of(foreground, Colour::White) & 0xF;
    let background = Colour::index_of(background, Colour::Black) & 0xF;
    (background << 4 | foreground) as u8
}

pub fn write_terminal(terminal: &Terminal, buf: &mut impl BufMut) {
    let state = terminal.snapshot();
    buf.put_i32(state.cursor_x);
    buf.put_i32(state.cursor_y);
    write_bool(buf, state.cursor_blink);
    buf.put_u8(((state.background_colour & 0xF) << 4 | (state.text_colour & 0xF)) as u8);

    for y in 0..state.height {
        for &c in state.text[y].chars() {
            buf.put_u8(glyph_byte(c));
        }
        let foreground = state.text_colour_lines[y].chars();
        let background = state.background_colour_lines[y].chars();
        for (&fg, &bg) in foreground.iter().zip(background) {
            buf.put_u8(packed_colour(fg, bg));
        }
    }

    for i in 0..PALETTE_SIZE {
        for channel in state.palette.get_colour(i).unwrap_or_default() {
            buf.put_u8(channel_byte(channel));
        }
    }
}

/// Overwrite a terminal with state from [`write_terminal`]. The terminal
/// must already have the sender's dimensions.
///
/// Nothing is changed if the buffer is too short.
pub fn read_terminal(terminal: &Terminal, buf: &mut impl Buf) -> Result<()> {
    let mut state = terminal.snapshot();
    let (width, height) = (state.width, state.height);
    let expected = encoded_size(width, height).ok_or(ProtocolError::Overflow(width))?;
    ensure(buf, expected)?;

    state.cursor_x = buf.get_i32();
    state.cursor_y = buf.get_i32();
    state.cursor_blink = buf.get_u8() != 0;
    let cursor_colour = buf.get_u8();
    state.background_colour = usize::from(cursor_colour >> 4);
    state.text_colour = usize::from(cursor_colour & 0xF);

    for y in 0..height {
        let mut text = TextBuffer::new(' ', width);
        text.write_chars((0..width).map(|_| char::from(buf.get_u8())), 0);

        let mut foreground = TextBuffer::new(' ', width);
        let mut background = TextBuffer::new(' ', width);
        for x in 0..width {
            let colour = buf.get_u8();
            let column = x as i32;
            foreground.write_chars([colour_digit(colour)], column);
            background.write_chars([colour_digit(colour >> 4)], column);
        }

        state.text[y] = text;
        state.text_colour_lines[y] = foreground;
        state.background_colour_lines[y] = background;
    }

    let mut palette = Palette::new(state.palette.is_colour());
    for i in 0..PALETTE_SIZE {
        let r = f64::from(buf.get_u8()) / 255.0;
        let g = f64::from(buf.get_u8()) / 255.0;
        let b = f64::from(buf.get_u8()) / 255.0;
        palette.set_colour(i, r, g, b)?;
    }
    state.palette = palette;

    terminal.restore(state);
    Ok(())
}

/// A self-describing copy of a terminal, optionally gzip-compressed on the
/// wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalState {
    pub colour: bool,
    pub width: usize,
    pub height: usize,
    compress: bool,
    /// Uncompressed [`write_terminal`] output.
    buffer: Option<Bytes>,
}

impl TerminalState {
    pub fn from_terminal(terminal: Option<&Terminal>, compress: bool) -> Self {
        match terminal {
            None => Self {
                colour: false,
                width: 0,
                height: 0,
                compress,
                buffer: None,
            },
            Some(terminal) => {
                let mut buffer = Vec::new();
                write_terminal(terminal, &mut buffer);
                Self {
                    colour: terminal.is_colour(),
                    width: terminal.width(),
                    height: terminal.height(),
                    compress,
                    buffer: Some(Bytes::from(buffer)),
                }
            }
        }
    }

    pub fn has_terminal(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_compressed(&self) -> bool {
        self.compress
    }

    /// Uncompressed payload size.
    pub fn size(&self) -> usize {
        self.buffer.as_ref().map_or(0, Bytes::len)
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        write_bool(buf, self.colour);
        write_bool(buf, self.compress);
        write_bool(buf, self.buffer.is_some());

        let Some(buffer) = &self.buffer else {
            return Ok(());
        };
        write_length(buf, self.width)?;
        write_length(buf, self.height)?;
        if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(buffer)?;
            let compressed = encoder.finish()?;
            write_length(buf, compressed.len())?;
            buf.put_slice(&compressed);
        } else {
            write_length(buf, buffer.len())?;
            buf.put_slice(buffer);
        }
        Ok(())
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let colour = read_bool(buf)?;
        let compress = read_bool(buf)?;
        if !read_bool(buf)? {
            return Ok(Self {
                colour,
                width: 0,
                height: 0,
                compress,
                buffer: None,
            });
        }

        let width = read_length(buf)?;
        let height = read_length(buf)?;
        let expected = encoded_size(width, height).ok_or(ProtocolError::Overflow(width))?;
        let length = read_length(buf)?;
        let payload = read_bytes(buf, length)?;

        let buffer = if compress {
            // Never inflate past what the declared size needs.
            let mut decoder = GzDecoder::new(&payload[..]).take(expected as u64 + 1);
            let mut buffer = Vec::with_capacity(expected.min(length.saturating_mul(8)));
            decoder.read_to_end(&mut buffer)?;
            Bytes::from(buffer)
        } else {
            payload
        };
        if buffer.len() != expected {
            return Err(ProtocolError::TerminalSize {
                expected,
                actual: buffer.len(),
            });
        }

        Ok(Self {
            colour,
            width,
            height,
            compress,
            buffer: Some(buffer),
        })
    }

    /// Resize `terminal` to match and overwrite its contents.
    pub fn apply(&self, terminal: &Terminal) -> Result<()> {
        let buffer = self.buffer.as_ref().ok_or(ProtocolError::NoTerminal)?;
        terminal.resize(self.width, self.height);
        read_terminal(terminal, &mut buffer.clone())
    }

    pub fn create(&self) -> Result<Terminal> {
        let buffer = self.buffer.as_ref().ok_or(ProtocolError::NoTerminal)?;
        let terminal = Terminal::new(self.width, self.height, self.colour);
        read_terminal(&terminal, &mut buffer.clone())?;
        Ok(terminal)
    }
}
