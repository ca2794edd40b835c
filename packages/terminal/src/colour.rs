//! The 16 standard colours.

/// Hex digits used to store colour indices in the colour layers.
pub const BASE_16: &str = "0123456789abcdef";

/// The standard colours, numbered by their palette index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Colour {
    White = 0,
    Orange = 1,
    Magenta = 2,
    LightBlue = 3,
    Yellow = 4,
    Lime = 5,
    Pink = 6,
    Grey = 7,
    LightGrey = 8,
    Cyan = 9,
    Purple = 10,
    Blue = 11,
    Brown = 12,
    Green = 13,
    Red = 14,
    Black = 15,
}

impl Colour {
    pub const ALL: [Colour; 16] = [
        Colour::White,
        Colour::Orange,
        Colour::Magenta,
        Colour::LightBlue,
        Colour::Yellow,
        Colour::Lime,
        Colour::Pink,
        Colour::Grey,
        Colour::LightGrey,
        Colour::Cyan,
        Colour::Purple,
        Colour::Blue,
        Colour::Brown,
        Colour::Green,
        Colour::Red,
        Colour::Black,
    ];

    /// Position of this colour in the palette.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look a colour up by palette index.
    pub fn from_index(index: usize) -> Option<Colour> {
        Self::ALL.get(index).copied()
    }

    /// Default 24-bit RGB value.
    pub fn hex(self) -> u32 {
        match self {
            Colour::White => 0xF0F0F0,
            Colour::Orange => 0xF2B233,
            Colour::Magenta => 0xE57FD8,
            Colour::LightBlue => 0x99B2F2,
            Colour::Yellow => 0xDEDE6C,
            Colour::Lime => 0x7FCC19,
            Colour::Pink => 0xF2B2CC,
            Colour::Grey => 0x4C4C4C,
            Colour::LightGrey => 0x999999,
            Colour::Cyan => 0x4C99B2,
            Colour::Purple => 0xB266E5,
            Colour::Blue => 0x3366CC,
            Colour::Brown => 0x7F664C,
            Colour::Green => 0x57A64E,
            Colour::Red => 0xCC4C4C,
            Colour::Black => 0x111111,
        }
    }

    /// Hex digit stored in colour layers for this colour.
    pub fn to_char(self) -> char {
        index_char(self.index())
    }

    /// Parse a colour digit, falling back to `default` for anything that is not hex.
    ///
    /// Upper-case digits are accepted.
    pub fn index_of(c: char, default: Colour) -> usize {
        match c.to_digit(16) {
            Some(d) => d as usize,
            None => default.index(),
        }
    }
}

/// Hex digit for a palette index. Indices are masked to 4 bits.
pub(crate) fn index_char(index: usize) -> char {
    BASE_16.as_bytes()[index & 0xF] as char
}
