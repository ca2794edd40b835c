//! The 16-slot colour palette.

use crate::colour::Colour;
use crate::error::TerminalError;

pub const PALETTE_SIZE: usize = 16;

/// Maps colour indices to RGB triples with channels in `0.0..=1.0`.
///
/// Palettes of non-colour terminals still store full RGB values, but report
/// them as greyscale through [`Palette::get_colour`].
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colour: bool,
    colours: [[f64; 3]; PALETTE_SIZE],
}

impl Palette {
    pub fn new(colour: bool) -> Self {
        let mut palette = Self {
            colour,
            colours: [[0.0; 3]; PALETTE_SIZE],
        };
        palette.reset_colours();
        palette
    }

    pub fn is_colour(&self) -> bool {
        self.colour
    }

    /// Restore every slot to its standard colour.
    pub fn reset_colours(&mut self) {
        for colour in Colour::ALL {
            self.colours[colour.index()] = decode_rgb8(colour.hex());
        }
    }

    pub fn set_colour(&mut self, index: usize, r: f64, g: f64, b: f64) -> Result<(), TerminalError> {
        let slot = self
            .colours
            .get_mut(index)
            .ok_or(TerminalError::PaletteIndex(index))?;
        *slot = [r, g, b];
        Ok(())
    }

    pub fn set_colour_rgb8(&mut self, index: usize, rgb: u32) -> Result<(), TerminalError> {
        let [r, g, b] = decode_rgb8(rgb);
        self.set_colour(index, r, g, b)
    }

    /// The colour shown for `index`, greyscaled on non-colour terminals.
    pub fn get_colour(&self, index: usize) -> Option<[f64; 3]> {
        let rgb = *self.colours.get(index)?;
        if self.colour {
            Some(rgb)
        } else {
            let grey = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
            Some([grey, grey, grey])
        }
    }

    /// The stored colour for `index`, ignoring greyscale conversion.
    pub fn raw_colour(&self, index: usize) -> Option<[f64; 3]> {
        self.colours.get(index).copied()
    }
}

/// Pack float channels into a 24-bit `0xRRGGBB` value.
pub fn encode_rgb8(rgb: [f64; 3]) -> u32 {
    (channel_byte(rgb[0]) as u32) << 16 | (channel_byte(rgb[1]) as u32) << 8 | channel_byte(rgb[2]) as u32
}

/// Quantise one float channel to a byte, truncating towards zero.
pub fn channel_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Unpack a 24-bit `0xRRGGBB` value into float channels.
pub fn decode_rgb8(rgb: u32) -> [f64; 3] {
    [
        ((rgb >> 16) & 0xFF) as f64 / 255.0,
        ((rgb >> 8) & 0xFF) as f64 / 255.0,
        (rgb & 0xFF) as f64 / 255.0,
    ]
}
