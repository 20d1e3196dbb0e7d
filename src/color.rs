//! Colour value types shared by every device family.

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// One zone colour, 8 bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Ordered zone colours; index is the zone index.
pub type ColorFrame = Vec<Color>;

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `rrggbb`, with or without a leading `#`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        let invalid = || LinkError::InvalidColor {
            value: s.to_string(),
        };
        if digits.len() != 6 {
            return Err(invalid());
        }
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        Ok(Self::new(bytes[0], bytes[1], bytes[2]))
    }

    /// Lowercase `rrggbb` without a prefix.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode([self.r, self.g, self.b])
    }

    #[must_use]
    pub const fn is_black(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Parse a whitespace or comma separated list of hex colours into a frame.
pub fn parse_frame(line: &str) -> Result<ColorFrame> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(Color::from_hex)
        .collect()
}

/// An all-black frame with `zones` entries.
#[must_use]
pub fn black_frame(zones: usize) -> ColorFrame {
    vec![Color::BLACK; zones]
}
