use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An RGBA player color.
///
/// The textual form is `0xrrggbbaa`, which is what travels on the wire in
/// lobby, ownership and score messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0x00, 0x00, 0x00, 0x00);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const RED: Color = Color::rgb(0xff, 0x00, 0x00);
    pub const GREEN: Color = Color::rgb(0x00, 0x80, 0x00);
    pub const BLUE: Color = Color::rgb(0x00, 0x00, 0xff);
    pub const YELLOW: Color = Color::rgb(0xff, 0xff, 0x00);
    pub const ORANGE: Color = Color::rgb(0xff, 0xa5, 0x00);
    pub const PURPLE: Color = Color::rgb(0x80, 0x00, 0x80);
    pub const CYAN: Color = Color::rgb(0x00, 0xff, 0xff);
    pub const MAGENTA: Color = Color::rgb(0xff, 0x00, 0xff);
    pub const PINK: Color = Color::rgb(0xff, 0xc0, 0xcb);
    pub const BROWN: Color = Color::rgb(0xa5, 0x2a, 0x2a);

    /// Colors offered to players, also accepted by name when parsing.
    pub const PALETTE: [(&'static str, Color); 12] = [
        ("RED", Color::RED),
        ("BLUE", Color::BLUE),
        ("GREEN", Color::GREEN),
        ("YELLOW", Color::YELLOW),
        ("ORANGE", Color::ORANGE),
        ("PURPLE", Color::PURPLE),
        ("CYAN", Color::CYAN),
        ("MAGENTA", Color::MAGENTA),
        ("PINK", Color::PINK),
        ("BROWN", Color::BROWN),
        ("BLACK", Color::BLACK),
        ("WHITE", Color::WHITE),
    ];

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 0xff)
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Stable 32-bit identity of the color (`0xRRGGBBAA`), used as the key of
    /// the server's color registry.
    pub fn hash_code(&self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    pub fn from_hash_code(hash: u32) -> Self {
        let [r, g, b, a] = hash.to_be_bytes();
        Self { r, g, b, a }
    }

    pub fn name(&self) -> Option<&'static str> {
        Self::PALETTE
            .iter()
            .find(|(_, color)| color == self)
            .map(|(name, _)| *name)
    }

    fn parse_hex(digits: &str) -> Option<Self> {
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        match digits.len() {
            6 => u32::from_str_radix(digits, 16)
                .ok()
                .map(|rgb| Self::from_hash_code((rgb << 8) | 0xff)),
            8 => u32::from_str_radix(digits, 16).ok().map(Self::from_hash_code),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02x}{:02x}{:02x}{:02x}",
            self.r, self.g, self.b, self.a
        )
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .or_else(|| trimmed.strip_prefix('#'));

        let parsed = match hex {
            Some(digits) => Self::parse_hex(digits),
            None => Self::PALETTE
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
                .map(|(_, color)| *color),
        };

        parsed.ok_or_else(|| ProtocolError::InvalidColor(s.to_string()))
    }
}

impl TryFrom<String> for Color {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}
