//! ARGB colors and their tour-file string forms

use std::fmt;

/// An 8-bit-per-channel ARGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const NAMED: &[(&str, Color)] = &[
    ("white", Color::WHITE),
    ("black", Color::BLACK),
    ("transparent", Color::from_argb(0, 255, 255, 255)),
    ("red", Color::from_argb(255, 255, 0, 0)),
    ("green", Color::from_argb(255, 0, 128, 0)),
    ("lime", Color::from_argb(255, 0, 255, 0)),
    ("blue", Color::from_argb(255, 0, 0, 255)),
    ("yellow", Color::from_argb(255, 255, 255, 0)),
    ("cyan", Color::from_argb(255, 0, 255, 255)),
    ("magenta", Color::from_argb(255, 255, 0, 255)),
    ("gray", Color::from_argb(255, 128, 128, 128)),
    ("orange", Color::from_argb(255, 255, 165, 0)),
    ("purple", Color::from_argb(255, 128, 0, 128)),
];

impl Color {
    pub const WHITE: Color = Color::from_argb(255, 255, 255, 255);
    pub const BLACK: Color = Color::from_argb(255, 0, 0, 0);

    /// Creates a color from its four channels
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Opaque color from three channels
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(255, r, g, b)
    }

    /// Parses the `ARGBColor:a:r:g:b` save form, `#RRGGBB`, `#AARRGGBB`
    /// or a known color name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(rest) = value.strip_prefix("ARGBColor:") {
            let parts: Vec<u8> = rest
                .split(':')
                .map(|p| p.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .ok()?;
            return match parts.as_slice() {
                [a, r, g, b] => Some(Self::from_argb(*a, *r, *g, *b)),
                _ => None,
            };
        }
        if let Some(hex) = value.strip_prefix('#') {
            let n = u32::from_str_radix(hex, 16).ok()?;
            return match hex.len() {
                6 => Some(Self::from_rgb((n >> 16) as u8, (n >> 8) as u8, n as u8)),
                8 => Some(Self::from_argb(
                    (n >> 24) as u8,
                    (n >> 16) as u8,
                    (n >> 8) as u8,
                    n as u8,
                )),
                _ => None,
            };
        }
        let lower = value.to_ascii_lowercase();
        NAMED
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, c)| *c)
    }

    /// Parses, falling back to `default` on anything unrecognized
    pub fn parse_or(value: Option<&str>, default: Color) -> Color {
        value.and_then(Self::parse).unwrap_or(default)
    }

    /// Channel-wise linear interpolation
    pub fn lerp(self, end: Color, t: f64) -> Color {
        let mix = |a: u8, b: u8| -> u8 {
            (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
        };
        Color::from_argb(
            mix(self.a, end.a),
            mix(self.r, end.r),
            mix(self.g, end.g),
            mix(self.b, end.b),
        )
    }

    /// The same color with a different alpha
    pub fn with_alpha(self, a: u8) -> Color {
        Color { a, ..self }
    }

    /// `#RRGGBB` form used by text rendering
    pub fn to_html(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARGBColor:{}:{}:{}:{}", self.a, self.r, self.g, self.b)
    }
}
