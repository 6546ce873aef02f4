use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ColorError;

/// An 8-bit sRGB color
///
/// Serialized in the canonical `rgb(r, g, b)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Lowercase `#rrggbb` form
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let digits = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::new(
                digits(&hex[0..2])?,
                digits(&hex[2..4])?,
                digits(&hex[4..6])?,
            )),
            // #rgb expands each digit: #f80 == #ff8800
            3 => {
                let mut out = [0u8; 3];
                for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                    let v = ch.to_digit(16)? as u8;
                    *slot = v * 17;
                }
                Some(Self::new(out[0], out[1], out[2]))
            }
            _ => None,
        }
    }

    /// Channels of `rgb(r, g, b)`, or of `rgba(r, g, b, a)` when `with_alpha`
    fn parse_functional(body: &str, with_alpha: bool) -> Option<Self> {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != if with_alpha { 4 } else { 3 } {
            return None;
        }
        if with_alpha {
            let alpha: f64 = parts[3].parse().ok()?;
            if !(0.0..=1.0).contains(&alpha) {
                return None;
            }
        }
        let channel = |s: &str| -> Option<u8> {
            let v: f64 = s.parse().ok()?;
            if !v.is_finite() || !(0.0..=255.0).contains(&v) {
                return None;
            }
            Some(v.round() as u8)
        };
        Some(Self::new(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
        ))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ColorError;

    /// Accepts `rgb(r, g, b)`, `rgba(r, g, b, a)` (alpha ignored), `#rrggbb` and `#rgb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();

        let parsed = if let Some(hex) = lower.strip_prefix('#') {
            Self::parse_hex(hex)
        } else if let Some(body) = lower.strip_prefix("rgba(") {
            body.strip_suffix(')').and_then(|b| Self::parse_functional(b, true))
        } else if let Some(body) = lower.strip_prefix("rgb(") {
            body.strip_suffix(')').and_then(|b| Self::parse_functional(b, false))
        } else {
            None
        };

        parsed.ok_or_else(|| ColorError::InvalidColor(trimmed.to_string()))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// CIE L*a*b* coordinates (D65 white)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    pub fn chroma(&self) -> f64 {
        self.a.hypot(self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_loose_forms() {
        let expected = Rgb::new(255, 128, 0);
        assert_eq!("rgb(255, 128, 0)".parse::<Rgb>().unwrap(), expected);
        assert_eq!("rgb(255,128,0)".parse::<Rgb>().unwrap(), expected);
        assert_eq!("  RGB( 255 , 128 , 0 ) ".parse::<Rgb>().unwrap(), expected);
        assert_eq!("rgba(255, 128, 0, 0.5)".parse::<Rgb>().unwrap(), expected);
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), expected);
        assert_eq!("#FF8000".parse::<Rgb>().unwrap(), expected);
        assert_eq!("#f80".parse::<Rgb>().unwrap(), Rgb::new(255, 136, 0));
    }

    #[test]
    fn rounds_fractional_channels() {
        assert_eq!(
            "rgb(127.6, 0.4, 254.5)".parse::<Rgb>().unwrap(),
            Rgb::new(128, 0, 255)
        );
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in ["", "red", "rgb(1,2)", "rgb(256,0,0)", "rgb(-1,0,0)", "#12", "#gggggg", "rgb(1,2,3"] {
            assert!(
                matches!(bad.parse::<Rgb>(), Err(ColorError::InvalidColor(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn alpha_must_match_prefix_and_range() {
        assert_eq!("rgba(1, 2, 3, 1)".parse::<Rgb>().unwrap(), Rgb::new(1, 2, 3));
        assert_eq!("rgba(1, 2, 3, 0)".parse::<Rgb>().unwrap(), Rgb::new(1, 2, 3));
        for bad in [
            "rgb(1,2,3,junk)",
            "rgb(1,2,3,)",
            "rgb(1,2,3,0.5)",
            "rgba(1,2,3)",
            "rgba(1,2,3,)",
            "rgba(1,2,3,1.5)",
            "rgba(1,2,3,-0.1)",
            "rgba(1,2,3,NaN)",
        ] {
            assert!(bad.parse::<Rgb>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn displays_canonically() {
        let color = Rgb::new(12, 34, 56);
        assert_eq!(color.to_string(), "rgb(12, 34, 56)");
        assert_eq!(color.to_hex(), "#0c2238");
        assert_eq!(color.to_string().parse::<Rgb>().unwrap(), color);
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"rgb(1, 2, 3)\"");
        let back: Rgb = serde_json::from_str("\"#010203\"").unwrap();
        assert_eq!(back, Rgb::new(1, 2, 3));
        assert!(serde_json::from_str::<Rgb>("\"nope\"").is_err());
    }
}
