//! Pen color palette.
//!
//! Pen labels index the drawing engine's annotation colormap; the picker shows
//! them as plain hex colors.

use crate::stroke::PenLabel;

/// A selectable pen color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenColor {
    pub label: PenLabel,
    /// Display name (e.g., "red")
    pub name: &'static str,
    /// Hex color as shown in the picker (e.g., "#FF0000")
    pub hex: &'static str,
}

impl PenColor {
    pub const fn new(label: u8, name: &'static str, hex: &'static str) -> Self {
        Self {
            label: PenLabel(label),
            name,
            hex,
        }
    }
}

pub const PEN_COLORS: &[PenColor] = &[
    PenColor::new(1, "red", "#FF0000"),
    PenColor::new(2, "green", "#00FF00"),
    PenColor::new(3, "blue", "#0000FF"),
    PenColor::new(4, "yellow", "#FFFF00"),
    PenColor::new(5, "cyan", "#00FFFF"),
];

/// The pen color palette.
pub struct Palette;

impl Palette {
    pub fn all() -> &'static [PenColor] {
        PEN_COLORS
    }

    /// Look up a color by picker hex value (case-insensitive, `#` optional).
    pub fn by_hex(hex: &str) -> Option<&'static PenColor> {
        let hex = hex.trim().trim_start_matches('#');
        PEN_COLORS
            .iter()
            .find(|c| c.hex[1..].eq_ignore_ascii_case(hex))
    }

    pub fn by_label(label: PenLabel) -> Option<&'static PenColor> {
        PEN_COLORS.iter().find(|c| c.label == label)
    }

    /// Display name for a label; "eraser" for 0.
    pub fn name(label: PenLabel) -> &'static str {
        if label.is_eraser() {
            return "eraser";
        }
        Self::by_label(label).map(|c| c.name).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_hex() {
        assert_eq!(Palette::by_hex("#ff0000").map(|c| c.label), Some(PenLabel(1)));
        assert_eq!(Palette::by_hex("00FFFF").map(|c| c.label), Some(PenLabel(5)));
        assert!(Palette::by_hex("#123456").is_none());
    }

    #[test]
    fn test_names() {
        assert_eq!(Palette::name(PenLabel(3)), "blue");
        assert_eq!(Palette::name(PenLabel::ERASER), "eraser");
        assert_eq!(Palette::name(PenLabel(42)), "unknown");
    }
}
