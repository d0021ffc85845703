//! Input events coming from the viewer element.

use serde::{Deserialize, Serialize};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
        meta: false,
    };
}

/// Pointer event over the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    /// Pointer moved; `buttons_down` is true while any button is held.
    Move { buttons_down: bool },
    /// A button was released.
    Up,
}

/// Key press, named by its physical key.
///
/// Letters are upper case ("D"), digits are plain ("1"), the space bar is
/// "Space". Browser `KeyboardEvent.code` values convert with [`KeyEvent::from_code`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    /// Convert a DOM key code ("KeyD", "Digit1", "Space") into a key event.
    pub fn from_code(code: &str, modifiers: Modifiers) -> Self {
        let key = code
            .strip_prefix("Key")
            .or_else(|| code.strip_prefix("Digit"))
            .or_else(|| code.strip_prefix("Numpad"))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(code);
        // Single characters are letters or digits; named keys keep their case.
        if key.len() == 1 {
            Self::new(key.to_ascii_uppercase(), modifiers)
        } else {
            Self::new(key, modifiers)
        }
    }
}

/// Mouse wheel over the viewer canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    pub delta_y: f64,
    pub client_x: f64,
    pub client_y: f64,
    /// Left edge of the canvas bounding box in client pixels.
    pub canvas_left: f64,
    /// Top edge of the canvas bounding box in client pixels.
    pub canvas_top: f64,
}

impl WheelEvent {
    /// Pointer position relative to the canvas origin.
    pub fn canvas_offset(&self) -> (f64, f64) {
        (self.client_x - self.canvas_left, self.client_y - self.canvas_top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_dom_code() {
        assert_eq!(KeyEvent::from_code("KeyD", Modifiers::NONE).key, "D");
        assert_eq!(KeyEvent::from_code("Digit2", Modifiers::NONE).key, "2");
        assert_eq!(KeyEvent::from_code("Space", Modifiers::NONE).key, "Space");
        assert_eq!(KeyEvent::from_code("z", Modifiers::CTRL).key, "Z");
    }

    #[test]
    fn test_bare_prefix_is_kept() {
        assert_eq!(KeyEvent::from_code("Key", Modifiers::NONE).key, "Key");
    }

    #[test]
    fn test_wheel_canvas_offset() {
        let wheel = WheelEvent {
            delta_y: -5.0,
            client_x: 110.0,
            client_y: 60.0,
            canvas_left: 10.0,
            canvas_top: 20.0,
        };
        assert_eq!(wheel.canvas_offset(), (100.0, 40.0));
    }
}
