//! Pen tools: drawing mode, pen color, drag mode.

mod capture;

pub use capture::StrokeCapture;

use crate::engine::{DragMode, DrawingEngine};
use crate::stroke::PenLabel;
use serde::{Deserialize, Serialize};

/// What the pen currently does. Drawing and erasing exclude each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DrawingMode {
    #[default]
    Inactive,
    Draw(PenLabel),
    Erase,
}

impl DrawingMode {
    pub fn is_drawing(self) -> bool {
        matches!(self, DrawingMode::Draw(_))
    }

    pub fn is_erasing(self) -> bool {
        self == DrawingMode::Erase
    }

    pub fn is_active(self) -> bool {
        self != DrawingMode::Inactive
    }
}

/// Tracks the pen mode and keeps the engine's pen in step with it.
#[derive(Debug, Clone)]
pub struct ToolManager {
    mode: DrawingMode,
    /// Last non-eraser pen value, restored when drawing is switched back on.
    last_color: PenLabel,
    /// Closed pen paths are filled.
    filled: bool,
    drag_mode: DragMode,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new(PenLabel::RED)
    }
}

impl ToolManager {
    pub fn new(initial_color: PenLabel) -> Self {
        Self {
            mode: DrawingMode::Inactive,
            last_color: initial_color,
            filled: false,
            drag_mode: DragMode::default(),
        }
    }

    pub fn mode(&self) -> DrawingMode {
        self.mode
    }

    pub fn last_color(&self) -> PenLabel {
        self.last_color
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag_mode
    }

    /// Select the initial pen on the engine.
    pub fn install<E: DrawingEngine + ?Sized>(&self, engine: &mut E) {
        engine.set_pen_value(self.last_color, self.filled);
    }

    /// Switch the draw tool on or off.
    pub fn toggle_drawing<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E) -> DrawingMode {
        if self.mode.is_drawing() {
            engine.set_drawing_enabled(false);
            self.mode = DrawingMode::Inactive;
        } else {
            engine.set_drawing_enabled(true);
            if engine.pen_value().is_eraser() {
                engine.set_pen_value(self.last_color, self.filled);
            }
            self.mode = DrawingMode::Draw(engine.pen_value());
        }
        log::debug!("Drawing mode: {:?}", self.mode);
        self.mode
    }

    /// Switch the eraser on or off.
    pub fn toggle_erasing<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E) -> DrawingMode {
        if self.mode.is_erasing() {
            engine.set_drawing_enabled(false);
            self.mode = DrawingMode::Inactive;
        } else {
            engine.set_drawing_enabled(true);
            engine.set_pen_value(PenLabel::ERASER, self.filled);
            self.mode = DrawingMode::Erase;
        }
        log::debug!("Drawing mode: {:?}", self.mode);
        self.mode
    }

    /// Pick a pen color. An active eraser switches over to drawing with it.
    pub fn select_color<E: DrawingEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        color: PenLabel,
    ) -> DrawingMode {
        engine.set_pen_value(color, self.filled);
        if color.is_eraser() {
            return self.mode;
        }
        self.last_color = color;
        if self.mode.is_active() {
            self.mode = DrawingMode::Draw(color);
        }
        self.mode
    }

    /// Toggle filling of closed pen paths.
    pub fn set_filled<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, filled: bool) {
        self.filled = filled;
        let pen = engine.pen_value();
        engine.set_pen_value(pen, filled);
    }

    /// Remember the engine's pen if it is a color.
    pub fn observe_pen<E: DrawingEngine + ?Sized>(&mut self, engine: &E) {
        let pen = engine.pen_value();
        if !pen.is_eraser() {
            self.last_color = pen;
        }
    }

    pub fn set_drag_mode<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, mode: DragMode) {
        self.drag_mode = mode;
        engine.set_drag_mode(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;

    #[test]
    fn test_draw_and_erase_are_exclusive() {
        let mut engine = HeadlessEngine::new();
        let mut tools = ToolManager::default();

        assert_eq!(tools.toggle_drawing(&mut engine), DrawingMode::Draw(PenLabel::RED));
        assert_eq!(tools.toggle_erasing(&mut engine), DrawingMode::Erase);
        assert!(!tools.mode().is_drawing());
        assert_eq!(engine.pen_value(), PenLabel::ERASER);
        assert!(engine.is_drawing_enabled());
    }

    #[test]
    fn test_toggle_drawing_off_disables_engine() {
        let mut engine = HeadlessEngine::new();
        let mut tools = ToolManager::default();

        tools.toggle_drawing(&mut engine);
        assert_eq!(tools.toggle_drawing(&mut engine), DrawingMode::Inactive);
        assert!(!engine.is_drawing_enabled());
    }

    #[test]
    fn test_drawing_restores_color_after_eraser() {
        let mut engine = HeadlessEngine::new();
        let mut tools = ToolManager::default();

        tools.select_color(&mut engine, PenLabel(3));
        tools.toggle_erasing(&mut engine);
        assert_eq!(tools.toggle_drawing(&mut engine), DrawingMode::Draw(PenLabel(3)));
        assert_eq!(engine.pen_value(), PenLabel(3));
    }

    #[test]
    fn test_select_color_while_inactive_keeps_mode() {
        let mut engine = HeadlessEngine::new();
        let mut tools = ToolManager::default();

        assert_eq!(tools.select_color(&mut engine, PenLabel(4)), DrawingMode::Inactive);
        assert_eq!(tools.last_color(), PenLabel(4));
    }

    #[test]
    fn test_observe_pen_ignores_eraser() {
        let mut engine = HeadlessEngine::new();
        let mut tools = ToolManager::default();

        engine.set_pen_value(PenLabel(5), false);
        tools.observe_pen(&engine);
        engine.set_pen_value(PenLabel::ERASER, false);
        tools.observe_pen(&engine);
        assert_eq!(tools.last_color(), PenLabel(5));
    }
}
