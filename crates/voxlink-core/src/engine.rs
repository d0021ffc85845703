//! Drawing engine abstraction.
//!
//! The volume viewer that renders scans and owns the draw buffer lives outside
//! this crate. Everything the session needs from it goes through
//! [`DrawingEngine`]. [`HeadlessEngine`] is an in-process implementation that
//! tracks committed segments and records every call; the headless peer and the
//! tests run on it.

use crate::stroke::{PenLabel, VoxelPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slice layout of the viewer ("view number" on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum SliceType {
    #[default]
    Axial,
    Coronal,
    Sagittal,
    Multiplanar,
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid slice type: {0}")]
pub struct InvalidSliceType(pub u8);

impl SliceType {
    /// The view shown after this one when cycling.
    pub fn next(self) -> Self {
        match self {
            SliceType::Axial => SliceType::Coronal,
            SliceType::Coronal => SliceType::Sagittal,
            SliceType::Sagittal => SliceType::Multiplanar,
            SliceType::Multiplanar => SliceType::Render,
            SliceType::Render => SliceType::Axial,
        }
    }
}

impl TryFrom<u8> for SliceType {
    type Error = InvalidSliceType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SliceType::Axial),
            1 => Ok(SliceType::Coronal),
            2 => Ok(SliceType::Sagittal),
            3 => Ok(SliceType::Multiplanar),
            4 => Ok(SliceType::Render),
            other => Err(InvalidSliceType(other)),
        }
    }
}

impl From<SliceType> for u8 {
    fn from(value: SliceType) -> Self {
        match value {
            SliceType::Axial => 0,
            SliceType::Coronal => 1,
            SliceType::Sagittal => 2,
            SliceType::Multiplanar => 3,
            SliceType::Render => 4,
        }
    }
}

/// What a plain pointer drag does in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DragMode {
    /// Dragging scrolls through slices.
    #[default]
    Slice,
    Measurement,
    Pan,
}

/// Operations consumed from the volume viewer.
///
/// Coordinates come in three systems: voxel indices (strokes), fractions of
/// the volume extent (scene crosshair), and millimetres (crosshair on the wire).
pub trait DrawingEngine {
    fn set_drawing_enabled(&mut self, enabled: bool);
    fn is_drawing_enabled(&self) -> bool;

    /// Select the pen value and whether closed pen paths are filled.
    fn set_pen_value(&mut self, label: PenLabel, filled: bool);
    fn pen_value(&self) -> PenLabel;

    /// Draw a pen line between two voxels into the draw buffer.
    fn draw_pen_line(&mut self, from: VoxelPoint, to: VoxelPoint, label: PenLabel);

    /// Points of the pen path the engine is currently filling.
    fn pen_fill_points(&self) -> Vec<VoxelPoint>;

    /// Revert the draw buffer to the previous undo checkpoint.
    fn draw_undo(&mut self);

    /// Commit the draw buffer as an undo checkpoint.
    fn draw_add_undo_bitmap(&mut self);

    fn refresh_drawing(&mut self);
    fn set_slice_type(&mut self, slice: SliceType);
    fn set_drag_mode(&mut self, mode: DragMode);

    /// Scroll the 2D slice under the pixel offset `(x, y)` by `amount`.
    fn slice_scroll_2d(&mut self, amount: f64, x: f64, y: f64);

    fn mm_to_frac(&self, mm: [f64; 3]) -> [f64; 3];
    fn frac_to_mm(&self, frac: [f64; 3]) -> [f64; 3];
    fn crosshair_frac(&self) -> [f64; 3];
    fn set_crosshair_frac(&mut self, frac: [f64; 3]);

    fn draw_scene(&mut self);
    fn update_gl_volume(&mut self);
    fn set_draw_opacity(&mut self, opacity: f32);

    /// Save volume and annotations as a document.
    fn save_document(&mut self, filename: &str);
    /// Save the rendered scene as an image.
    fn save_scene(&mut self, filename: &str);
}

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetDrawingEnabled(bool),
    SetPenValue(PenLabel, bool),
    DrawPenLine(VoxelPoint, VoxelPoint, PenLabel),
    DrawUndo,
    DrawAddUndoBitmap,
    RefreshDrawing,
    SetSliceType(SliceType),
    SetDragMode(DragMode),
    SliceScroll2d(f64, f64, f64),
    SetCrosshairFrac([f64; 3]),
    DrawScene,
    UpdateGlVolume,
    SetDrawOpacity(f32),
    SaveDocument(String),
    SaveScene(String),
}

/// A drawn pen segment.
pub type Segment = (VoxelPoint, VoxelPoint, PenLabel);

/// Engine without a display.
///
/// Segments drawn since the last checkpoint are pending; a checkpoint moves
/// them into a committed unit that `draw_undo` removes again.
#[derive(Debug, Clone)]
pub struct HeadlessEngine {
    drawing_enabled: bool,
    pen: PenLabel,
    filled: bool,
    slice: SliceType,
    drag_mode: DragMode,
    crosshair: [f64; 3],
    opacity: f32,
    /// Millimetre position of the volume's first corner.
    origin_mm: [f64; 3],
    /// Millimetre extent of the volume along each axis.
    extent_mm: [f64; 3],
    fill_points: Vec<VoxelPoint>,
    pending: Vec<Segment>,
    committed: Vec<Vec<Segment>>,
    calls: Vec<EngineCall>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self {
            drawing_enabled: false,
            pen: PenLabel::RED,
            filled: false,
            slice: SliceType::default(),
            drag_mode: DragMode::default(),
            crosshair: [0.5, 0.5, 0.5],
            opacity: 0.8,
            origin_mm: [0.0; 3],
            extent_mm: [1.0; 3],
            fill_points: Vec::new(),
            pending: Vec::new(),
            committed: Vec::new(),
            calls: Vec::new(),
        }
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine for a volume spanning `extent_mm` from `origin_mm`.
    pub fn with_volume(origin_mm: [f64; 3], extent_mm: [f64; 3]) -> Self {
        Self {
            origin_mm,
            extent_mm,
            ..Self::default()
        }
    }

    /// All calls received so far, oldest first.
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Forget recorded calls (state is kept).
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Line draw calls received so far.
    pub fn line_calls(&self) -> Vec<Segment> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::DrawPenLine(a, b, label) => Some((*a, *b, *label)),
                _ => None,
            })
            .collect()
    }

    /// Number of committed undo units.
    pub fn committed_units(&self) -> usize {
        self.committed.len()
    }

    /// Segments currently visible in the draw buffer.
    pub fn visible_segments(&self) -> Vec<Segment> {
        self.committed
            .iter()
            .flatten()
            .chain(self.pending.iter())
            .copied()
            .collect()
    }

    /// Set the pen path reported by `pen_fill_points`.
    pub fn set_fill_points(&mut self, points: Vec<VoxelPoint>) {
        self.fill_points = points;
    }

    pub fn slice_type(&self) -> SliceType {
        self.slice
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag_mode
    }

    pub fn draw_opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }
}

impl DrawingEngine for HeadlessEngine {
    fn set_drawing_enabled(&mut self, enabled: bool) {
        self.drawing_enabled = enabled;
        self.calls.push(EngineCall::SetDrawingEnabled(enabled));
    }

    fn is_drawing_enabled(&self) -> bool {
        self.drawing_enabled
    }

    fn set_pen_value(&mut self, label: PenLabel, filled: bool) {
        self.pen = label;
        self.filled = filled;
        self.calls.push(EngineCall::SetPenValue(label, filled));
    }

    fn pen_value(&self) -> PenLabel {
        self.pen
    }

    fn draw_pen_line(&mut self, from: VoxelPoint, to: VoxelPoint, label: PenLabel) {
        self.pending.push((from, to, label));
        self.calls.push(EngineCall::DrawPenLine(from, to, label));
    }

    fn pen_fill_points(&self) -> Vec<VoxelPoint> {
        self.fill_points.clone()
    }

    fn draw_undo(&mut self) {
        self.pending.clear();
        self.committed.pop();
        self.calls.push(EngineCall::DrawUndo);
    }

    fn draw_add_undo_bitmap(&mut self) {
        let unit = std::mem::take(&mut self.pending);
        self.committed.push(unit);
        self.calls.push(EngineCall::DrawAddUndoBitmap);
    }

    fn refresh_drawing(&mut self) {
        self.calls.push(EngineCall::RefreshDrawing);
    }

    fn set_slice_type(&mut self, slice: SliceType) {
        self.slice = slice;
        self.calls.push(EngineCall::SetSliceType(slice));
    }

    fn set_drag_mode(&mut self, mode: DragMode) {
        self.drag_mode = mode;
        self.calls.push(EngineCall::SetDragMode(mode));
    }

    fn slice_scroll_2d(&mut self, amount: f64, x: f64, y: f64) {
        self.calls.push(EngineCall::SliceScroll2d(amount, x, y));
    }

    fn mm_to_frac(&self, mm: [f64; 3]) -> [f64; 3] {
        std::array::from_fn(|i| (mm[i] - self.origin_mm[i]) / self.extent_mm[i])
    }

    fn frac_to_mm(&self, frac: [f64; 3]) -> [f64; 3] {
        std::array::from_fn(|i| self.origin_mm[i] + frac[i] * self.extent_mm[i])
    }

    fn crosshair_frac(&self) -> [f64; 3] {
        self.crosshair
    }

    fn set_crosshair_frac(&mut self, frac: [f64; 3]) {
        self.crosshair = frac;
        self.calls.push(EngineCall::SetCrosshairFrac(frac));
    }

    fn draw_scene(&mut self) {
        self.calls.push(EngineCall::DrawScene);
    }

    fn update_gl_volume(&mut self) {
        self.calls.push(EngineCall::UpdateGlVolume);
    }

    fn set_draw_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
        self.calls.push(EngineCall::SetDrawOpacity(opacity));
    }

    fn save_document(&mut self, filename: &str) {
        self.calls.push(EngineCall::SaveDocument(filename.to_string()));
    }

    fn save_scene(&mut self, filename: &str) {
        self.calls.push(EngineCall::SaveScene(filename.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_type_cycles_through_all_views() {
        let mut view = SliceType::Axial;
        let mut seen = vec![view];
        for _ in 0..4 {
            view = view.next();
            seen.push(view);
        }
        assert_eq!(view.next(), SliceType::Axial);
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[4], SliceType::Render);
    }

    #[test]
    fn test_slice_type_wire_number() {
        assert_eq!(serde_json::to_string(&SliceType::Sagittal).unwrap(), "2");
        let view: SliceType = serde_json::from_str("3").unwrap();
        assert_eq!(view, SliceType::Multiplanar);
        assert!(serde_json::from_str::<SliceType>("9").is_err());
    }

    #[test]
    fn test_headless_undo_removes_last_unit() {
        let mut engine = HeadlessEngine::new();
        engine.draw_pen_line([0.0; 3], [1.0, 0.0, 0.0], PenLabel(1));
        engine.draw_add_undo_bitmap();
        engine.draw_pen_line([0.0; 3], [0.0, 1.0, 0.0], PenLabel(2));
        engine.draw_add_undo_bitmap();
        assert_eq!(engine.committed_units(), 2);

        engine.draw_undo();
        assert_eq!(engine.committed_units(), 1);
        assert_eq!(engine.visible_segments(), vec![([0.0; 3], [1.0, 0.0, 0.0], PenLabel(1))]);
    }

    #[test]
    fn test_headless_coordinate_round_trip() {
        let engine = HeadlessEngine::with_volume([-100.0, -50.0, 0.0], [200.0, 100.0, 50.0]);
        let frac = engine.mm_to_frac([0.0, 0.0, 25.0]);
        assert_eq!(frac, [0.5, 0.5, 0.5]);
        assert_eq!(engine.frac_to_mm(frac), [0.0, 0.0, 25.0]);
    }
}
