//! Accumulates pointer positions into a stroke while the pen is down.

use crate::engine::DrawingEngine;
use crate::stroke::{Stroke, VoxelPoint};

/// In-progress stroke capture.
#[derive(Debug, Clone, Default)]
pub struct StrokeCapture {
    /// Voxel under the pointer, as last reported by the engine.
    position: Option<VoxelPoint>,
    points: Vec<VoxelPoint>,
}

impl StrokeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the voxel under the pointer.
    pub fn set_position(&mut self, voxel: VoxelPoint) {
        self.position = Some(voxel);
    }

    pub fn position(&self) -> Option<VoxelPoint> {
        self.position
    }

    /// Points captured for the current stroke.
    pub fn points(&self) -> &[VoxelPoint] {
        &self.points
    }

    pub fn is_capturing(&self) -> bool {
        !self.points.is_empty()
    }

    /// Handle pointer motion.
    ///
    /// In filled mode the engine's pen-fill path replaces the buffer. Otherwise
    /// the current voxel is appended while a button is held and drawing is on.
    pub fn pointer_move<E: DrawingEngine + ?Sized>(
        &mut self,
        engine: &E,
        buttons_down: bool,
        filled: bool,
    ) {
        if filled {
            let fill = engine.pen_fill_points();
            if !fill.is_empty() {
                self.points = fill;
            }
            return;
        }
        if !buttons_down || !engine.is_drawing_enabled() {
            return;
        }
        if let Some(voxel) = self.position {
            self.points.push(voxel);
        }
    }

    /// Handle pointer release. Returns the finished stroke, if any.
    pub fn pointer_up<E: DrawingEngine + ?Sized>(&mut self, engine: &E, filled: bool) -> Option<Stroke> {
        self.position = None;
        let points = std::mem::take(&mut self.points);
        if !engine.is_drawing_enabled() || points.is_empty() {
            return None;
        }
        Some(Stroke::new(points, engine.pen_value(), filled))
    }
}
