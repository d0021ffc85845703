//! Strokes and the per-session draw history.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in voxel space (`[x, y, z]`).
pub type VoxelPoint = [f64; 3];

/// Pen value used by the drawing engine. `0` erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PenLabel(pub u8);

impl PenLabel {
    /// The eraser pen.
    pub const ERASER: PenLabel = PenLabel(0);
    /// Default pen (red).
    pub const RED: PenLabel = PenLabel(1);

    /// Check if this label erases.
    pub fn is_eraser(self) -> bool {
        self == Self::ERASER
    }
}

impl Default for PenLabel {
    fn default() -> Self {
        Self::RED
    }
}

impl fmt::Display for PenLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed pen stroke, as it travels over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Whether the last point connects back to the first.
    #[serde(rename = "isFilled", default)]
    pub is_filled: bool,
    /// Voxel points in drawing order.
    pub drawing: Vec<VoxelPoint>,
    /// Pen label the stroke was drawn with.
    pub label: PenLabel,
}

impl Stroke {
    /// Create a stroke from captured points.
    pub fn new(drawing: Vec<VoxelPoint>, label: PenLabel, is_filled: bool) -> Self {
        Self {
            is_filled,
            drawing,
            label,
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.drawing.len()
    }

    /// Check if the stroke has no points.
    pub fn is_empty(&self) -> bool {
        self.drawing.is_empty()
    }

    /// Check if this stroke is an erasure.
    pub fn is_erase(&self) -> bool {
        self.label.is_eraser()
    }
}

/// Ordered history of strokes applied in this session.
///
/// Every client keeps its own copy. Copies are reconciled only when a new
/// client joins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawHistory {
    strokes: Vec<Stroke>,
}

impl DrawHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stroke.
    pub fn push(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    /// Remove and return the most recent stroke.
    pub fn pop(&mut self) -> Option<Stroke> {
        self.strokes.pop()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn last(&self) -> Option<&Stroke> {
        self.strokes.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    pub fn as_slice(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Copy of the strokes, for snapshots.
    pub fn to_vec(&self) -> Vec<Stroke> {
        self.strokes.clone()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }
}

impl From<Vec<Stroke>> for DrawHistory {
    fn from(strokes: Vec<Stroke>) -> Self {
        Self { strokes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(label: u8) -> Stroke {
        Stroke::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], PenLabel(label), false)
    }

    #[test]
    fn test_stroke_wire_format() {
        let s = Stroke::new(vec![[1.0, 1.0, 1.0], [2.0, 1.0, 1.0]], PenLabel(2), false);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["isFilled"], false);
        assert_eq!(json["label"], 2);
        assert_eq!(json["drawing"][1][0], 2.0);
    }

    #[test]
    fn test_stroke_accepts_integer_points() {
        let json = r#"{"isFilled":true,"drawing":[[1,2,3]],"label":3}"#;
        let s: Stroke = serde_json::from_str(json).unwrap();
        assert!(s.is_filled);
        assert_eq!(s.drawing, vec![[1.0, 2.0, 3.0]]);
        assert_eq!(s.label, PenLabel(3));
    }

    #[test]
    fn test_eraser_stroke() {
        assert!(stroke(0).is_erase());
        assert!(!stroke(4).is_erase());
    }

    #[test]
    fn test_history_undo_is_lifo() {
        let mut history = DrawHistory::new();
        history.push(stroke(1));
        history.push(stroke(2));
        history.push(stroke(3));

        assert_eq!(history.pop().map(|s| s.label), Some(PenLabel(3)));
        assert_eq!(history.pop().map(|s| s.label), Some(PenLabel(2)));
        assert_eq!(history.as_slice(), &[stroke(1)]);
    }

    #[test]
    fn test_history_pop_empty() {
        let mut history = DrawHistory::new();
        assert!(history.pop().is_none());
        assert!(history.is_empty());
    }
}
