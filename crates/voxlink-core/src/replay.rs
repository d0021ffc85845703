//! Replays point lists into the drawing engine as pen segments.

use crate::engine::DrawingEngine;
use crate::stroke::{PenLabel, Stroke, VoxelPoint};

/// Draw `points` as connected pen segments and commit them as one undo unit.
///
/// Consecutive points are joined in order. With `close_loop` the last point is
/// joined back to the first, which needs at least two points. An empty list
/// leaves the engine untouched. Returns the number of segments drawn.
pub fn apply_stroke<E: DrawingEngine + ?Sized>(
    engine: &mut E,
    points: &[VoxelPoint],
    label: PenLabel,
    close_loop: bool,
) -> usize {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0;
    };

    let mut segments = 0;
    for pair in points.windows(2) {
        draw_segment(engine, pair[0], pair[1], label);
        segments += 1;
    }

    if close_loop && points.len() > 1 {
        draw_segment(engine, *last, *first, label);
        segments += 1;
    }

    engine.draw_add_undo_bitmap();
    segments
}

/// Replay a complete stroke.
pub fn replay_stroke<E: DrawingEngine + ?Sized>(engine: &mut E, stroke: &Stroke) -> usize {
    apply_stroke(engine, &stroke.drawing, stroke.label, stroke.is_filled)
}

fn draw_segment<E: DrawingEngine + ?Sized>(
    engine: &mut E,
    from: VoxelPoint,
    to: VoxelPoint,
    label: PenLabel,
) {
    if !engine.is_drawing_enabled() {
        engine.set_drawing_enabled(true);
    }
    engine.draw_pen_line(from, to, label);
    engine.refresh_drawing();
}
