//! Caret placement and selection geometry.
//!
//! Everything here reads the char positions of a composed mesh, so callers
//! must compose first.

use euclid::default::{Box2D, Point2D};

use crate::text::{
    layout::LineLayout,
    mesh::{CharPosition, ComposedText},
};

/// Line under the vertical position `y`, clamped to the first and last line.
fn line_at(layout: &LineLayout, y_offset: f32, y: f32) -> usize {
    layout
        .lines
        .iter()
        .position(|line| y < y_offset + line.y + line.height)
        .unwrap_or(layout.lines.len().saturating_sub(1))
}

/// Insertion index closest to `point`.
pub fn char_index_at(layout: &LineLayout, composed: &ComposedText, point: Point2D<f32>) -> usize {
    if layout.lines.is_empty() {
        return 0;
    }
    let line_index = line_at(layout, composed.y_offset, point.y);
    let line = &layout.lines[line_index];

    let mut visible: Vec<&CharPosition> = composed
        .char_positions
        .iter()
        .filter(|cp| cp.line_index == line_index && cp.char_index < line.end())
        .collect();
    visible.sort_by(|a, b| a.offset_x.total_cmp(&b.offset_x));

    visible
        .iter()
        .find(|cp| point.x < cp.offset_x + cp.width / 2.0)
        .map_or(line.end(), |cp| cp.char_index)
}

/// Caret box in front of `char_index`, one pixel wide and as tall as its line.
pub fn caret_rect(layout: &LineLayout, composed: &ComposedText, char_index: usize) -> Option<Box2D<f32>> {
    let cp = composed
        .char_positions
        .iter()
        .find(|cp| cp.char_index == char_index)
        .or_else(|| composed.char_positions.last())?;
    let line = layout.lines.get(cp.line_index)?;
    let top = composed.y_offset + line.y;
    Some(Box2D::new(
        Point2D::new(cp.offset_x, top),
        Point2D::new(cp.offset_x + 1.0, top + line.height),
    ))
}

/// One rectangle per line covering the characters in `[start, end)`.
pub fn selection_rects(
    layout: &LineLayout,
    composed: &ComposedText,
    start: usize,
    end: usize,
) -> Vec<Box2D<f32>> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let mut rects: Vec<(usize, Box2D<f32>)> = Vec::new();

    for cp in &composed.char_positions {
        if cp.char_index < start || cp.char_index >= end || cp.width <= 0.0 {
            continue;
        }
        let Some(line) = layout.lines.get(cp.line_index) else {
            continue;
        };
        let top = composed.y_offset + line.y;
        let rect = Box2D::new(
            Point2D::new(cp.offset_x, top),
            Point2D::new(cp.offset_x + cp.width, top + line.height),
        );
        match rects.iter_mut().find(|(index, _)| *index == cp.line_index) {
            Some((_, area)) => *area = area.union(&rect),
            None => rects.push((cp.line_index, rect)),
        }
    }
    rects.into_iter().map(|(_, rect)| rect).collect()
}
