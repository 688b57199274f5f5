//! Font abstraction consumed by layout and mesh generation.

mod fontdue_source;

use std::sync::Arc;

use euclid::default::{Box2D, Point2D};
use parking_lot::Mutex;

use crate::text::TextFormat;

pub use fontdue_source::FontdueGlyphSource;

/// Layout metrics of a single character at a given format.
///
/// `baseline` is the distance from the top of the glyph cell to its baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphMetrics {
    pub width: f32,
    pub height: f32,
    pub baseline: f32,
}

/// Drawable part of a glyph.
///
/// **Y-axis goes down.** `rect` is relative to the pen position on the
/// baseline, so a glyph sitting on the baseline has a negative `min.y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    pub rect: Box2D<f32>,
    pub uv: Box2D<f32>,
}

/// A font that can measure characters and place them into a shared atlas.
///
/// Implementations must be deterministic between two `version` bumps: the
/// layout engine caches measurements and relies on `version` to learn that
/// the backing atlas was rebuilt.
pub trait GlyphSource: Send {
    /// Measures `ch`. `None` means the face has no glyph for it.
    fn get_glyph(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<GlyphMetrics>;

    /// Rasterizes `ch` (if needed) and returns its quad.
    ///
    /// Returns `None` for characters without visible pixels, such as spaces.
    fn glyph_quad(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<GlyphQuad>;

    /// Default distance between two baselines for `point_size`.
    fn line_height(&self, point_size: f32) -> f32;

    /// Hint issued before a layout pass that `text` is about to be measured.
    fn prepare_characters(&mut self, _text: &str, _format: &TextFormat, _scale: f32) {}

    /// Incremented every time previously returned quads become invalid.
    fn version(&self) -> u64;

    /// UV rectangle of a fully opaque texel, used for underline quads.
    fn solid_uv(&self) -> Box2D<f32>;

    /// Whether bold text is rendered by the face itself.
    ///
    /// When `false` the mesh composer simulates bold by drawing offset copies.
    fn has_native_bold(&self) -> bool {
        false
    }
}

/// Glyph sources are shared between the registry and every text field using them.
pub type SharedGlyphSource = Arc<Mutex<dyn GlyphSource>>;

/// Wraps a concrete source into a [`SharedGlyphSource`].
pub fn share(source: impl GlyphSource + 'static) -> SharedGlyphSource {
    Arc::new(Mutex::new(source))
}

/// Hard-coded face that draws every printable character as a solid box.
///
/// It needs no font data, so it is the last resort when no face can be
/// loaded. The metrics are simple multiples of the point size which also
/// makes it handy for predictable layout.
#[derive(Clone, Debug)]
pub struct BoxGlyphSource {
    advance: f32,
    ascent: f32,
    version: u64,
}

impl Default for BoxGlyphSource {
    fn default() -> Self {
        Self::new()
    }
}

impl BoxGlyphSource {
    pub fn new() -> Self {
        Self {
            advance: 0.5,
            ascent: 0.8,
            version: 0,
        }
    }

    /// Uses `advance * size` as the width of every character.
    pub fn with_advance(advance: f32) -> Self {
        Self {
            advance,
            ..Self::new()
        }
    }

    /// Marks every previously returned quad as stale.
    pub fn invalidate(&mut self) {
        self.version += 1;
    }
}

impl GlyphSource for BoxGlyphSource {
    fn get_glyph(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<GlyphMetrics> {
        if ch.is_control() {
            return None;
        }
        let size = format.glyph_size(scale);
        Some(GlyphMetrics {
            width: size * self.advance,
            height: size,
            baseline: size * self.ascent,
        })
    }

    fn glyph_quad(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<GlyphQuad> {
        if ch.is_whitespace() {
            return None;
        }
        let metrics = self.get_glyph(ch, format, scale)?;
        Some(GlyphQuad {
            rect: Box2D::new(
                Point2D::new(0.0, -metrics.baseline),
                Point2D::new(metrics.width, metrics.height - metrics.baseline),
            ),
            uv: self.solid_uv(),
        })
    }

    fn line_height(&self, point_size: f32) -> f32 {
        point_size
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn solid_uv(&self) -> Box2D<f32> {
        Box2D::new(Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_source_measures_by_size() {
        let mut source = BoxGlyphSource::new();
        let format = TextFormat {
            size: 20,
            ..Default::default()
        };
        let m = source.get_glyph('A', &format, 1.0).unwrap();
        assert_eq!(m.width, 10.0);
        assert_eq!(m.height, 20.0);
        assert_eq!(m.baseline, 16.0);

        let half = source.get_glyph('A', &format, 0.5).unwrap();
        assert_eq!(half.width, 5.0);
    }

    #[test]
    fn box_source_blank_glyphs() {
        let mut source = BoxGlyphSource::new();
        let format = TextFormat::default();
        assert!(source.get_glyph('\n', &format, 1.0).is_none());
        assert!(source.get_glyph(' ', &format, 1.0).is_some());
        assert!(source.glyph_quad(' ', &format, 1.0).is_none());

        let quad = source.glyph_quad('x', &format, 1.0).unwrap();
        assert!(quad.rect.min.y < 0.0);
        assert_eq!(quad.rect.max.x, 6.0);
    }

    #[test]
    fn invalidate_bumps_version() {
        let mut source = BoxGlyphSource::new();
        assert_eq!(source.version(), 0);
        source.invalidate();
        assert_eq!(source.version(), 1);

        let shared = share(source);
        assert_eq!(shared.lock().version(), 1);
    }
}
