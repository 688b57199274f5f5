use std::sync::Arc;

use euclid::default::{Box2D, Point2D};

use crate::glyph_atlas::{AtlasConfig, AtlasKey, AtlasUpdate, GlyphAtlas};
use crate::text::TextFormat;

use super::{GlyphMetrics, GlyphQuad, GlyphSource};

/// [`GlyphSource`] backed by a `fontdue` face and a private glyph atlas.
pub struct FontdueGlyphSource {
    font: Arc<fontdue::Font>,
    atlas: GlyphAtlas,
    native_bold: bool,
}

impl FontdueGlyphSource {
    pub fn new(font: Arc<fontdue::Font>, config: &AtlasConfig) -> Self {
        Self {
            font,
            atlas: GlyphAtlas::new(config),
            native_bold: false,
        }
    }

    /// Marks the face as a bold face so no bold is simulated on top of it.
    pub fn with_native_bold(mut self, native_bold: bool) -> Self {
        self.native_bold = native_bold;
        self
    }

    pub fn font(&self) -> &Arc<fontdue::Font> {
        &self.font
    }

    pub fn atlas_texture_size(&self) -> usize {
        self.atlas.texture_size()
    }

    /// Pixels rasterized since the last call; the host copies them into its texture.
    pub fn take_atlas_updates(&mut self) -> Vec<AtlasUpdate> {
        self.atlas.take_updates()
    }

    fn glyph_index(&self, ch: char) -> Option<u16> {
        if ch.is_control() {
            return None;
        }
        match self.font.lookup_glyph_index(ch) {
            0 if !ch.is_whitespace() => None,
            index => Some(index),
        }
    }
}

impl GlyphSource for FontdueGlyphSource {
    fn get_glyph(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<GlyphMetrics> {
        let index = self.glyph_index(ch)?;
        let size = format.glyph_size(scale);
        let metrics = self.font.metrics_indexed(index, size);
        let (ascent, descent) = self
            .font
            .horizontal_line_metrics(size)
            .map(|line| (line.ascent, line.descent))
            .unwrap_or((size * 0.8, -size * 0.2));

        Some(GlyphMetrics {
            width: metrics.advance_width,
            height: ascent - descent,
            baseline: ascent,
        })
    }

    fn glyph_quad(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<GlyphQuad> {
        let index = self.glyph_index(ch)?;
        let size = format.glyph_size(scale);
        let metrics = self.font.metrics_indexed(index, size);
        if metrics.width == 0 || metrics.height == 0 {
            return None;
        }

        let font = Arc::clone(&self.font);
        let entry = self.atlas.get_or_insert_with(
            AtlasKey::new(index, size),
            metrics.width,
            metrics.height,
            || font.rasterize_indexed(index, size).1,
        )?;

        let x = metrics.xmin as f32;
        let y = -(metrics.ymin as f32 + metrics.height as f32);
        Some(GlyphQuad {
            rect: Box2D::new(
                Point2D::new(x, y),
                Point2D::new(x + metrics.width as f32, y + metrics.height as f32),
            ),
            uv: entry.uv,
        })
    }

    fn line_height(&self, point_size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(point_size)
            .map(|line| line.new_line_size)
            .unwrap_or(point_size)
    }

    fn prepare_characters(&mut self, text: &str, format: &TextFormat, scale: f32) {
        self.atlas.new_batch();
        for ch in text.chars() {
            self.glyph_quad(ch, format, scale);
        }
    }

    fn version(&self) -> u64 {
        self.atlas.generation()
    }

    fn solid_uv(&self) -> Box2D<f32> {
        self.atlas.solid_uv()
    }

    fn has_native_bold(&self) -> bool {
        self.native_bold
    }
}
