//! Turns a [`LineLayout`] into textured quads.
//!
//! **Y-axis goes down.** Vertices are in content space: `(0, 0)` is the
//! top-left corner of the content rect.

use std::sync::Arc;

use euclid::default::{Box2D, Point2D, Vector2D};

use crate::{
    font_registry::FontRegistry,
    glyph_source::{GlyphQuad, SharedGlyphSource},
    text::{
        AutoSize, Color32, ElementKind, ElementStatus, HorizontalAlign, MarkupElement, TextFormat,
        VerticalAlign, bidi,
        layout::{GUTTER_X, IMAGE_BASELINE, LayoutConfig, LineLayout},
        markup::{ENTITY_PLACEHOLDER, format_at},
    },
};

/// Upper bound on vertices in one mesh.
///
/// Glyphs are dropped whole once the next one would cross the limit, so a
/// mesh whose glyphs take more than four vertices (faux bold draws sixteen)
/// can stop a little short of it. Outline and shadow layers are skipped
/// entirely when the layered mesh would not fit.
pub const MAX_VERTICES: usize = 65000;

/// Outline offsets; the first four are used unless the enhanced outline is on.
const STROKE_OFFSET: [f32; 16] = [
    -1.0, 0.0, 1.0, 0.0, 0.0, -1.0, 0.0, 1.0, //
    -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0,
];

const BOLD_OFFSET: [Vector2D<f32>; 4] = [
    Vector2D::new(-0.5, 0.0),
    Vector2D::new(0.5, 0.0),
    Vector2D::new(0.0, -0.5),
    Vector2D::new(0.0, 0.5),
];

const NO_OFFSET: [Vector2D<f32>; 1] = [Vector2D::new(0.0, 0.0)];

/// Horizontal shift per pixel above the baseline for italic text.
const ITALIC_SHEAR: f32 = 0.2;

const ELLIPSIS: char = '\u{2026}';

/// Flat vertex buffers.
///
/// Every quad is stored as bottom-left, top-left, top-right, bottom-right and
/// triangulated as `0 1 2 2 3 0`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Point2D<f32>>,
    pub uvs: Vec<Point2D<f32>>,
    pub colors: Vec<Color32>,
    pub triangles: Vec<u32>,
}

impl MeshData {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.uvs.clear();
        self.colors.clear();
        self.triangles.clear();
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// `colors` follow the vertex order.
    pub fn add_quad(&mut self, rect: Box2D<f32>, uv: Box2D<f32>, colors: [Color32; 4]) {
        self.vertices.extend([
            Point2D::new(rect.min.x, rect.max.y),
            rect.min,
            Point2D::new(rect.max.x, rect.min.y),
            rect.max,
        ]);
        self.uvs.extend([
            Point2D::new(uv.min.x, uv.max.y),
            uv.min,
            Point2D::new(uv.max.x, uv.min.y),
            uv.max,
        ]);
        self.colors.extend(colors);
    }

    /// Shears the last `count` vertices around `baseline_y`.
    fn skew_last(&mut self, count: usize, baseline_y: f32, shear: f32) {
        let start = self.vertices.len().saturating_sub(count);
        for v in &mut self.vertices[start..] {
            v.x += (baseline_y - v.y) * shear;
        }
    }

    fn build_quad_triangles(&mut self) {
        self.triangles.clear();
        let quads = self.vertices.len() / 4;
        self.triangles.reserve(quads * 6);
        for q in 0..quads as u32 {
            let base = q * 4;
            self.triangles
                .extend([base, base + 1, base + 2, base + 2, base + 3, base]);
        }
    }
}

/// Where a character ended up.
///
/// One entry exists per character of the text plus a trailing entry at
/// `char_index == len` that marks the end position for the caret. Entries of
/// a line are in logical order even when the line is drawn right to left, and
/// their vertex ranges follow one another in the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CharPosition {
    pub char_index: usize,
    pub line_index: usize,
    pub offset_x: f32,
    /// Vertices of the main layer that belong to this character.
    pub vertex_count: usize,
    pub width: f32,
    /// Index + 1 of the entity element drawn here, `0` for characters.
    pub image_index: usize,
}

/// Hit area of one link, one rect per line it spans.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkArea {
    /// Index of the [`ElementKind::Link`] element.
    pub element_index: usize,
    pub rects: Vec<Box2D<f32>>,
}

/// Output of [`MeshComposer::compose`].
#[derive(Clone, Debug, Default)]
pub struct ComposedText {
    pub mesh: MeshData,
    pub char_positions: Vec<CharPosition>,
    pub link_areas: Vec<LinkArea>,
    /// Vertical alignment offset already applied to the vertices.
    pub y_offset: f32,
    /// Vertices of the main layer; shadow and outline layers repeat it.
    pub main_vertex_count: usize,
    /// The main layer hit [`MAX_VERTICES`] and was cut.
    pub truncated: bool,
}

impl ComposedText {
    /// Link element under `point`.
    pub fn link_at(&self, point: Point2D<f32>) -> Option<usize> {
        self.link_areas
            .iter()
            .find(|area| area.rects.iter().any(|r| r.contains(point)))
            .map(|area| area.element_index)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Placement {
    x: f32,
    width: f32,
    visual_index: usize,
    measured: bool,
}

#[derive(Default)]
struct Batch {
    mesh: MeshData,
    positions: Vec<CharPosition>,
    truncated: bool,
}

impl Batch {
    fn reserve(&mut self, vertices: usize) -> bool {
        if self.truncated {
            return false;
        }
        if self.mesh.vertex_count() + vertices > MAX_VERTICES {
            log::warn!(
                "Text mesh would exceed {} vertices; remaining glyphs are dropped.",
                MAX_VERTICES
            );
            self.truncated = true;
            return false;
        }
        true
    }

    /// Adds vertices to the most recent character.
    fn credit_last(&mut self, vertices: usize) {
        if let Some(last) = self.positions.last_mut() {
            last.vertex_count += vertices;
        }
    }

    fn push_decoration(&mut self, run: DecorationRun) {
        if self.positions.is_empty() || !self.reserve(4) {
            return;
        }
        let rect = Box2D::new(
            Point2D::new(run.start, run.y),
            Point2D::new(run.end, run.y + run.thickness),
        );
        self.mesh.add_quad(rect, run.uv, [run.color; 4]);
        self.credit_last(4);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct DecorationRun {
    start: f32,
    end: f32,
    y: f32,
    thickness: f32,
    color: Color32,
    uv: Box2D<f32>,
}

impl DecorationRun {
    fn continues(&self, next: &Self) -> bool {
        self.color == next.color && self.y == next.y && self.thickness == next.thickness
    }
}

/// Open underline and strikethrough runs of the current line.
#[derive(Default)]
struct Decorations {
    underline: Option<DecorationRun>,
    strike: Option<DecorationRun>,
}

impl Decorations {
    fn update(
        &mut self,
        batch: &mut Batch,
        format: &TextFormat,
        x: f32,
        width: f32,
        baseline_y: f32,
        scale: f32,
        uv: Box2D<f32>,
    ) {
        let size = format.glyph_size(scale);
        let thickness = (size / 16.0).max(1.0);
        let y = baseline_y + format.baseline_shift(scale);
        let run = |y| DecorationRun {
            start: x,
            end: x + width,
            y,
            thickness,
            color: format.color,
            uv,
        };

        let under = format.underline.then(|| run(y + thickness));
        let strike = format
            .strikethrough
            .then(|| run(y - (size * 0.3).round() - thickness / 2.0));
        Self::merge(&mut self.underline, under, batch);
        Self::merge(&mut self.strike, strike, batch);
    }

    fn merge(slot: &mut Option<DecorationRun>, next: Option<DecorationRun>, batch: &mut Batch) {
        if let (Some(run), Some(next)) = (slot.as_mut(), next.as_ref())
            && run.continues(next)
        {
            run.start = run.start.min(next.start);
            run.end = run.end.max(next.end);
            return;
        }
        if let Some(run) = slot.take() {
            batch.push_decoration(run);
        }
        *slot = next;
    }

    fn flush(&mut self, batch: &mut Batch) {
        for slot in [&mut self.underline, &mut self.strike] {
            if let Some(run) = slot.take() {
                batch.push_decoration(run);
            }
        }
    }
}

/// Builds the vertex buffers for laid-out text.
pub struct MeshComposer<'a> {
    registry: &'a FontRegistry,
    base: &'a TextFormat,
    config: &'a LayoutConfig,
    enhanced_outline: bool,
    sources: Vec<(String, SharedGlyphSource)>,
}

impl<'a> MeshComposer<'a> {
    pub fn new(registry: &'a FontRegistry, base: &'a TextFormat, config: &'a LayoutConfig) -> Self {
        Self {
            registry,
            base,
            config,
            enhanced_outline: false,
            sources: Vec::new(),
        }
    }

    /// Draws outlines in eight directions instead of four.
    pub fn with_enhanced_outline(mut self, enhanced: bool) -> Self {
        self.enhanced_outline = enhanced;
        self
    }

    fn source(&mut self, name: &str) -> SharedGlyphSource {
        if let Some((_, source)) = self.sources.iter().find(|(n, _)| n == name) {
            return Arc::clone(source);
        }
        let source = self.registry.get_font(name);
        self.sources.push((name.to_string(), Arc::clone(&source)));
        source
    }

    /// Composes the mesh and updates entity positions and clip status.
    pub fn compose(
        mut self,
        text: &[char],
        elements: &mut [MarkupElement],
        layout: &LineLayout,
    ) -> ComposedText {
        let content_w = layout.width;
        let content_h = layout.height;
        let rect_width = if content_w > 0.0 {
            content_w - GUTTER_X * 2.0
        } else {
            0.0
        };
        let clipping = matches!(self.config.auto_size, AutoSize::None | AutoSize::Ellipsis);
        let scale = layout.font_size_scale;
        let letter_spacing = self.base.letter_spacing * scale;
        let rtl = layout.direction.is_rtl();

        let y_offset = match self.base.vertical_align {
            VerticalAlign::Top => 0.0,
            align => {
                let free = (content_h - layout.text_height).max(0.0);
                if align == VerticalAlign::Middle {
                    (free / 2.0).trunc()
                } else {
                    free
                }
            }
        };

        let entities: Vec<(usize, usize)> = elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_entity())
            .map(|(i, e)| (e.char_index, i))
            .collect();
        let mut entity_updates: Vec<(usize, Point2D<f32>, bool)> = Vec::new();

        let mut batch = Batch::default();
        batch.positions.reserve(text.len() + 1);
        // (index, drawn)
        let mut ellipsis = layout.ellipsis_char_index.map(|e| (e, false));
        let mut posx = GUTTER_X;

        for (line_index, line) in layout.lines.iter().enumerate() {
            let line_clipped = clipping && line_index != 0 && line.y + line.height > content_h;
            let line_format = format_at(elements, line.char_index, self.base);
            let indent = match line_format.align {
                HorizontalAlign::Left => 0.0,
                HorizontalAlign::Center => ((rect_width - line.width) / 2.0).trunc(),
                HorizontalAlign::Right => rect_width - line.width,
            }
            .max(0.0);
            posx = if rtl {
                (GUTTER_X + indent + line.width).min(GUTTER_X + rect_width) - line.width
            } else {
                GUTTER_X + indent
            };
            let baseline_y = y_offset + line.y + line.baseline;

            let span = line.char_index.min(text.len())..line.end().min(text.len());
            let order: Vec<usize> = if layout.bidi {
                bidi::visual_order(&text[span.clone()], layout.direction)
                    .into_iter()
                    .map(|i| i + span.start)
                    .collect()
            } else {
                span.clone().collect()
            };

            // place left to right in visual order
            let mut placements = vec![Placement::default(); span.len()];
            let mut advanced = false;
            for (visual_index, &ci) in order.iter().enumerate() {
                let width = match entities.binary_search_by_key(&ci, |&(c, _)| c) {
                    Ok(pos) => Some(elements[entities[pos].1].size.width + 2.0),
                    Err(_) => {
                        let format = format_at(elements, ci, self.base);
                        self.measure(text[ci], format, scale)
                    }
                };
                let placement = &mut placements[ci - span.start];
                placement.visual_index = visual_index;
                let Some(width) = width else {
                    placement.x = posx;
                    continue;
                };
                if width != 0.0 {
                    if advanced {
                        posx += letter_spacing;
                    }
                    advanced = true;
                }
                *placement = Placement {
                    x: posx,
                    width,
                    visual_index,
                    measured: true,
                };
                posx += width;
            }

            // emit in logical order so vertex ranges follow the char positions
            let mut decorations = Decorations::default();
            for ci in span.clone() {
                let placement = placements[ci - span.start];
                let ch = text[ci];
                let format = format_at(elements, ci, self.base);
                let x = placement.x;
                let mut cp = CharPosition {
                    char_index: ci,
                    line_index,
                    offset_x: x,
                    width: placement.width,
                    ..Default::default()
                };

                if let Some((e, drawn)) = ellipsis.as_mut()
                    && ci >= *e
                {
                    cp.width = 0.0;
                    // objects past the truncation point stay hidden
                    if let Ok(pos) = entities.binary_search_by_key(&ci, |&(c, _)| c) {
                        let element_index = entities[pos].1;
                        let size = elements[element_index].size;
                        let position =
                            Point2D::new(x + 1.0, baseline_y - size.height * IMAGE_BASELINE);
                        entity_updates.push((element_index, position, true));
                        cp.image_index = element_index + 1;
                    }
                    if !*drawn && !line_clipped {
                        *drawn = true;
                        decorations.flush(&mut batch);
                        let (vertices, width) =
                            self.draw_ellipsis(&mut batch, format, x, baseline_y, scale);
                        cp.vertex_count = vertices;
                        cp.width = width;
                    }
                    batch.positions.push(cp);
                    continue;
                }

                if let Ok(pos) = entities.binary_search_by_key(&ci, |&(c, _)| c) {
                    let element_index = entities[pos].1;
                    let size = elements[element_index].size;
                    decorations.flush(&mut batch);

                    let image_x = x + 1.0;
                    let image_y = baseline_y - size.height * IMAGE_BASELINE;
                    let clipped = line_clipped
                        || (clipping
                            && (image_x < GUTTER_X
                                || (image_x > GUTTER_X
                                    && image_x + size.width > content_w - GUTTER_X)));
                    entity_updates.push((element_index, Point2D::new(image_x, image_y), clipped));

                    cp.image_index = element_index + 1;
                    batch.positions.push(cp);
                    continue;
                }

                if !placement.measured {
                    batch.positions.push(cp);
                    continue;
                }

                let width = placement.width;
                let glyph_clipped = line_clipped
                    || (clipping
                        && if rtl {
                            x < GUTTER_X - 0.5
                        } else {
                            (rect_width < 7.0 || placement.visual_index != 0)
                                && x + width > content_w - GUTTER_X + 0.5
                        });
                if glyph_clipped || batch.truncated {
                    decorations.flush(&mut batch);
                    batch.positions.push(cp);
                    continue;
                }

                let shared = self.source(&format.font);
                let mut source = shared.lock();
                decorations.update(
                    &mut batch,
                    format,
                    x,
                    width,
                    baseline_y,
                    scale,
                    source.solid_uv(),
                );

                let draw_ch = if ch == '\t' { ' ' } else { ch };
                if let Some(quad) = source.glyph_quad(draw_ch, format, scale) {
                    let faux_bold = format.bold && !source.has_native_bold();
                    let copies = if faux_bold { BOLD_OFFSET.len() } else { 1 };
                    if batch.reserve(copies * 4) {
                        let origin = Point2D::new(x, baseline_y + format.baseline_shift(scale));
                        cp.vertex_count = draw_glyph(&mut batch.mesh, &quad, origin, format, faux_bold);
                    }
                }
                batch.positions.push(cp);
            }

            decorations.flush(&mut batch);

            if line.terminated {
                batch.positions.push(CharPosition {
                    char_index: line.end(),
                    line_index,
                    offset_x: posx,
                    ..Default::default()
                });
            }

            // the ellipsis lands past the last visible character of this line
            if let Some((e, drawn)) = ellipsis.as_mut()
                && !*drawn
                && !line_clipped
                && (line.char_index..=line.span_end()).contains(e)
                && !batch.positions.is_empty()
            {
                *drawn = true;
                let format = format_at(elements, line.char_index, self.base);
                let (vertices, _) = self.draw_ellipsis(&mut batch, format, posx, baseline_y, scale);
                batch.credit_last(vertices);
            }
        }

        batch.positions.push(CharPosition {
            char_index: text.len(),
            line_index: layout.lines.len().saturating_sub(1),
            offset_x: posx,
            ..Default::default()
        });

        for &(element_index, position, clipped) in &entity_updates {
            let element = &mut elements[element_index];
            element.position = position;
            element.status.set(ElementStatus::CLIPPED, clipped);
        }

        let main_vertex_count = batch.mesh.vertex_count();
        let mut mesh = self.expand_layers(batch.mesh);
        mesh.build_quad_triangles();

        let link_areas = link_areas(elements, &batch.positions, layout, y_offset, text.len());

        log::trace!(
            "Composed {} vertices for {} characters.",
            mesh.vertex_count(),
            text.len()
        );

        ComposedText {
            mesh,
            char_positions: batch.positions,
            link_areas,
            y_offset,
            main_vertex_count,
            truncated: batch.truncated,
        }
    }

    /// Advance of one character, `None` when it draws nothing.
    fn measure(&mut self, ch: char, format: &TextFormat, scale: f32) -> Option<f32> {
        if ch == '\n' || ch == ENTITY_PLACEHOLDER {
            return None;
        }
        let source = self.source(&format.font);
        let metrics = source
            .lock()
            .get_glyph(if ch == '\t' { ' ' } else { ch }, format, scale)?;
        Some(if ch == '\t' {
            metrics.width * 4.0
        } else {
            metrics.width
        })
    }

    fn draw_ellipsis(
        &mut self,
        batch: &mut Batch,
        format: &TextFormat,
        x: f32,
        baseline_y: f32,
        scale: f32,
    ) -> (usize, f32) {
        let shared = self.source(&format.font);
        let mut source = shared.lock();
        let Some(metrics) = source.get_glyph(ELLIPSIS, format, scale) else {
            return (0, 0.0);
        };
        let Some(quad) = source.glyph_quad(ELLIPSIS, format, scale) else {
            return (0, metrics.width);
        };
        if !batch.reserve(4) {
            return (0, metrics.width);
        }
        let origin = Point2D::new(x, baseline_y + format.baseline_shift(scale));
        let vertices = draw_glyph(&mut batch.mesh, &quad, origin, format, false);
        (vertices, metrics.width)
    }

    /// Prepends the shadow and outline layers: `[shadow][outline..][main]`.
    fn expand_layers(&self, main: MeshData) -> MeshData {
        let dirs = match (self.base.has_outline(), self.enhanced_outline) {
            (false, _) => 0,
            (true, false) => 4,
            (true, true) => 8,
        };
        let shadow = self.base.has_shadow();
        let layers = 1 + dirs + shadow as usize;
        let count = main.vertex_count();
        if layers == 1 || count == 0 {
            return main;
        }
        if count * layers > MAX_VERTICES {
            log::warn!(
                "Skipping outline and shadow: {} vertices in {} layers exceed the limit.",
                count,
                layers
            );
            return main;
        }

        let mut out = MeshData {
            vertices: Vec::with_capacity(count * layers),
            uvs: Vec::with_capacity(count * layers),
            colors: Vec::with_capacity(count * layers),
            triangles: Vec::new(),
        };
        let mut copy_layer = |offset: Vector2D<f32>, color: Color32| {
            out.vertices.extend(main.vertices.iter().map(|v| *v + offset));
            out.uvs.extend_from_slice(&main.uvs);
            out.colors.extend(main.colors.iter().map(|c| Color32 {
                a: ((color.a as u16 * c.a as u16) / 255) as u8,
                ..color
            }));
        };

        if shadow {
            copy_layer(self.base.shadow_offset, self.base.shadow_color);
        }
        for d in 0..dirs {
            let offset = Vector2D::new(STROKE_OFFSET[d * 2], STROKE_OFFSET[d * 2 + 1]) * self.base.outline;
            copy_layer(offset, self.base.outline_color);
        }
        out.vertices.extend_from_slice(&main.vertices);
        out.uvs.extend_from_slice(&main.uvs);
        out.colors.extend_from_slice(&main.colors);
        out
    }
}

fn draw_glyph(
    mesh: &mut MeshData,
    quad: &GlyphQuad,
    origin: Point2D<f32>,
    format: &TextFormat,
    faux_bold: bool,
) -> usize {
    let colors = format.gradient.unwrap_or([format.color; 4]);
    let rect = quad.rect.translate(origin.to_vector());
    let offsets: &[Vector2D<f32>] = if faux_bold { &BOLD_OFFSET } else { &NO_OFFSET };

    for offset in offsets {
        mesh.add_quad(rect.translate(*offset), quad.uv, colors);
    }
    let vertices = offsets.len() * 4;
    if format.italic {
        mesh.skew_last(vertices, origin.y, ITALIC_SHEAR);
    }
    vertices
}

/// Per-line bounding boxes of the characters between each link and its end.
fn link_areas(
    elements: &[MarkupElement],
    positions: &[CharPosition],
    layout: &LineLayout,
    y_offset: f32,
    text_len: usize,
) -> Vec<LinkArea> {
    let mut areas = Vec::new();
    for (i, element) in elements.iter().enumerate() {
        if element.kind != ElementKind::Link {
            continue;
        }
        let start = element.char_index;
        let end = elements[i + 1..]
            .iter()
            .find(|e| e.kind == ElementKind::LinkEnd)
            .map_or(text_len, |e| e.char_index);

        let mut rects: Vec<(usize, Box2D<f32>)> = Vec::new();
        for cp in positions {
            if cp.char_index < start || cp.char_index >= end || cp.width <= 0.0 {
                continue;
            }
            let Some(line) = layout.lines.get(cp.line_index) else {
                continue;
            };
            let rect = Box2D::new(
                Point2D::new(cp.offset_x, y_offset + line.y),
                Point2D::new(cp.offset_x + cp.width, y_offset + line.y + line.height),
            );
            match rects.last_mut() {
                Some((line_index, area)) if *line_index == cp.line_index => *area = area.union(&rect),
                _ => rects.push((cp.line_index, rect)),
            }
        }

        areas.push(LinkArea {
            element_index: i,
            rects: rects.into_iter().map(|(_, r)| r).collect(),
        });
    }
    areas
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::text::{
        ParsedText,
        inline_object::AttributeSizer,
        layout::LineBreaker,
        markup::{self, MarkupMode, ParseOptions},
    };

    fn compose_with(parsed: &mut ParsedText, format: &TextFormat, config: &LayoutConfig) -> (LineLayout, ComposedText) {
        let registry = testing::registry();
        let layout = LineBreaker::new(&registry, format, config).layout(
            &parsed.text,
            &mut parsed.elements,
            &mut AttributeSizer,
        );
        let composed =
            MeshComposer::new(&registry, format, config).compose(&parsed.text, &mut parsed.elements, &layout);
        (layout, composed)
    }

    fn plain(text: &str) -> ParsedText {
        markup::parse(text, MarkupMode::Plain, &TextFormat::default(), &ParseOptions::default())
    }

    fn html(text: &str) -> ParsedText {
        markup::parse(text, MarkupMode::Html, &TextFormat::default(), &ParseOptions::default())
    }

    fn wide() -> LayoutConfig {
        LayoutConfig {
            width: 1000.0,
            height: 100.0,
            ..Default::default()
        }
    }

    fn assert_consistent(composed: &ComposedText) {
        let credited: usize = composed.char_positions.iter().map(|cp| cp.vertex_count).sum();
        assert_eq!(credited, composed.main_vertex_count);
        assert_eq!(composed.mesh.triangles.len(), composed.mesh.vertex_count() / 4 * 6);
    }

    #[test]
    fn one_quad_per_visible_char() {
        let mut parsed = plain("Hello");
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        assert_eq!(composed.mesh.vertex_count(), 20);
        assert_eq!(composed.char_positions.len(), 6);
        assert_eq!(composed.char_positions[5].char_index, 5);
        assert_eq!(composed.char_positions[0].offset_x, GUTTER_X);
        assert_eq!(composed.char_positions[1].offset_x, GUTTER_X + 6.0);
        assert_eq!(&composed.mesh.triangles[..6], &[0, 1, 2, 2, 3, 0]);
        assert_consistent(&composed);
    }

    #[test]
    fn quads_are_bottom_left_first() {
        let mut parsed = plain("x");
        let (layout, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        let line = layout.lines[0];
        let v = &composed.mesh.vertices;
        assert_eq!(v[0], Point2D::new(GUTTER_X, line.y + 12.0));
        assert_eq!(v[1], Point2D::new(GUTTER_X, line.y));
        assert_eq!(v[2], Point2D::new(GUTTER_X + 6.0, line.y));
    }

    #[test]
    fn whitespace_and_newlines_have_no_vertices() {
        let mut parsed = plain("a b\nc");
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        assert_eq!(composed.main_vertex_count, 12);
        assert_eq!(composed.char_positions.len(), 6);
        let newline = composed.char_positions.iter().find(|cp| cp.char_index == 3).unwrap();
        assert_eq!(newline.vertex_count, 0);
        assert_eq!(newline.line_index, 0);
        assert_consistent(&composed);
    }

    #[test]
    fn outline_and_shadow_repeat_the_main_layer() {
        let mut parsed = plain("ab");
        let format = TextFormat {
            outline: 1.0,
            outline_color: Color32::WHITE,
            ..Default::default()
        };
        let (_, composed) = compose_with(&mut parsed, &format, &wide());
        assert_eq!(composed.mesh.vertex_count(), 8 * 5);
        // main layer comes last
        assert_eq!(composed.mesh.colors[8 * 4], Color32::BLACK);
        assert_eq!(composed.mesh.colors[0], Color32::WHITE);

        let format = TextFormat {
            shadow_offset: Vector2D::new(1.0, 1.0),
            ..format
        };
        let mut parsed = plain("ab");
        let (_, composed) = compose_with(&mut parsed, &format, &wide());
        assert_eq!(composed.mesh.vertex_count(), 8 * 6);
        assert_eq!(composed.main_vertex_count, 8);
    }

    #[test]
    fn underline_is_one_run_per_line() {
        let mut parsed = html("<u>ab</u>c");
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        assert_eq!(composed.main_vertex_count, 4 * 4);
        assert_eq!(composed.char_positions[1].vertex_count, 8);
        assert_consistent(&composed);
    }

    #[test]
    fn faux_bold_draws_four_copies() {
        let mut parsed = html("<b>a</b>");
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        assert_eq!(composed.main_vertex_count, 16);
    }

    #[test]
    fn clipped_glyphs_keep_positions() {
        let mut parsed = plain("abcdef");
        let config = LayoutConfig {
            width: 20.0,
            height: 20.0,
            ..Default::default()
        };
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &config);
        assert_eq!(composed.char_positions.len(), 7);
        assert!(composed.char_positions[0].vertex_count > 0);
        assert_eq!(composed.char_positions[5].vertex_count, 0);
        assert_consistent(&composed);
    }

    #[test]
    fn center_alignment_indents_lines() {
        let mut parsed = plain("ab");
        let format = TextFormat {
            align: HorizontalAlign::Center,
            ..Default::default()
        };
        let config = LayoutConfig {
            width: 104.0,
            ..Default::default()
        };
        let (_, composed) = compose_with(&mut parsed, &format, &config);
        assert_eq!(composed.char_positions[0].offset_x, GUTTER_X + 44.0);
    }

    #[test]
    fn vertical_middle_offsets_everything() {
        let mut parsed = plain("a");
        let format = TextFormat {
            vertical_align: VerticalAlign::Middle,
            ..Default::default()
        };
        let (layout, composed) = compose_with(&mut parsed, &format, &wide());
        assert_eq!(composed.y_offset, ((100.0 - layout.text_height) / 2.0).trunc());
    }

    #[test]
    fn ellipsis_replaces_the_tail() {
        let mut parsed = plain("Hello world");
        let config = LayoutConfig {
            width: 34.0,
            auto_size: AutoSize::Ellipsis,
            ..Default::default()
        };
        let (layout, composed) = compose_with(&mut parsed, &TextFormat::default(), &config);
        assert_eq!(layout.ellipsis_char_index, Some(4));
        assert_eq!(composed.main_vertex_count, 5 * 4);
        assert_eq!(composed.char_positions[4].vertex_count, 4);
        assert!(composed.char_positions[5..].iter().all(|cp| cp.vertex_count == 0));
        assert_consistent(&composed);
    }

    #[test]
    fn images_are_positioned_on_the_baseline() {
        let mut parsed = html("<img src='a' width='10' height='10'/>x");
        let (layout, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        let image = parsed.elements.iter().position(|e| e.kind == ElementKind::Image).unwrap();
        let element = &parsed.elements[image];
        let line = layout.lines[0];
        assert_eq!(element.position.x, GUTTER_X + 1.0);
        assert_eq!(element.position.y, line.y + line.baseline - 8.0);
        assert!(!element.status.contains(ElementStatus::CLIPPED));
        assert_eq!(composed.char_positions[0].image_index, image + 1);
        assert_eq!(composed.char_positions[1].offset_x, GUTTER_X + 12.0);
    }

    #[test]
    fn link_areas_cover_link_text() {
        let mut parsed = html("x<a href='go'>ab</a>");
        let (layout, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        assert_eq!(composed.link_areas.len(), 1);
        let area = &composed.link_areas[0];
        assert_eq!(area.rects.len(), 1);
        assert_eq!(area.rects[0].min.x, GUTTER_X + 6.0);
        assert_eq!(area.rects[0].max.x, GUTTER_X + 18.0);

        let inside = Point2D::new(GUTTER_X + 10.0, layout.lines[0].y + 1.0);
        assert_eq!(composed.link_at(inside), Some(area.element_index));
        assert_eq!(composed.link_at(Point2D::new(GUTTER_X + 1.0, 5.0)), None);
    }

    #[test]
    fn right_to_left_line_runs_backwards() {
        let mut parsed = plain("אבג");
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &wide());
        let x_of = |i: usize| {
            composed
                .char_positions
                .iter()
                .find(|cp| cp.char_index == i)
                .unwrap()
                .offset_x
        };
        assert!(x_of(0) > x_of(1));
        assert!(x_of(1) > x_of(2));
    }

    #[test]
    fn huge_text_is_truncated_at_the_vertex_limit() {
        let text: String = "x".repeat(17000);
        let mut parsed = plain(&text);
        let config = LayoutConfig {
            auto_size: AutoSize::Both,
            ..Default::default()
        };
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &config);
        assert!(composed.truncated);
        assert_eq!(composed.mesh.vertex_count(), MAX_VERTICES);
        assert_eq!(composed.char_positions.len(), 17001);
        assert_consistent(&composed);
    }

    #[test]
    fn bold_glyphs_are_dropped_whole_at_the_limit() {
        let text = format!("<b>{}</b>", "x".repeat(5000));
        let mut parsed = html(&text);
        let config = LayoutConfig {
            auto_size: AutoSize::Both,
            ..Default::default()
        };
        let (_, composed) = compose_with(&mut parsed, &TextFormat::default(), &config);
        assert!(composed.truncated);
        assert_eq!(composed.mesh.vertex_count(), MAX_VERTICES / 16 * 16);
        assert!(composed.char_positions.iter().all(|cp| cp.vertex_count % 16 == 0));
        assert_consistent(&composed);
    }

    #[test]
    fn oversized_layers_keep_the_main_glyphs() {
        let text: String = "x".repeat(7000);
        let mut parsed = plain(&text);
        let format = TextFormat {
            outline: 1.0,
            outline_color: Color32::WHITE,
            ..Default::default()
        };
        let config = LayoutConfig {
            auto_size: AutoSize::Both,
            ..Default::default()
        };
        let (_, composed) = compose_with(&mut parsed, &format, &config);
        assert!(!composed.truncated);
        assert_eq!(composed.main_vertex_count, 7000 * 4);
        assert_eq!(composed.mesh.vertex_count(), composed.main_vertex_count);
        assert!(composed.mesh.colors.iter().all(|c| *c == Color32::BLACK));
        assert!(composed.char_positions[..7000].iter().all(|cp| cp.vertex_count == 4));
        assert_consistent(&composed);
    }

    #[test]
    fn images_past_the_ellipsis_are_clipped() {
        let mut parsed = html("abcdefghijkl<img src='a' width='8' height='8'/>");
        let config = LayoutConfig {
            width: 40.0,
            auto_size: AutoSize::Ellipsis,
            ..Default::default()
        };
        let (layout, composed) = compose_with(&mut parsed, &TextFormat::default(), &config);
        let ellipsis = layout.ellipsis_char_index.unwrap();
        assert!(ellipsis < 12);

        let image = parsed.elements.iter().position(|e| e.kind == ElementKind::Image).unwrap();
        let element = &parsed.elements[image];
        assert!(element.status.contains(ElementStatus::CLIPPED));
        assert!(element.position.x > GUTTER_X);
        let cp = composed.char_positions.iter().find(|cp| cp.char_index == 12).unwrap();
        assert_eq!(cp.image_index, image + 1);
        assert_eq!(cp.vertex_count, 0);
        assert_consistent(&composed);
    }
}
