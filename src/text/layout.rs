use std::sync::Arc;

use euclid::default::Size2D;

use crate::{
    font_registry::FontRegistry,
    glyph_source::SharedGlyphSource,
    text::{
        AutoSize, ElementKind, MarkupElement, TextFormat,
        bidi::{self, TextDirection},
        markup::ENTITY_PLACEHOLDER,
    },
};

/// Horizontal padding between the content rect and the text.
pub const GUTTER_X: f32 = 2.0;
/// Vertical padding between the content rect and the text.
pub const GUTTER_Y: f32 = 2.0;
/// Fraction of an inline object's height that sits above the baseline.
pub const IMAGE_BASELINE: f32 = 0.8;
/// Character slots given up for the ellipsis glyph.
pub const ELLIPSIS_RESERVE: usize = 2;
/// Words this long are broken instead of moved to the next line.
const MAX_MOVABLE_WORD: usize = 20;

/// Geometry constraints for a layout pass.
///
/// `width`/`height` describe the content rect. With [`AutoSize::Both`] or
/// [`AutoSize::Height`] the rect is resized after layout and the result is
/// reported in [`LineLayout::width`]/[`LineLayout::height`].
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    /// Forces wrapping at this width regardless of `word_wrap`.
    pub max_width: Option<f32>,
    pub word_wrap: bool,
    /// Newlines are rendered as ordinary characters and nothing wraps.
    pub single_line: bool,
    pub auto_size: AutoSize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 20.0,
            max_width: None,
            word_wrap: false,
            single_line: false,
            auto_size: AutoSize::None,
        }
    }
}

impl LayoutConfig {
    pub fn wraps(&self) -> bool {
        self.max_width.is_some()
            || (self.word_wrap && !self.single_line && self.auto_size != AutoSize::Both)
    }
}

/// One visual row.
///
/// `char_count` never includes the `\n` that ended the line; `terminated`
/// records that one follows, so `[char_index, char_index + char_count +
/// terminated)` tiles the plain text.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Line {
    pub char_index: usize,
    pub char_count: usize,
    pub width: f32,
    pub height: f32,
    /// Distance from the top of the line to its baseline.
    pub baseline: f32,
    pub y: f32,
    pub terminated: bool,
}

impl Line {
    pub fn end(&self) -> usize {
        self.char_index + self.char_count
    }

    /// End including the hard break, if any.
    pub fn span_end(&self) -> usize {
        self.end() + self.terminated as usize
    }
}

/// Glyph sources used by a pass with the versions they had.
#[derive(Clone, Default)]
struct FontStamps(Vec<(SharedGlyphSource, u64)>);

impl std::fmt::Debug for FontStamps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(_, version)| version))
            .finish()
    }
}

/// Result of [`LineBreaker::layout`].
#[derive(Clone, Debug, Default)]
pub struct LineLayout {
    pub lines: Vec<Line>,
    pub text_width: f32,
    pub text_height: f32,
    /// First character replaced by the ellipsis glyph.
    pub ellipsis_char_index: Option<usize>,
    /// Scale applied by shrink-to-fit, `1.0` otherwise.
    pub font_size_scale: f32,
    pub direction: TextDirection,
    /// The text contains right-to-left characters and needs reordering.
    pub bidi: bool,
    /// Content rect width after auto-size.
    pub width: f32,
    /// Content rect height after auto-size.
    pub height: f32,
    stamps: FontStamps,
}

impl LineLayout {
    /// Whether a glyph source was rebuilt since this layout was measured.
    pub fn is_stale(&self) -> bool {
        self.stamps
            .0
            .iter()
            .any(|(source, version)| source.lock().version() != *version)
    }

    /// Records the current source versions, after a mesh was rebuilt
    /// against a rebuilt atlas.
    pub fn refresh_stamps(&mut self) {
        for (source, version) in &mut self.stamps.0 {
            *version = source.lock().version();
        }
    }

    /// Index of the line that contains `char_index`.
    pub fn line_of(&self, char_index: usize) -> usize {
        self.lines
            .partition_point(|line| line.span_end() <= char_index)
            .min(self.lines.len().saturating_sub(1))
    }
}

/// Supplies the size of the inline object behind an entity element.
pub trait EntitySizer {
    /// `owner_width` is the width of the content rect.
    fn entity_size(&mut self, element: &mut MarkupElement, owner_width: f32) -> Size2D<f32>;
}

#[derive(Clone, Copy, Debug, Default)]
struct CharInfo {
    width: f32,
    height: f32,
    baseline: f32,
}

struct LinePass {
    lines: Vec<Line>,
    text_width: f32,
    text_height: f32,
    ellipsis: Option<usize>,
}

impl LinePass {
    fn fits(&self, width: f32, height: f32) -> bool {
        self.text_width <= width && self.text_height <= height
    }
}

/// Resolves font names once per layout and remembers source versions.
struct FontCache<'a> {
    registry: &'a FontRegistry,
    entries: Vec<(String, SharedGlyphSource)>,
}

impl FontCache<'_> {
    fn source(&mut self, name: &str) -> SharedGlyphSource {
        if let Some((_, source)) = self.entries.iter().find(|(n, _)| n == name) {
            return Arc::clone(source);
        }
        let source = self.registry.get_font(name);
        self.entries.push((name.to_string(), Arc::clone(&source)));
        source
    }

    fn stamps(&self) -> FontStamps {
        let mut stamps: Vec<(SharedGlyphSource, u64)> = Vec::new();
        for (_, source) in &self.entries {
            if !stamps.iter().any(|(s, _)| Arc::ptr_eq(s, source)) {
                let version = source.lock().version();
                stamps.push((Arc::clone(source), version));
            }
        }
        FontStamps(stamps)
    }
}

/// Splits plain text into lines.
///
/// ```rust,no_run
/// use glyphweave::{FontRegistry, text::{LayoutConfig, LineBreaker, TextFormat}};
/// use glyphweave::text::inline_object::AttributeSizer;
///
/// let registry = FontRegistry::new();
/// let format = TextFormat::default();
/// let config = LayoutConfig { width: 200.0, word_wrap: true, ..Default::default() };
/// let text: Vec<char> = "Hello world".chars().collect();
/// let layout = LineBreaker::new(&registry, &format, &config)
///     .layout(&text, &mut [], &mut AttributeSizer);
/// assert_eq!(layout.lines.len(), 1);
/// ```
pub struct LineBreaker<'a> {
    fonts: FontCache<'a>,
    base: &'a TextFormat,
    config: &'a LayoutConfig,
}

impl<'a> LineBreaker<'a> {
    pub fn new(registry: &'a FontRegistry, base: &'a TextFormat, config: &'a LayoutConfig) -> Self {
        Self {
            fonts: FontCache {
                registry,
                entries: Vec::new(),
            },
            base,
            config,
        }
    }

    /// Lays out `text`. Entity elements get their `space` updated and are
    /// sized through `sizer`.
    pub fn layout(
        mut self,
        text: &[char],
        elements: &mut [MarkupElement],
        sizer: &mut dyn EntitySizer,
    ) -> LineLayout {
        self.prepare(text, elements);

        let bidi = bidi::needs_bidi(text);
        let direction = bidi::detect_direction(text);

        let mut scale = 1.0;
        let mut pass = self.build_lines(text, elements, sizer, scale, bidi);
        if self.config.auto_size == AutoSize::Shrink {
            (pass, scale) = self.shrink(text, elements, sizer, pass, bidi);
        }

        let (width, height) = match self.config.auto_size {
            AutoSize::Both => {
                let width = match self.config.max_width {
                    Some(max) => pass.text_width.min(max),
                    None => pass.text_width,
                };
                (width, pass.text_height)
            }
            AutoSize::Height => (self.config.width, pass.text_height),
            _ => (self.config.width, self.config.height),
        };

        log::debug!(
            "Layout: {} chars in {} lines, {}x{} at scale {}.",
            text.len(),
            pass.lines.len(),
            pass.text_width,
            pass.text_height,
            scale
        );

        LineLayout {
            lines: pass.lines,
            text_width: pass.text_width,
            text_height: pass.text_height,
            ellipsis_char_index: pass.ellipsis,
            font_size_scale: scale,
            direction,
            bidi,
            width,
            height,
            stamps: self.fonts.stamps(),
        }
    }

    /// Gives every source a chance to rasterize its run before measuring.
    fn prepare(&mut self, text: &[char], elements: &[MarkupElement]) {
        let mut runs: Vec<(usize, &TextFormat)> = vec![(0, self.base)];
        runs.extend(
            elements
                .iter()
                .filter(|e| e.kind == ElementKind::Text)
                .map(|e| (e.char_index, &e.format)),
        );

        for (i, &(start, format)) in runs.iter().enumerate() {
            let end = runs.get(i + 1).map_or(text.len(), |&(next, _)| next);
            let Some(chars) = text.get(start.min(end)..end) else {
                continue;
            };
            if chars.is_empty() {
                continue;
            }
            let run: String = chars.iter().collect();
            self.fonts
                .source(&format.font)
                .lock()
                .prepare_characters(&run, format, 1.0);
        }
    }

    fn shrink(
        &mut self,
        text: &[char],
        elements: &mut [MarkupElement],
        sizer: &mut dyn EntitySizer,
        pass: LinePass,
        bidi: bool,
    ) -> (LinePass, f32) {
        let (width, height) = (self.config.width, self.config.height);
        let base_size = self.base.size.max(1);

        // vertical overflow needs a full search; width alone scales by ratio
        if pass.text_height > height {
            let (mut lo, mut hi) = (1, base_size - 1);
            if hi < lo {
                return (pass, 1.0);
            }
            while lo < hi {
                let mid = lo + (hi - lo).div_ceil(2);
                let scale = mid as f32 / base_size as f32;
                let candidate = self.build_lines(text, elements, sizer, scale, bidi);
                log::trace!(
                    "Shrink: size {} gives {}x{}.",
                    mid,
                    candidate.text_width,
                    candidate.text_height
                );
                if candidate.fits(width, height) {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            let scale = lo as f32 / base_size as f32;
            (self.build_lines(text, elements, sizer, scale, bidi), scale)
        } else if pass.text_width > width && pass.text_width > 0.0 {
            let mut scale = width / pass.text_width;
            let mut result = self.build_lines(text, elements, sizer, scale, bidi);
            let mut size = self.base.scaled_size(scale) as u32;
            while result.text_width > width && size > 1 {
                size -= 1;
                scale = size as f32 / base_size as f32;
                log::trace!("Shrink: still {} wide, trying size {}.", result.text_width, size);
                result = self.build_lines(text, elements, sizer, scale, bidi);
            }
            (result, scale)
        } else {
            (pass, 1.0)
        }
    }

    fn build_lines(
        &mut self,
        text: &[char],
        elements: &mut [MarkupElement],
        sizer: &mut dyn EntitySizer,
        scale: f32,
        bidi: bool,
    ) -> LinePass {
        let config = self.config;
        let letter_spacing = self.base.letter_spacing * scale;
        let line_spacing = (self.base.line_spacing - 1.0) * scale;
        let empty_height = self.base.scaled_size(scale);
        let wrap = config.wraps();
        let rect_width = config.max_width.unwrap_or(config.width) - GUTTER_X * 2.0;
        let rect_height = config.height;
        let check_edge = config.auto_size == AutoSize::Ellipsis;

        let mut lines = vec![Line {
            y: GUTTER_Y,
            ..Default::default()
        }];
        let mut chars: Vec<CharInfo> = Vec::new();
        let mut text_width: f32 = 0.0;
        let mut ellipsis: Option<usize> = None;
        let mut word_possible = false;
        let mut word_len = 0usize;
        let mut posx = 0.0;

        let mut format = self.base.clone();
        let mut source = self.fonts.source(&format.font);
        let mut next_element = 0;

        for (char_index, &ch) in text.iter().enumerate() {
            let mut glyph = CharInfo::default();
            let mut entity = false;

            while let Some(element) = elements
                .get_mut(next_element)
                .filter(|e| e.char_index <= char_index)
            {
                if element.kind == ElementKind::Text {
                    format = element.format.clone();
                    source = self.fonts.source(&format.font);
                } else if element.is_entity() {
                    element.space = (rect_width - posx - 4.0).floor();
                    let size = sizer.entity_size(element, config.width);
                    element.size = size;
                    glyph = CharInfo {
                        width: size.width + 2.0,
                        height: size.height,
                        baseline: size.height * IMAGE_BASELINE,
                    };
                    entity = true;
                }
                next_element += 1;
            }

            if entity || ch == '\n' || ch == ENTITY_PLACEHOLDER {
                word_possible = false;
            } else if let Some(metrics) = source
                .lock()
                .get_glyph(if ch == '\t' { ' ' } else { ch }, &format, scale)
            {
                glyph = CharInfo {
                    width: if ch == '\t' {
                        metrics.width * 4.0
                    } else {
                        metrics.width
                    },
                    height: metrics.height,
                    baseline: metrics.baseline - format.baseline_shift(scale),
                };

                if word_possible {
                    if ch.is_whitespace() {
                        word_len = 0;
                    } else if is_word_char(ch, &format, bidi) {
                        word_len += 1;
                    } else {
                        word_possible = false;
                    }
                } else if ch.is_whitespace() {
                    word_len = 0;
                    word_possible = true;
                } else if format.is_special() {
                    // keep a raised or lowered run attached to what precedes it
                    if !chars.is_empty() {
                        word_len = 2;
                        word_possible = true;
                    }
                } else {
                    word_possible = false;
                }
            } else {
                word_possible = false;
            }

            chars.push(glyph);
            if glyph.width != 0.0 {
                if posx != 0.0 {
                    posx += letter_spacing;
                }
                posx += glyph.width;
            }

            if ch == '\n' && !config.single_line {
                let body = chars.len() - 1;
                text_width =
                    text_width.max(update_line(&mut lines, &chars[..body], letter_spacing, empty_height));
                let line = start_next_line(&mut lines, line_spacing, 1);

                if check_edge && ellipsis.is_none() && next_line_overflows(&lines, rect_height) {
                    ellipsis = Some(line.char_index + line.char_count.saturating_sub(ELLIPSIS_RESERVE));
                }
                chars.clear();
                word_possible = false;
                posx = 0.0;
            } else if posx > rect_width {
                let line_start = lines.last().map_or(0, |l| l.char_index);
                if wrap {
                    let count = chars.len();
                    let to_move;
                    if word_possible && word_len < MAX_MOVABLE_WORD && count > 2 && word_len < count {
                        to_move = word_len;
                        // measure without the space before the word, but keep it on this line
                        let measured = count - to_move - 1;
                        text_width = text_width.max(update_line(
                            &mut lines,
                            &chars[..measured],
                            letter_spacing,
                            empty_height,
                        ));
                        if let Some(line) = lines.last_mut() {
                            line.char_count += 1;
                        }
                    } else {
                        to_move = usize::from(count > 1);
                        text_width = text_width.max(update_line(
                            &mut lines,
                            &chars[..count - to_move],
                            letter_spacing,
                            empty_height,
                        ));
                    }

                    let line = start_next_line(&mut lines, line_spacing, 0);
                    posx = 0.0;
                    if to_move != 0 {
                        let keep = line.char_count.min(chars.len());
                        for ci in &chars[keep..] {
                            if ci.width != 0.0 {
                                if posx != 0.0 {
                                    posx += letter_spacing;
                                }
                                posx += ci.width;
                            }
                        }
                        chars.drain(..keep);
                    } else {
                        chars.clear();
                    }

                    if check_edge && ellipsis.is_none() && next_line_overflows(&lines, rect_height) {
                        ellipsis =
                            Some(line.char_index + line.char_count.saturating_sub(ELLIPSIS_RESERVE));
                    }
                } else if check_edge && ellipsis.is_none() {
                    ellipsis = Some(line_start + chars.len().saturating_sub(ELLIPSIS_RESERVE));
                }
            }
        }

        text_width = text_width.max(update_line(&mut lines, &chars, letter_spacing, empty_height));
        if text_width > 0.0 {
            text_width += GUTTER_X * 2.0;
        }
        let text_height = lines
            .last()
            .map_or(GUTTER_Y, |line| line.y + line.height + GUTTER_Y);

        if check_edge && text_width <= config.width && text_height <= config.height + GUTTER_Y {
            ellipsis = None;
        }

        LinePass {
            lines,
            text_width: text_width.round(),
            text_height: text_height.round(),
            ellipsis,
        }
    }
}

fn is_word_char(ch: char, format: &TextFormat, bidi: bool) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '.' | '"' | '\'')
        || format.is_special()
        || (bidi && ch.is_alphabetic())
}

/// Folds `chars` into the last line and returns its width.
fn update_line(lines: &mut [Line], chars: &[CharInfo], letter_spacing: f32, empty_height: f32) -> f32 {
    let prev_height = lines.len().checked_sub(2).map(|i| lines[i].height);
    let Some(line) = lines.last_mut() else {
        return 0.0;
    };

    for ci in chars {
        if ci.baseline > line.baseline {
            line.height += ci.baseline - line.baseline;
            line.baseline = ci.baseline;
        }
        if ci.height - ci.baseline > line.height - line.baseline {
            line.height += ci.height - ci.baseline - (line.height - line.baseline);
        }
        if ci.width > 0.0 {
            if line.width != 0.0 {
                line.width += letter_spacing;
            }
            line.width += ci.width;
        }
    }
    if line.height == 0.0 {
        line.height = prev_height.unwrap_or(empty_height);
    }
    line.char_count = chars.len();
    line.width
}

/// Closes the last line and opens the next one. `terminator` is 1 when a
/// hard break ends the closed line. Returns a copy of the closed line.
fn start_next_line(lines: &mut Vec<Line>, line_spacing: f32, terminator: usize) -> Line {
    let Some(line) = lines.last_mut() else {
        return Line::default();
    };
    line.terminated = terminator == 1;
    let closed = *line;

    lines.push(Line {
        char_index: closed.char_index + closed.char_count + terminator,
        y: (closed.y + closed.height + line_spacing).max(GUTTER_Y),
        ..Default::default()
    });
    closed
}

/// Whether the freshly opened line would reach past `rect_height`.
fn next_line_overflows(lines: &[Line], rect_height: f32) -> bool {
    match lines {
        [.., prev, next] => next.y + prev.height > rect_height,
        _ => false,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::text::inline_object::AttributeSizer;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn run(text: &str, config: &LayoutConfig) -> LineLayout {
        let registry = testing::registry();
        let format = TextFormat::default();
        LineBreaker::new(&registry, &format, config).layout(
            &chars(text),
            &mut [],
            &mut AttributeSizer,
        )
    }

    fn assert_partition(layout: &LineLayout, len: usize) {
        let mut next = 0;
        for line in &layout.lines {
            assert_eq!(line.char_index, next);
            next = line.span_end();
        }
        assert_eq!(next, len);
    }

    #[test]
    fn single_word_single_line() {
        let config = LayoutConfig {
            width: 1000.0,
            ..Default::default()
        };
        let layout = run("Hello", &config);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].char_count, 5);
        assert_eq!(layout.lines[0].width, 30.0);
        assert_eq!(layout.text_width, 34.0);
        assert_eq!(layout.ellipsis_char_index, None);
        assert_eq!(layout.font_size_scale, 1.0);
    }

    #[test]
    fn newline_forces_break() {
        let layout = run("a\nb", &LayoutConfig::default());
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.lines[0].char_count, 1);
        assert!(layout.lines[0].terminated);
        assert_eq!(layout.lines[1].char_index, 2);
        assert_eq!(layout.lines[1].char_count, 1);
        assert_partition(&layout, 3);

        // line spacing 3 minus one
        assert_eq!(layout.lines[1].y, GUTTER_Y + 12.0 + 2.0);
        assert_eq!(layout.text_height, (layout.lines[1].y + 12.0 + GUTTER_Y).round());
    }

    #[test]
    fn blank_lines_borrow_height() {
        let layout = run("\n\nx", &LayoutConfig::default());
        assert_eq!(layout.lines.len(), 3);
        assert_eq!(layout.lines[0].char_count, 0);
        assert_eq!(layout.lines[0].height, 12.0);
        assert_eq!(layout.lines[1].height, 12.0);
        assert_partition(&layout, 3);
    }

    #[test]
    fn single_line_keeps_newlines() {
        let config = LayoutConfig {
            width: 1000.0,
            single_line: true,
            word_wrap: true,
            ..Default::default()
        };
        let layout = run("a\nb", &config);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].char_count, 3);
    }

    #[test]
    fn wrap_moves_whole_word() {
        let config = LayoutConfig {
            width: 54.0,
            word_wrap: true,
            ..Default::default()
        };
        let layout = run("hello world", &config);
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.lines[0].char_count, 6);
        assert_eq!(layout.lines[0].width, 30.0);
        assert_eq!(layout.lines[1].char_index, 6);
        assert_eq!(layout.lines[1].char_count, 5);
        assert_partition(&layout, 11);
    }

    #[test]
    fn wrap_breaks_long_runs_one_char_at_a_time() {
        let config = LayoutConfig {
            width: 34.0,
            word_wrap: true,
            ..Default::default()
        };
        let layout = run("abcdefghijkl", &config);
        assert!(layout.lines.iter().all(|l| l.char_count >= 1));
        assert_eq!(layout.lines[0].char_count, 5);
        assert_partition(&layout, 12);
    }

    #[test]
    fn wrap_never_empties_a_line() {
        let config = LayoutConfig {
            width: 11.0,
            word_wrap: true,
            ..Default::default()
        };
        for text in ["a b c d", "ab. cd'ef \"gh\"", "x  y\n\nz", "wwwwwwwwwwwwwwwwwwwwwwwwwww"] {
            let layout = run(text, &config);
            let len = text.chars().count();
            assert_partition(&layout, len);
            for line in &layout.lines {
                let explicit_empty = line.terminated && line.char_count == 0;
                assert!(line.char_count >= 1 || explicit_empty, "{text:?}: {line:?}");
            }
        }
    }

    #[test]
    fn max_width_forces_wrap() {
        let config = LayoutConfig {
            width: 1000.0,
            max_width: Some(54.0),
            auto_size: AutoSize::Both,
            ..Default::default()
        };
        let layout = run("hello world", &config);
        assert_eq!(layout.lines.len(), 2);
        assert!(layout.width <= 54.0);
        assert_eq!(layout.height, layout.text_height);
    }

    #[test]
    fn auto_size_both_follows_text() {
        let config = LayoutConfig {
            width: 10.0,
            word_wrap: true,
            auto_size: AutoSize::Both,
            ..Default::default()
        };
        let layout = run("hello world", &config);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.width, layout.text_width);
    }

    #[test]
    fn ellipsis_marks_horizontal_overflow() {
        let config = LayoutConfig {
            width: 34.0,
            auto_size: AutoSize::Ellipsis,
            ..Default::default()
        };
        let layout = run("Hello world", &config);
        assert_eq!(layout.ellipsis_char_index, Some(4));

        let fits = run("Hi", &config);
        assert_eq!(fits.ellipsis_char_index, None);
    }

    #[test]
    fn ellipsis_marks_vertical_overflow() {
        let config = LayoutConfig {
            width: 1000.0,
            height: 20.0,
            auto_size: AutoSize::Ellipsis,
            ..Default::default()
        };
        let layout = run("first\nsecond", &config);
        assert_eq!(layout.ellipsis_char_index, Some(3));
    }

    #[test]
    fn layout_is_deterministic() {
        let config = LayoutConfig {
            width: 40.0,
            height: 30.0,
            word_wrap: true,
            auto_size: AutoSize::Ellipsis,
            ..Default::default()
        };
        let text = "the quick brown fox jumps over the lazy dog";
        let a = run(text, &config);
        let b = run(text, &config);
        assert_eq!(a.lines, b.lines);
        assert_eq!(a.ellipsis_char_index, b.ellipsis_char_index);
    }

    #[test]
    fn shrink_multi_line_converges() {
        let config = LayoutConfig {
            width: 60.0,
            height: 30.0,
            word_wrap: true,
            auto_size: AutoSize::Shrink,
            ..Default::default()
        };
        let layout = run("the quick brown fox jumps over the lazy dog", &config);
        assert!(layout.font_size_scale < 1.0);
        assert!(layout.text_height <= config.height + 1.0);
        assert!(layout.text_width <= config.width + 1.0);
    }

    #[test]
    fn shrink_single_line_by_width_ratio() {
        let config = LayoutConfig {
            width: 40.0,
            height: 30.0,
            auto_size: AutoSize::Shrink,
            ..Default::default()
        };
        let layout = run("abcdefghij", &config);
        assert_eq!(layout.lines.len(), 1);
        assert!(layout.font_size_scale < 1.0);
        assert!(layout.text_width <= config.width);
    }

    #[test]
    fn shrink_leaves_fitting_text_alone() {
        let config = LayoutConfig {
            width: 400.0,
            height: 30.0,
            auto_size: AutoSize::Shrink,
            ..Default::default()
        };
        assert_eq!(run("fits", &config).font_size_scale, 1.0);
    }

    #[test]
    fn shrink_single_line_to_fit_height() {
        let config = LayoutConfig {
            width: 1000.0,
            height: 8.0,
            auto_size: AutoSize::Shrink,
            ..Default::default()
        };
        let layout = run("hi", &config);
        assert_eq!(layout.lines.len(), 1);
        assert!(layout.font_size_scale < 1.0);
        assert!(layout.text_height <= config.height + 1.0);
    }

    #[test]
    fn tabs_are_four_spaces_wide() {
        let layout = run("\t", &LayoutConfig::default());
        assert_eq!(layout.lines[0].width, 24.0);
    }

    #[test]
    fn line_of_maps_chars_to_lines() {
        let layout = run("ab\ncd", &LayoutConfig::default());
        assert_eq!(layout.line_of(0), 0);
        assert_eq!(layout.line_of(2), 0);
        assert_eq!(layout.line_of(3), 1);
        assert_eq!(layout.line_of(5), 1);
    }
}
