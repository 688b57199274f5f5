use std::{collections::HashMap, sync::Arc};

use euclid::default::{Box2D, Point2D, Vector2D};

use crate::{
    byte_buffer::{BufferError, ByteBuffer},
    font_registry::FontRegistry,
    text::{
        AutoSize, HorizontalAlign, MarkupElement, TextFormat, VerticalAlign, caret,
        inline_object::{self, AttributeSizer, InlineHost, InlineObjectPool, ObjectBinder},
        layout::{LayoutConfig, Line, LineBreaker, LineLayout},
        markup::{self, MarkupMode, ParseOptions, ParsedText},
        mesh::{CharPosition, ComposedText, MeshComposer, MeshData},
    },
};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Dirty: u8 {
        const TEXT = 1;
        const LAYOUT = 2;
        const MESH = 4;
    }
}

/// A block of rich text: markup in, vertex buffers out.
///
/// Setters only mark what became stale. Work happens in [`TextField::ensure_layout`]
/// and [`TextField::ensure_mesh`]; the getters read whatever those built last,
/// so call one of them after changing the field.
pub struct TextField {
    registry: Arc<FontRegistry>,
    format: TextFormat,
    config: LayoutConfig,
    mode: MarkupMode,
    parse_options: ParseOptions,
    enhanced_outline: bool,
    source: String,
    vars: Option<HashMap<String, String, fxhash::FxBuildHasher>>,

    parsed: ParsedText,
    layout: LineLayout,
    composed: ComposedText,
    dirty: Dirty,
    layout_generation: u64,
    mesh_generation: u64,

    host: Option<Box<dyn InlineHost>>,
    pool: InlineObjectPool,
    disposed: bool,
}

impl TextField {
    pub fn new(registry: Arc<FontRegistry>) -> Self {
        Self {
            registry,
            format: TextFormat::default(),
            config: LayoutConfig::default(),
            mode: MarkupMode::Plain,
            parse_options: ParseOptions::default(),
            enhanced_outline: false,
            source: String::new(),
            vars: None,
            parsed: ParsedText::default(),
            layout: LineLayout::default(),
            composed: ComposedText::default(),
            dirty: Dirty::all(),
            layout_generation: 0,
            mesh_generation: 0,
            host: None,
            pool: InlineObjectPool::new(),
            disposed: false,
        }
    }
}

/// content
impl TextField {
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.set_source(text.into(), MarkupMode::Plain);
    }

    pub fn set_html(&mut self, html: impl Into<String>) {
        self.set_source(html.into(), MarkupMode::Html);
    }

    pub fn set_ubb(&mut self, ubb: impl Into<String>) {
        self.set_source(ubb.into(), MarkupMode::Ubb);
    }

    fn set_source(&mut self, source: String, mode: MarkupMode) {
        if self.source == source && self.mode == mode {
            return;
        }
        self.source = source;
        self.mode = mode;
        self.dirty.insert(Dirty::TEXT);
    }

    /// The markup as it was set.
    pub fn text(&self) -> &str {
        &self.source
    }

    pub fn markup_mode(&self) -> MarkupMode {
        self.mode
    }

    /// The laid-out text without markup or entity placeholders.
    pub fn display_text(&self) -> String {
        self.parsed.display_string()
    }

    /// Enables `{name}` substitution. Values are applied by [`TextField::flush_vars`].
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars
            .get_or_insert_with(HashMap::default)
            .insert(name.into(), value.into());
    }

    /// Replaces all variables and applies them.
    pub fn set_vars<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self.flush_vars();
    }

    pub fn flush_vars(&mut self) {
        self.dirty.insert(Dirty::TEXT);
    }

    /// Turns substitution off; placeholders are shown verbatim again.
    pub fn clear_vars(&mut self) {
        if self.vars.take().is_some() {
            self.dirty.insert(Dirty::TEXT);
        }
    }

    pub fn set_format(&mut self, format: TextFormat) {
        if self.format != format {
            self.format = format;
            self.dirty.insert(Dirty::TEXT);
        }
    }

    pub fn format(&self) -> &TextFormat {
        &self.format
    }

    pub fn set_parse_options(&mut self, options: ParseOptions) {
        self.parse_options = options;
        self.dirty.insert(Dirty::TEXT);
    }

    /// Hands inline objects over to `host`. Objects created for the previous
    /// host are released first.
    pub fn set_inline_host(&mut self, host: Box<dyn InlineHost>) {
        self.release_objects();
        self.pool.clear();
        self.host = Some(host);
        self.dirty.insert(Dirty::LAYOUT);
    }
}

/// geometry settings
impl TextField {
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    fn update_config(&mut self, f: impl FnOnce(&mut LayoutConfig)) {
        let before = self.config.clone();
        f(&mut self.config);
        if self.config != before {
            self.dirty.insert(Dirty::LAYOUT);
        }
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.update_config(|c| {
            c.width = width;
            c.height = height;
        });
    }

    pub fn set_word_wrap(&mut self, word_wrap: bool) {
        self.update_config(|c| c.word_wrap = word_wrap);
    }

    pub fn set_single_line(&mut self, single_line: bool) {
        self.update_config(|c| c.single_line = single_line);
    }

    pub fn set_auto_size(&mut self, auto_size: AutoSize) {
        self.update_config(|c| c.auto_size = auto_size);
    }

    pub fn set_max_width(&mut self, max_width: Option<f32>) {
        self.update_config(|c| c.max_width = max_width);
    }

    /// Draws outlines in eight directions instead of four.
    pub fn set_enhanced_outline(&mut self, enhanced: bool) {
        if self.enhanced_outline != enhanced {
            self.enhanced_outline = enhanced;
            self.dirty.insert(Dirty::MESH);
        }
    }
}

/// rebuilding
impl TextField {
    fn ensure_parsed(&mut self) {
        if self.disposed || !self.dirty.contains(Dirty::TEXT) {
            return;
        }
        self.release_objects();

        let source = match &self.vars {
            Some(vars) => markup::apply_template(&self.source, vars),
            None => self.source.clone(),
        };
        markup::parse_into(
            &source,
            self.mode,
            &self.format,
            &self.parse_options,
            &mut self.parsed,
        );
        log::trace!(
            "Parsed {} chars into {} elements.",
            self.parsed.len(),
            self.parsed.elements.len()
        );

        self.dirty.remove(Dirty::TEXT);
        self.dirty.insert(Dirty::LAYOUT);
    }

    /// Rebuilds lines if the text, the geometry or a glyph source changed.
    pub fn ensure_layout(&mut self) {
        if self.disposed {
            return;
        }
        self.ensure_parsed();

        let forced = self.dirty.contains(Dirty::LAYOUT);
        if !forced && !self.layout.is_stale() {
            return;
        }
        if !forced {
            log::debug!("Glyph source changed, relayout.");
        }

        let breaker = LineBreaker::new(&self.registry, &self.format, &self.config);
        let layout = match self.host.as_deref_mut() {
            Some(host) => {
                let mut binder = ObjectBinder {
                    pool: &mut self.pool,
                    host,
                };
                breaker.layout(&self.parsed.text, &mut self.parsed.elements, &mut binder)
            }
            None => breaker.layout(
                &self.parsed.text,
                &mut self.parsed.elements,
                &mut AttributeSizer,
            ),
        };
        // a rebuilt atlas alone leaves the lines where they were
        if forced
            || layout.lines != self.layout.lines
            || layout.ellipsis_char_index != self.layout.ellipsis_char_index
        {
            self.layout_generation += 1;
        }
        self.layout = layout;

        self.dirty.remove(Dirty::LAYOUT);
        self.dirty.insert(Dirty::MESH);
    }

    /// Rebuilds the mesh if anything it depends on changed.
    pub fn ensure_mesh(&mut self) {
        self.ensure_layout();
        if self.disposed || !self.dirty.contains(Dirty::MESH) {
            return;
        }

        self.composed = self.compose();
        // rasterizing may have rebuilt an atlas under the quads just emitted
        if self.layout.is_stale() {
            log::debug!("Atlas rebuilt while composing, composing again.");
            self.layout.refresh_stamps();
            self.composed = self.compose();
        }

        self.bind_links();
        self.sync_inline_objects();
        self.mesh_generation += 1;
        self.dirty.remove(Dirty::MESH);
    }

    fn compose(&mut self) -> ComposedText {
        MeshComposer::new(&self.registry, &self.format, &self.config)
            .with_enhanced_outline(self.enhanced_outline)
            .compose(&self.parsed.text, &mut self.parsed.elements, &self.layout)
    }

    fn bind_links(&mut self) {
        if let Some(host) = self.host.as_deref_mut() {
            inline_object::bind_links(
                &mut self.parsed.elements,
                &self.composed.link_areas,
                &mut self.pool,
                host,
            );
        }
    }

    /// Pushes object positions and visibility to the host.
    pub(crate) fn sync_inline_objects(&mut self) {
        if let Some(host) = self.host.as_deref_mut() {
            inline_object::sync_objects(&mut self.parsed.elements, Vector2D::zero(), host);
        }
    }

    fn release_objects(&mut self) {
        if let Some(host) = self.host.as_deref_mut() {
            inline_object::release_objects(&mut self.parsed.elements, &mut self.pool, host);
        } else {
            for element in &mut self.parsed.elements {
                element.object = None;
            }
        }
    }

    /// Releases every inline object and drops all buffers. The field stays
    /// empty afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.release_objects();
        self.pool.clear();
        self.parsed.clear();
        self.layout = LineLayout::default();
        self.composed = ComposedText::default();
        self.host = None;
        self.disposed = true;
        log::debug!("Text field disposed.");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// results
impl TextField {
    /// Incremented every time the mesh is rebuilt.
    pub fn mesh_generation(&self) -> u64 {
        self.mesh_generation
    }

    /// Incremented when a relayout may have moved characters. Rebuilding a
    /// glyph atlas without changing any line leaves it alone.
    pub fn layout_generation(&self) -> u64 {
        self.layout_generation
    }

    pub fn layout(&self) -> &LineLayout {
        &self.layout
    }

    pub fn lines(&self) -> &[Line] {
        &self.layout.lines
    }

    pub fn text_width(&self) -> f32 {
        self.layout.text_width
    }

    pub fn text_height(&self) -> f32 {
        self.layout.text_height
    }

    /// Content rect size after auto-size.
    pub fn size(&self) -> (f32, f32) {
        (self.layout.width, self.layout.height)
    }

    pub fn composed(&self) -> &ComposedText {
        &self.composed
    }

    pub fn mesh(&self) -> &MeshData {
        &self.composed.mesh
    }

    pub fn char_positions(&self) -> &[CharPosition] {
        &self.composed.char_positions
    }

    /// The elements of the last parse.
    pub fn elements(&self) -> &[MarkupElement] {
        &self.parsed.elements
    }

    /// The plain text the layout runs on.
    pub fn chars(&self) -> &[char] {
        &self.parsed.text
    }

    /// Link element under `point`, in content space.
    pub fn link_at(&self, point: Point2D<f32>) -> Option<&MarkupElement> {
        let index = self.composed.link_at(point)?;
        self.parsed.elements.get(index)
    }

    pub fn char_index_at(&self, point: Point2D<f32>) -> usize {
        caret::char_index_at(&self.layout, &self.composed, point)
    }

    pub fn caret_rect(&self, char_index: usize) -> Option<Box2D<f32>> {
        caret::caret_rect(&self.layout, &self.composed, char_index)
    }

    pub fn selection_rects(&self, start: usize, end: usize) -> Vec<Box2D<f32>> {
        caret::selection_rects(&self.layout, &self.composed, start, end)
    }

    /// Live mesh, text and elements for effects that edit vertices in place.
    pub(crate) fn parts_mut(&mut self) -> (&mut ComposedText, &[char], &mut [MarkupElement]) {
        (
            &mut self.composed,
            &self.parsed.text,
            &mut self.parsed.elements,
        )
    }
}

/// Persisted text field settings.
///
/// Block 5 of a component holds the format and field flags, block 6 the
/// initial text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextFieldSettings {
    pub format: TextFormat,
    pub ubb: bool,
    pub auto_size: AutoSize,
    pub single_line: bool,
    pub template_vars: bool,
    pub text: Option<String>,
}

impl TextFieldSettings {
    pub fn read(buffer: &mut ByteBuffer, begin_pos: usize) -> Result<Self, BufferError> {
        let mut settings = Self::default();

        if buffer.seek(begin_pos, 5)? {
            let format = &mut settings.format;
            if let Some(font) = buffer.read_s()? {
                format.font = font;
            }
            format.size = buffer.read_short()?.max(1) as u32;
            format.color = buffer.read_color()?;
            format.align = HorizontalAlign::from_byte(buffer.read_byte()?);
            format.vertical_align = VerticalAlign::from_byte(buffer.read_byte()?);
            format.line_spacing = buffer.read_short()? as f32;
            format.letter_spacing = buffer.read_short()? as f32;
            settings.ubb = buffer.read_bool()?;
            settings.auto_size = AutoSize::from_byte(buffer.read_byte()?);
            format.underline = buffer.read_bool()?;
            format.italic = buffer.read_bool()?;
            format.bold = buffer.read_bool()?;
            settings.single_line = buffer.read_bool()?;
            if buffer.read_bool()? {
                format.outline_color = buffer.read_color()?;
                format.outline = buffer.read_float()?;
            }
            if buffer.read_bool()? {
                format.shadow_color = buffer.read_color()?;
                let x = buffer.read_float()?;
                let y = buffer.read_float()?;
                format.shadow_offset = Vector2D::new(x, y);
            }
            settings.template_vars = buffer.read_bool()?;
            if buffer.version >= 3 {
                format.strikethrough = buffer.read_bool()?;
                // dilate and softness values of another renderer
                buffer.skip(12)?;
            }
        }

        if buffer.seek(begin_pos, 6)? {
            settings.text = buffer.read_s()?;
        }
        Ok(settings)
    }
}

impl TextField {
    pub fn apply_settings(&mut self, settings: TextFieldSettings) {
        self.set_format(settings.format);
        self.set_auto_size(settings.auto_size);
        self.set_single_line(settings.single_line);
        if settings.template_vars && self.vars.is_none() {
            self.vars = Some(HashMap::default());
            self.dirty.insert(Dirty::TEXT);
        }
        if let Some(text) = settings.text {
            if settings.ubb {
                self.set_ubb(text);
            } else {
                self.set_text(text);
            }
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::glyph_source::BoxGlyphSource;
    use crate::testing::{self, RecordingHost};
    use crate::text::{Color32, ElementKind, ElementStatus};

    fn field() -> TextField {
        let mut field = TextField::new(Arc::new(testing::registry()));
        field.set_size(200.0, 50.0);
        field
    }

    #[test]
    fn mesh_is_rebuilt_only_when_dirty() {
        let mut field = field();
        field.set_text("abc");
        field.ensure_mesh();
        assert_eq!(field.mesh().vertex_count(), 12);
        let generation = field.mesh_generation();

        field.set_text("abc");
        field.set_size(200.0, 50.0);
        field.ensure_mesh();
        assert_eq!(field.mesh_generation(), generation);

        field.set_text("abcd");
        field.ensure_mesh();
        assert_eq!(field.mesh().vertex_count(), 16);
        assert_eq!(field.mesh_generation(), generation + 1);
    }

    #[test]
    fn geometry_changes_relayout() {
        let mut field = field();
        field.set_text("hello world");
        field.ensure_layout();
        assert_eq!(field.lines().len(), 1);

        field.set_word_wrap(true);
        field.set_size(54.0, 50.0);
        field.ensure_layout();
        assert_eq!(field.lines().len(), 2);
    }

    #[test]
    fn getters_read_the_last_build() {
        let mut field = field();
        field.set_text("abc");
        field.ensure_mesh();
        let generation = field.mesh_generation();

        field.set_text("abcdef");
        assert_eq!(field.mesh().vertex_count(), 12);
        assert_eq!(field.chars().len(), 3);
        assert_eq!(field.mesh_generation(), generation);

        field.ensure_mesh();
        assert_eq!(field.mesh().vertex_count(), 24);
        assert_eq!(field.chars().len(), 6);
    }

    #[test]
    fn auto_size_height_grows_with_text() {
        let mut field = field();
        field.set_auto_size(AutoSize::Height);
        field.set_text("a\nb\nc");
        field.ensure_layout();
        let (width, height) = field.size();
        assert_eq!(width, 200.0);
        assert_eq!(height, field.text_height());
    }

    #[test]
    fn template_vars_are_applied_on_flush() {
        let mut field = field();
        let display = |field: &mut TextField| {
            field.ensure_layout();
            field.display_text()
        };
        field.set_text("Hi {name=you}");
        assert_eq!(display(&mut field), "Hi {name=you}");

        field.set_var("name", "Ann");
        assert_eq!(display(&mut field), "Hi {name=you}");
        field.flush_vars();
        assert_eq!(display(&mut field), "Hi Ann");

        field.set_vars([("other", "x")]);
        assert_eq!(display(&mut field), "Hi you");

        field.clear_vars();
        assert_eq!(display(&mut field), "Hi {name=you}");
    }

    #[test]
    fn html_links_are_hit_tested() {
        let mut field = field();
        field.set_html("<a href='event:1'>go</a>");
        field.ensure_mesh();
        let line = field.lines()[0];
        let link = field.link_at(Point2D::new(5.0, line.y + 2.0)).unwrap();
        assert_eq!(link.kind, ElementKind::Link);
        assert_eq!(link.get_string("href"), Some("event:1"));
        assert!(field.link_at(Point2D::new(150.0, line.y + 2.0)).is_none());
    }

    #[test]
    fn stale_glyph_source_triggers_relayout() {
        let registry = FontRegistry::new();
        let source = Arc::new(Mutex::new(BoxGlyphSource::new()));
        registry.register("box", source.clone());
        registry.set_default_font("box");

        let mut field = TextField::new(Arc::new(registry));
        field.set_text("abc");
        field.ensure_mesh();
        let generation = field.mesh_generation();
        let layout_generation = field.layout_generation();

        source.lock().invalidate();
        assert_eq!(field.lines().len(), 1);
        assert_eq!(field.mesh_generation(), generation);

        field.ensure_mesh();
        assert_eq!(field.mesh_generation(), generation + 1);
        // same lines, so characters did not move
        assert_eq!(field.layout_generation(), layout_generation);

        field.set_text("xyz");
        field.ensure_layout();
        assert_eq!(field.layout_generation(), layout_generation + 1);
    }

    #[test]
    fn inline_objects_follow_the_field() {
        let mut field = field();
        let host = RecordingHost::default();
        let counters = host.counters();
        field.set_inline_host(Box::new(host));
        field.set_html("a<img src='ui://x'/>b");
        field.ensure_mesh();

        let image = field
            .elements()
            .iter()
            .find(|e| e.kind == ElementKind::Image)
            .unwrap();
        assert!(image.status.contains(ElementStatus::ADDED));
        assert_eq!(image.size.width, 32.0);
        assert_eq!(counters.lock().created, 1);
        assert_eq!(counters.lock().attached, 1);

        // a new text releases the object into the pool and reuses it
        field.set_html("<img src='ui://y'/>");
        field.ensure_mesh();
        assert_eq!(counters.lock().created, 1);
        assert_eq!(counters.lock().detached, 1);

        field.dispose();
        assert!(field.is_disposed());
        assert!(field.mesh().is_empty());
        assert_eq!(counters.lock().disposed, 1);
    }

    #[test]
    fn links_are_handed_to_the_host() {
        let mut field = field();
        let host = RecordingHost::default();
        let counters = host.counters();
        field.set_inline_host(Box::new(host));
        field.set_html("x<a href='go'>ab</a>");
        field.ensure_mesh();

        let link = field
            .elements()
            .iter()
            .find(|e| e.kind == ElementKind::Link)
            .unwrap();
        assert!(link.status.contains(ElementStatus::ADDED));
        assert_eq!(link.position, field.composed().link_areas[0].rects[0].min);
        assert_eq!(counters.lock().created, 1);
        assert_eq!(counters.lock().link_rects, 1);

        field.set_html("<a href='again'>cd</a>");
        field.ensure_mesh();
        assert_eq!(counters.lock().created, 1);
        assert_eq!(counters.lock().detached, 1);
        assert_eq!(counters.lock().attached, 2);
    }

    #[test]
    fn images_cut_by_the_ellipsis_stay_detached() {
        let mut field = field();
        let host = RecordingHost::default();
        let counters = host.counters();
        field.set_inline_host(Box::new(host));
        field.set_size(40.0, 50.0);
        field.set_auto_size(AutoSize::Ellipsis);
        field.set_html("abcdefghijkl<img src='ui://x'/>");
        field.ensure_mesh();

        let image = field
            .elements()
            .iter()
            .find(|e| e.kind == ElementKind::Image)
            .unwrap();
        assert!(image.status.contains(ElementStatus::CLIPPED));
        assert!(!image.status.contains(ElementStatus::ADDED));
        assert_ne!(image.position, Point2D::zero());
        assert_eq!(counters.lock().attached, 0);
    }

    fn settings_bytes() -> Vec<u8> {
        let mut block5 = vec![
            0, 0, // font: string 0
            0, 20, // size
            255, 0, 0, 255, // color
            1, 2, // align, valign
            0, 5, 0, 1, // line and letter spacing
            1, // ubb
            2, // auto size
            0, 1, 0, 0, // underline, italic, bold, single line
            1, 0, 0, 0, 255, 0x3f, 0x80, 0, 0, // outline
            0, // shadow
            1, // template vars
            1, // strikethrough
        ];
        block5.extend([0; 12]);
        let block6 = vec![0, 1];

        let header_len = 2 + 7 * 2;
        let block5_pos = header_len as i16;
        let block6_pos = block5_pos + block5.len() as i16;
        let mut bytes = vec![7, 1];
        for i in 0..7 {
            let offset = match i {
                5 => block5_pos,
                6 => block6_pos,
                _ => 0,
            };
            bytes.extend(offset.to_be_bytes());
        }
        bytes.extend(block5);
        bytes.extend(block6);
        bytes
    }

    #[test]
    fn settings_are_read_from_blocks() {
        let table: Vec<String> = vec!["Arial".into(), "[b]hi[/b]".into()];
        let mut buffer = ByteBuffer::new(settings_bytes()).with_string_table(table);
        buffer.version = 3;

        let settings = TextFieldSettings::read(&mut buffer, 0).unwrap();
        assert_eq!(settings.format.font, "Arial");
        assert_eq!(settings.format.size, 20);
        assert_eq!(settings.format.color, Color32::rgb(255, 0, 0));
        assert_eq!(settings.format.align, HorizontalAlign::Center);
        assert_eq!(settings.format.vertical_align, VerticalAlign::Bottom);
        assert_eq!(settings.format.line_spacing, 5.0);
        assert!(settings.ubb);
        assert_eq!(settings.auto_size, AutoSize::Height);
        assert!(settings.format.italic);
        assert_eq!(settings.format.outline, 1.0);
        assert!(settings.template_vars);
        assert!(settings.format.strikethrough);
        assert_eq!(settings.text.as_deref(), Some("[b]hi[/b]"));

        let mut field = field();
        field.apply_settings(settings);
        assert_eq!(field.markup_mode(), MarkupMode::Ubb);
        field.ensure_layout();
        assert_eq!(field.display_text(), "hi");
    }

    #[test]
    fn missing_blocks_keep_defaults() {
        let mut buffer = ByteBuffer::new(vec![2, 1, 0, 0, 0, 0]);
        let settings = TextFieldSettings::read(&mut buffer, 0).unwrap();
        assert_eq!(settings, TextFieldSettings::default());
    }
}
