//! Rich markup to plain text plus an element list.

mod template;
mod ubb;

use std::{borrow::Cow, collections::HashMap};

use crate::text::{Color32, ElementKind, HorizontalAlign, MarkupElement, SpecialStyle, TextFormat};

pub use template::apply_template;
pub use ubb::ubb_to_html;

/// Placeholder stored in the plain text for every entity element.
pub const ENTITY_PLACEHOLDER: char = '\0';

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkupMode {
    /// Text is taken verbatim.
    #[default]
    Plain,
    Html,
    Ubb,
}

/// Image that replaces a single character of the text.
#[derive(Clone, Debug, PartialEq)]
pub struct Emoji {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Underline link text.
    pub link_underline: bool,
    /// Color applied to link text, `None` keeps the surrounding color.
    pub link_color: Option<Color32>,
    /// Trim whitespace around text chunks and drop chunks that are blank.
    pub ignore_whitespace: bool,
    pub emojis: HashMap<char, Emoji, fxhash::FxBuildHasher>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            link_underline: true,
            link_color: Some(Color32::rgb(0x3a, 0x67, 0xcc)),
            ignore_whitespace: false,
            emojis: HashMap::default(),
        }
    }
}

/// Output of a parse: the text that is laid out and the elements anchored into it.
#[derive(Debug, Default)]
pub struct ParsedText {
    pub text: Vec<char>,
    pub elements: Vec<MarkupElement>,
}

impl ParsedText {
    pub fn clear(&mut self) {
        self.text.clear();
        self.elements.clear();
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The plain text with entity placeholders removed.
    pub fn display_string(&self) -> String {
        self.text
            .iter()
            .filter(|&&c| c != ENTITY_PLACEHOLDER)
            .collect()
    }

    /// Format in effect at `char_index`.
    pub fn format_at<'a>(&'a self, char_index: usize, base: &'a TextFormat) -> &'a TextFormat {
        format_at(&self.elements, char_index, base)
    }
}

/// Format of the last text element starting at or before `char_index`.
pub(crate) fn format_at<'a>(
    elements: &'a [MarkupElement],
    char_index: usize,
    base: &'a TextFormat,
) -> &'a TextFormat {
    let end = elements.partition_point(|e| e.char_index <= char_index);
    elements[..end]
        .iter()
        .rev()
        .find(|e| e.kind == ElementKind::Text)
        .map_or(base, |e| &e.format)
}

pub fn parse(markup: &str, mode: MarkupMode, base: &TextFormat, options: &ParseOptions) -> ParsedText {
    let mut out = ParsedText::default();
    parse_into(markup, mode, base, options, &mut out);
    out
}

/// Parses into `out`, reusing its buffers.
pub fn parse_into(
    markup: &str,
    mode: MarkupMode,
    base: &TextFormat,
    options: &ParseOptions,
    out: &mut ParsedText,
) {
    out.clear();
    let source = normalize_newlines(markup);
    let mut parser = HtmlParser {
        out,
        options,
        format: base.clone(),
        stack: Vec::new(),
    };

    match mode {
        MarkupMode::Plain => parser.append_text(&source),
        MarkupMode::Html => parser.parse(&source),
        MarkupMode::Ubb => parser.parse(&ubb_to_html(&source)),
    }
}

fn normalize_newlines(s: &str) -> Cow<'_, str> {
    if s.contains('\r') {
        Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagKind {
    Start,
    End,
    Void,
}

#[derive(Debug)]
struct Tag {
    name: String,
    kind: TagKind,
    attrs: Vec<(String, String)>,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn opens(&self) -> bool {
        self.kind != TagKind::End
    }
}

struct HtmlParser<'a> {
    out: &'a mut ParsedText,
    options: &'a ParseOptions,
    format: TextFormat,
    stack: Vec<TextFormat>,
}

impl HtmlParser<'_> {
    fn parse(&mut self, src: &str) {
        let mut pending = String::new();
        let mut pos = 0;

        while pos < src.len() {
            let tail = &src[pos..];

            if let Some(comment) = tail.strip_prefix("<!--") {
                self.flush(&mut pending);
                pos += 4 + comment.find("-->").map_or(comment.len(), |i| i + 3);
                continue;
            }

            if tail.starts_with('<')
                && let Some((tag, tag_len)) = parse_tag(tail)
                && is_known(&tag.name)
            {
                self.flush(&mut pending);
                pos += tag_len;
                pos += self.handle_tag(&tag, &src[pos..]);
                continue;
            }

            if tail.starts_with('&')
                && let Some((ch, len)) = decode_entity(tail)
            {
                pending.push(ch);
                pos += len;
                continue;
            }

            let Some(ch) = tail.chars().next() else {
                break;
            };
            pending.push(ch);
            pos += ch.len_utf8();
        }

        self.flush(&mut pending);
    }

    fn flush(&mut self, pending: &mut String) {
        if pending.is_empty() {
            return;
        }
        if self.options.ignore_whitespace {
            let trimmed = pending.trim();
            if !trimmed.is_empty() {
                let trimmed = trimmed.to_string();
                self.append_text(&trimmed);
            }
        } else {
            let text = std::mem::take(pending);
            self.append_text(&text);
        }
        pending.clear();
    }

    /// Handles a recognised tag. Returns extra bytes consumed after it.
    fn handle_tag(&mut self, tag: &Tag, rest: &str) -> usize {
        match tag.name.as_str() {
            "b" | "i" | "u" | "s" | "strike" | "sub" | "sup" => {
                if tag.kind == TagKind::Start {
                    self.push_format();
                    match tag.name.as_str() {
                        "b" => self.format.bold = true,
                        "i" => self.format.italic = true,
                        "u" => self.format.underline = true,
                        "sub" => self.format.special_style = SpecialStyle::Subscript,
                        "sup" => self.format.special_style = SpecialStyle::Superscript,
                        _ => self.format.strikethrough = true,
                    }
                } else if tag.kind == TagKind::End {
                    self.pop_format();
                }
            }
            "font" => {
                if tag.kind == TagKind::Start {
                    self.push_format();
                    if let Some(size) = tag.attr("size") {
                        self.format.size = font_size(self.format.size, size);
                    }
                    if let Some(color) = tag.attr("color").and_then(Color32::from_hex) {
                        self.format.color = color;
                    }
                    if let Some(face) = tag.attr("face") {
                        self.format.font = face.to_string();
                    }
                } else if tag.kind == TagKind::End {
                    self.pop_format();
                }
            }
            "br" => self.append_text("\n"),
            "p" => match tag.kind {
                TagKind::Start => {
                    if self.out.text.last().is_some_and(|&c| c != '\n') {
                        self.append_text("\n");
                    }
                    self.push_format();
                    if let Some(align) = tag.attr("align").and_then(HorizontalAlign::parse) {
                        self.format.align = align;
                    }
                }
                TagKind::End => {
                    self.append_text("\n");
                    self.pop_format();
                }
                TagKind::Void => {}
            },
            "a" => match tag.kind {
                TagKind::Start => {
                    self.push_format();
                    if self.options.link_underline {
                        self.format.underline = true;
                    }
                    if let Some(color) = self.options.link_color {
                        self.format.color = color;
                    }
                    let link = self.element(ElementKind::Link, tag);
                    self.out.elements.push(link);
                }
                TagKind::End => {
                    self.pop_format();
                    let end = MarkupElement::new(ElementKind::LinkEnd, self.out.text.len());
                    self.out.elements.push(end);
                }
                TagKind::Void => {}
            },
            "img" if tag.opens() => self.push_entity(self.element(ElementKind::Image, tag)),
            "input" if tag.opens() => self.push_entity(self.element(ElementKind::Input, tag)),
            "object" if tag.opens() => self.push_entity(self.element(ElementKind::Object, tag)),
            "select" if tag.opens() => {
                let mut element = self.element(ElementKind::Select, tag);
                let consumed = if tag.kind == TagKind::Start {
                    let (items, values, consumed) = parse_options(rest);
                    element.set_list("items", items);
                    element.set_list("values", values);
                    consumed
                } else {
                    0
                };
                self.push_entity(element);
                return consumed;
            }
            _ => {}
        }
        0
    }

    fn element(&self, kind: ElementKind, tag: &Tag) -> MarkupElement {
        let mut element = MarkupElement::new(kind, self.out.text.len());
        element.name = tag.name.clone();
        element.format = self.format.clone();
        for (k, v) in &tag.attrs {
            element.set_attr(k.as_str(), v.as_str());
        }
        element
    }

    fn push_entity(&mut self, element: MarkupElement) {
        self.out.elements.push(element);
        self.out.text.push(ENTITY_PLACEHOLDER);
    }

    fn push_format(&mut self) {
        self.stack.push(self.format.clone());
    }

    fn pop_format(&mut self) {
        if let Some(format) = self.stack.pop() {
            self.format = format;
        }
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if let Some(emoji) = self.options.emojis.get(&ch) {
                let mut element = MarkupElement::new(ElementKind::Image, self.out.text.len());
                element.name = "img".to_string();
                element.format = self.format.clone();
                element.set_attr("src", emoji.url.as_str());
                element.set_attr("width", emoji.width.to_string());
                element.set_attr("height", emoji.height.to_string());
                self.push_entity(element);
                continue;
            }

            let index = self.out.text.len();
            let merge = self.out.elements.last().is_some_and(|last| {
                last.kind == ElementKind::Text && last.format == self.format
            });
            if !merge {
                self.out
                    .elements
                    .push(MarkupElement::text(index, self.format.clone()));
            }
            self.out.text.push(ch);
        }
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "b" | "i"
            | "u"
            | "s"
            | "strike"
            | "sub"
            | "sup"
            | "font"
            | "br"
            | "p"
            | "a"
            | "img"
            | "input"
            | "select"
            | "object"
    )
}

/// `size="+2"` and `size="-2"` are relative to the current size.
fn font_size(current: u32, value: &str) -> u32 {
    let value = value.trim();
    let parsed = value
        .trim_start_matches(['+', '-'])
        .parse::<u32>()
        .ok();
    match (value.chars().next(), parsed) {
        (Some('+'), Some(delta)) => current.saturating_add(delta),
        (Some('-'), Some(delta)) => current.saturating_sub(delta).max(1),
        (_, Some(size)) if size > 0 => size,
        _ => current,
    }
}

/// Reads `<option value="v">caption</option>` pairs up to `</select>`.
fn parse_options(src: &str) -> (Vec<String>, Vec<String>, usize) {
    let mut items = Vec::new();
    let mut values = Vec::new();
    let mut pos = 0;

    while let Some(open) = src[pos..].find('<') {
        let start = pos + open;
        let Some((tag, len)) = parse_tag(&src[start..]) else {
            pos = start + 1;
            continue;
        };
        pos = start + len;

        match (tag.name.as_str(), tag.kind) {
            ("select", TagKind::End) => return (items, values, pos),
            ("option", TagKind::Start) => {
                values.push(tag.attr("value").unwrap_or_default().to_string());
                let caption_end = src[pos..].find('<').map_or(src.len(), |i| pos + i);
                items.push(decode_entities(src[pos..caption_end].trim()));
                pos = caption_end;
            }
            ("option", TagKind::Void) => {
                values.push(tag.attr("value").unwrap_or_default().to_string());
                items.push(String::new());
            }
            _ => {}
        }
    }
    (items, values, src.len())
}

/// Parses the tag at the start of `s`. Returns `None` for anything malformed.
fn parse_tag(s: &str) -> Option<(Tag, usize)> {
    let mut quote = None;
    let close = s.char_indices().skip(1).find_map(|(i, c)| {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, '>') => return Some(i),
            (None, '<') => return Some(usize::MAX),
            _ => {}
        }
        None
    })?;
    if close == usize::MAX {
        return None;
    }

    let mut inner = s[1..close].trim();
    let kind = if let Some(name) = inner.strip_prefix('/') {
        inner = name.trim();
        TagKind::End
    } else if let Some(body) = inner.strip_suffix('/') {
        inner = body.trim_end();
        TagKind::Void
    } else {
        TagKind::Start
    };

    let name_len = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(inner.len());
    let name = &inner[..name_len];
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let attrs = parse_attrs(&inner[name_len..])?;
    if kind == TagKind::End && !attrs.is_empty() {
        return None;
    }

    Some((
        Tag {
            name: name.to_ascii_lowercase(),
            kind,
            attrs,
        },
        close + 1,
    ))
}

fn parse_attrs(mut s: &str) -> Option<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return Some(attrs);
        }

        let key_len = s
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(s.len());
        let key = s[..key_len].to_ascii_lowercase();
        if key.is_empty() {
            return None;
        }
        s = s[key_len..].trim_start();

        let Some(value_part) = s.strip_prefix('=') else {
            attrs.push((key, String::new()));
            continue;
        };
        let value_part = value_part.trim_start();

        let (value, rest) = match value_part.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let end = value_part[1..].find(q)? + 1;
                (&value_part[1..end], &value_part[end + 1..])
            }
            _ => {
                let end = value_part
                    .find(char::is_whitespace)
                    .unwrap_or(value_part.len());
                (&value_part[..end], &value_part[end..])
            }
        };
        attrs.push((key, decode_entities(value)));
        s = rest;
    }
}

/// Decodes the entity at the start of `s`, returning the char and its length.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let end = s.get(..12).unwrap_or(s).find(';')?;
    let name = &s[1..end];
    let ch = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)?
        }
    };
    Some((ch, end + 1))
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_entity(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn html(s: &str) -> ParsedText {
        parse(s, MarkupMode::Html, &TextFormat::default(), &ParseOptions::default())
    }

    fn plain(p: &ParsedText) -> String {
        p.text.iter().collect()
    }

    fn assert_anchoring(p: &ParsedText) {
        let mut last = 0;
        for e in &p.elements {
            assert!(e.char_index <= p.text.len());
            assert!(e.char_index >= last);
            last = e.char_index;
            if e.is_entity() {
                assert_eq!(p.text[e.char_index], ENTITY_PLACEHOLDER);
            }
        }
    }

    #[test]
    fn bold_run_then_plain_run() {
        let p = html("<b>Hi</b> there");
        assert_eq!(plain(&p), "Hi there");
        assert_eq!(p.text.len(), 8);
        assert_eq!(p.elements.len(), 2);
        assert_eq!(p.elements[0].kind, ElementKind::Text);
        assert_eq!(p.elements[0].char_index, 0);
        assert!(p.elements[0].format.bold);
        assert_eq!(p.elements[1].char_index, 2);
        assert!(!p.elements[1].format.bold);
        assert_anchoring(&p);
    }

    #[test]
    fn image_takes_one_slot() {
        let p = html("a<img src=\"x.png\" width=\"20\" height=\"20\"/>b");
        assert_eq!(p.text.len(), 3);
        let img = &p.elements[1];
        assert_eq!(img.kind, ElementKind::Image);
        assert_eq!(img.char_index, 1);
        assert_eq!(img.get_string("src"), Some("x.png"));
        assert_eq!(img.get_int("width", 0), 20);
        assert_anchoring(&p);
        assert_eq!(p.display_string(), "ab");
    }

    #[test]
    fn same_style_chunks_merge() {
        let p = html("a<!-- note -->b&amp;c<b></b>d");
        assert_eq!(plain(&p), "ab&cd");
        assert_eq!(p.elements.len(), 1);
    }

    #[test]
    fn unknown_and_malformed_tags_stay_literal() {
        let p = html("1 < 2 <blink>x</blink> <b");
        assert_eq!(plain(&p), "1 < 2 <blink>x</blink> <b");
        assert_eq!(p.elements.len(), 1);
        assert_eq!(plain(&html("&bogus; &#65;&#x42;")), "&bogus; AB");
    }

    #[test]
    fn font_sizes_and_colors() {
        let p = html("<font size=\"+4\" color=\"#00ff00\">a</font><font size=\"20\">b</font><font size=\"-20\">c</font>");
        assert_eq!(p.elements[0].format.size, 16);
        assert_eq!(p.elements[0].format.color, Color32::rgb(0, 255, 0));
        assert_eq!(p.elements[1].format.size, 20);
        assert_eq!(p.elements[2].format.size, 1);
    }

    #[test]
    fn links_emit_start_and_end() {
        let p = html("go <a href=\"event:buy\">buy</a>!");
        let kinds: Vec<_> = p.elements.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                ElementKind::Text,
                ElementKind::Link,
                ElementKind::Text,
                ElementKind::LinkEnd,
                ElementKind::Text
            ]
        );
        assert_eq!(p.elements[1].get_string("href"), Some("event:buy"));
        assert!(p.elements[2].format.underline);
        assert!(!p.elements[4].format.underline);
        assert_eq!(p.elements[3].char_index, 6);
    }

    #[test]
    fn select_collects_options() {
        let p = html("<select name=\"s\"><option value=\"1\">One</option><option value=\"2\">Two</option></select>!");
        assert_eq!(plain(&p).chars().count(), 2);
        let select = &p.elements[0];
        assert_eq!(select.kind, ElementKind::Select);
        assert_eq!(select.get_list("items"), ["One", "Two"]);
        assert_eq!(select.get_list("values"), ["1", "2"]);
    }

    #[test]
    fn newlines_are_normalized() {
        let p = parse(
            "a\r\nb\rc",
            MarkupMode::Plain,
            &TextFormat::default(),
            &ParseOptions::default(),
        );
        assert_eq!(plain(&p), "a\nb\nc");
        let p = html("a<br/>b<p align=\"center\">c</p>");
        assert_eq!(plain(&p), "a\nb\nc\n");
        assert_eq!(p.format_at(4, &TextFormat::default()).align, HorizontalAlign::Center);
    }

    #[test]
    fn emoji_becomes_image() {
        let mut options = ParseOptions::default();
        options.emojis.insert(
            '😀',
            Emoji {
                url: "ui://e/smile".into(),
                width: 16,
                height: 16,
            },
        );
        let p = parse("hi😀", MarkupMode::Plain, &TextFormat::default(), &options);
        assert_eq!(p.text.len(), 3);
        assert_eq!(p.elements[1].kind, ElementKind::Image);
        assert_eq!(p.elements[1].get_int("width", 0), 16);
        assert_anchoring(&p);
    }

    #[test]
    fn ubb_mode_goes_through_html() {
        let p = parse(
            "[b]x[/b]<y",
            MarkupMode::Ubb,
            &TextFormat::default(),
            &ParseOptions::default(),
        );
        assert_eq!(plain(&p), "x<y");
        assert!(p.elements[0].format.bold);
    }

    #[test]
    fn ignore_whitespace_drops_blank_chunks() {
        let options = ParseOptions {
            ignore_whitespace: true,
            ..Default::default()
        };
        let p = parse(
            "<p>\n  a </p>\n <b>b</b>",
            MarkupMode::Html,
            &TextFormat::default(),
            &options,
        );
        assert_eq!(plain(&p), "a\nb");
    }
}
