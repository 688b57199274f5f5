use std::collections::HashMap;

use euclid::default::{Point2D, Size2D};

use crate::text::{Color32, InlineObject, TextFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Starts a run of text with its own format.
    Text,
    /// Opens a link; the run ends at the matching [`ElementKind::LinkEnd`].
    Link,
    Image,
    Input,
    Select,
    Object,
    LinkEnd,
}

impl ElementKind {
    /// Entities occupy one placeholder character in the plain text.
    pub fn is_entity(self) -> bool {
        matches!(self, Self::Image | Self::Input | Self::Select | Self::Object)
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ElementStatus: u8 {
        /// Outside the visible rect during the last compose.
        const CLIPPED = 1;
        /// The inline object is attached to the host.
        const ADDED = 2;
        /// Hidden by a consumer such as the typing effect.
        const HIDDEN = 4;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(String),
    List(Vec<String>),
}

/// One typed unit produced by the markup parser.
///
/// `char_index` anchors the element into the plain-text buffer. Elements are
/// ordered by non-decreasing `char_index`.
#[derive(Debug)]
pub struct MarkupElement {
    pub kind: ElementKind,
    /// Tag name the element was parsed from.
    pub name: String,
    pub char_index: usize,
    /// Only meaningful for [`ElementKind::Text`].
    pub format: TextFormat,
    pub status: ElementStatus,
    /// Width left on the line when the entity was laid out.
    pub space: f32,
    /// Top-left corner of the inline object in content space.
    pub position: Point2D<f32>,
    /// Size of the inline object as measured by the last layout.
    pub size: Size2D<f32>,
    pub object: Option<InlineObject>,
    attrs: HashMap<String, AttrValue, fxhash::FxBuildHasher>,
}

impl MarkupElement {
    pub fn new(kind: ElementKind, char_index: usize) -> Self {
        Self {
            kind,
            name: String::new(),
            char_index,
            format: TextFormat::default(),
            status: ElementStatus::empty(),
            space: 0.0,
            position: Point2D::zero(),
            size: Size2D::zero(),
            object: None,
            attrs: HashMap::default(),
        }
    }

    pub fn text(char_index: usize, format: TextFormat) -> Self {
        Self {
            format,
            ..Self::new(ElementKind::Text, char_index)
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn is_entity(&self) -> bool {
        self.kind.is_entity()
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs
            .insert(name.into().to_ascii_lowercase(), AttrValue::Str(value.into()));
    }

    pub fn set_list(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attrs
            .insert(name.into().to_ascii_lowercase(), AttrValue::List(values));
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name)? {
            AttrValue::Str(s) => Some(s),
            AttrValue::List(_) => None,
        }
    }

    pub fn get_string_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get_string(name).unwrap_or(default)
    }

    pub fn get_list(&self, name: &str) -> &[String] {
        match self.attrs.get(name) {
            Some(AttrValue::List(values)) => values,
            _ => &[],
        }
    }

    /// Integer attribute. Fractional values are truncated, garbage yields `default`.
    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        let Some(s) = self.get_string(name).map(str::trim) else {
            return default;
        };
        s.parse::<i32>()
            .ok()
            .or_else(|| s.parse::<f32>().ok().filter(|v| v.is_finite()).map(|v| v as i32))
            .unwrap_or(default)
    }

    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        self.get_string(name)
            .and_then(|s| s.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get_string(name).map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "true" || s == "1" => true,
            Some(s) if s == "false" || s == "0" => false,
            _ => default,
        }
    }

    pub fn get_color(&self, name: &str, default: Color32) -> Color32 {
        self.get_string(name)
            .and_then(Color32::from_hex)
            .unwrap_or(default)
    }
}
