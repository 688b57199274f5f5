use euclid::default::Vector2D;

/// Scale applied to the point size of superscript and subscript runs.
pub const SPECIAL_STYLE_SCALE: f32 = 0.58;
/// How far a superscript glyph is lifted, as a fraction of the run size.
pub const SUPERSCRIPT_RISE: f32 = 0.4;
/// How far a subscript glyph is dropped, as a fraction of the run size.
pub const SUBSCRIPT_DROP: f32 = 0.2;

/// 8-bit RGBA color used for vertex colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#RRGGBB` or `#AARRGGBB`. The leading `#` is optional.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();

        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
            _ => None,
        }
    }
}

impl Default for Color32 {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<Color32> for [f32; 4] {
    fn from(c: Color32) -> Self {
        [
            c.r as f32 / 255.0,
            c.g as f32 / 255.0,
            c.b as f32 / 255.0,
            c.a as f32 / 255.0,
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Horizontal justification applied to each line.
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl HorizontalAlign {
    /// Parses the markup spelling (`left`, `center`, `right`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" | "middle" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::Center,
            2 => Self::Right,
            _ => Self::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Vertical alignment of the whole text block inside the content rect.
pub enum VerticalAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

impl VerticalAlign {
    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::Middle,
            2 => Self::Bottom,
            _ => Self::Top,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpecialStyle {
    #[default]
    None,
    Superscript,
    Subscript,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// How the content rect reacts to the measured text.
pub enum AutoSize {
    /// Fixed rect; overflow is clipped.
    #[default]
    None,
    /// The rect follows the text in both directions. Wrapping is disabled.
    Both,
    /// Width is fixed, height follows the text.
    Height,
    /// Fixed rect; the font is scaled down until the text fits.
    Shrink,
    /// Fixed rect; overflow is cut and marked with an ellipsis glyph.
    Ellipsis,
}

impl AutoSize {
    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::Both,
            2 => Self::Height,
            3 => Self::Shrink,
            4 => Self::Ellipsis,
            _ => Self::None,
        }
    }
}

/// Immutable style snapshot applied to a run of text.
///
/// Fields are public for convenient construction, but the owning text field
/// treats a format as a whole: replacing it always triggers a full relayout.
#[derive(Clone, Debug, PartialEq)]
pub struct TextFormat {
    /// Point size before any auto-size scaling.
    pub size: u32,
    /// Registered font name; empty means the registry default.
    pub font: String,
    pub color: Color32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    /// Extra horizontal space between glyphs, in pixels.
    pub letter_spacing: f32,
    /// Extra vertical space between lines, in pixels.
    pub line_spacing: f32,
    pub align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
    pub outline: f32,
    pub outline_color: Color32,
    pub shadow_offset: Vector2D<f32>,
    pub shadow_color: Color32,
    /// Per-vertex colors in quad order: bottom-left, top-left, top-right, bottom-right.
    pub gradient: Option<[Color32; 4]>,
    pub special_style: SpecialStyle,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            size: 12,
            font: String::new(),
            color: Color32::BLACK,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            letter_spacing: 0.0,
            line_spacing: 3.0,
            align: HorizontalAlign::Left,
            vertical_align: VerticalAlign::Top,
            outline: 0.0,
            outline_color: Color32::BLACK,
            shadow_offset: Vector2D::zero(),
            shadow_color: Color32::BLACK,
            gradient: None,
            special_style: SpecialStyle::None,
        }
    }
}

impl TextFormat {
    /// Point size after applying the auto-size scale.
    ///
    /// Floors to whole points so that shrink-to-fit search over integer
    /// sizes maps one-to-one onto rendered sizes.
    pub fn scaled_size(&self, scale: f32) -> f32 {
        if scale == 1.0 {
            return self.size as f32;
        }
        (self.size as f32 * scale + 1e-3).floor().max(1.0)
    }

    /// Size a glyph source should rasterize at.
    pub fn glyph_size(&self, scale: f32) -> f32 {
        let size = self.scaled_size(scale);
        match self.special_style {
            SpecialStyle::None => size,
            SpecialStyle::Superscript | SpecialStyle::Subscript => {
                (size * SPECIAL_STYLE_SCALE).round().max(1.0)
            }
        }
    }

    /// Vertical baseline shift in y-down space (negative lifts the glyph).
    pub fn baseline_shift(&self, scale: f32) -> f32 {
        let size = self.scaled_size(scale);
        match self.special_style {
            SpecialStyle::None => 0.0,
            SpecialStyle::Superscript => -(size * SUPERSCRIPT_RISE).round(),
            SpecialStyle::Subscript => (size * SUBSCRIPT_DROP).round(),
        }
    }

    pub fn has_outline(&self) -> bool {
        self.outline != 0.0
    }

    pub fn has_shadow(&self) -> bool {
        self.shadow_offset.x != 0.0 || self.shadow_offset.y != 0.0
    }

    pub fn is_special(&self) -> bool {
        self.special_style != SpecialStyle::None
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_html_colors() {
        assert_eq!(Color32::from_hex("#ff0000"), Some(Color32::rgb(255, 0, 0)));
        assert_eq!(
            Color32::from_hex("#80FF0000"),
            Some(Color32::rgba(255, 0, 0, 0x80))
        );
        assert_eq!(Color32::from_hex("00ff00"), Some(Color32::rgb(0, 255, 0)));
        assert_eq!(Color32::from_hex("#fff"), None);
        assert_eq!(Color32::from_hex("#gg0000"), None);
    }

    #[test]
    fn scaled_size_floors_to_whole_points() {
        let format = TextFormat {
            size: 12,
            ..Default::default()
        };
        for target in 1..=12u32 {
            let scale = target as f32 / 12.0;
            assert_eq!(format.scaled_size(scale), target as f32);
        }
        assert_eq!(format.scaled_size(0.0), 1.0);
    }

    #[test]
    fn superscript_is_smaller_and_lifted() {
        let format = TextFormat {
            size: 20,
            special_style: SpecialStyle::Superscript,
            ..Default::default()
        };
        assert!(format.glyph_size(1.0) < 20.0);
        assert!(format.baseline_shift(1.0) < 0.0);

        let sub = TextFormat {
            special_style: SpecialStyle::Subscript,
            ..format
        };
        assert!(sub.baseline_shift(1.0) > 0.0);
    }
}
