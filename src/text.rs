/// Styles shared by every run of text.
pub mod format;
/// Markup elements and their attributes.
pub mod element;
/// HTML and UBB parsing into plain characters plus elements.
pub mod markup;
/// Paragraph direction and visual reordering.
pub mod bidi;
/// Line breaking, auto sizing and shrinking.
pub mod layout;
/// Vertex buffer generation from a line layout.
pub mod mesh;
/// Objects embedded in the text flow and their pool.
pub mod inline_object;
/// Hit testing and selection geometry.
pub mod caret;
/// The text field facade tying parsing, layout and mesh together.
pub mod field;
/// Typewriter reveal.
pub mod typing;

pub use bidi::TextDirection;
pub use element::{AttrValue, ElementKind, ElementStatus, MarkupElement};
pub use field::{TextField, TextFieldSettings};
pub use format::{AutoSize, Color32, HorizontalAlign, SpecialStyle, TextFormat, VerticalAlign};
pub use inline_object::{
    InlineHost, InlineNode, InlineObject, InlineObjectKind, InlineObjectPool, ObjectState,
    ResourceInfo,
};
pub use layout::{EntitySizer, LayoutConfig, Line, LineBreaker, LineLayout};
pub use markup::{Emoji, MarkupMode, ParseOptions, ParsedText};
pub use mesh::{CharPosition, ComposedText, LinkArea, MeshComposer, MeshData};
pub use typing::TypingEffect;
