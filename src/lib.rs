//! # Glyphweave
//!
//! Rich text layout and mesh generation for UI runtimes.
//!
//! ## Overview
//!
//! A [`text::TextField`] takes plain, HTML or UBB markup, breaks it into lines
//! using fonts from a shared [`FontRegistry`], and produces a vertex buffer
//! ([`text::MeshData`]) plus per-character positions for hit testing. Images,
//! inputs and other embedded objects are laid out as part of the text flow and
//! handed to the host through [`text::InlineHost`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glyphweave::{FontRegistry, text::TextField};
//!
//! // 1. Create a registry and load fonts
//! let registry = Arc::new(FontRegistry::new());
//! registry.load_system_fonts();
//!
//! // 2. Create a field and give it markup
//! let mut field = TextField::new(registry);
//! field.set_size(240.0, 60.0);
//! field.set_html("Hello <b>world</b>, <font color='#ff0000'>red</font> text");
//!
//! // 3. Build, then read back the geometry
//! field.ensure_mesh();
//! let mesh = field.mesh();
//! println!("{} vertices", mesh.vertex_count());
//! ```
//!
//! ## Features
//!
//! *   **Markup**: HTML subset, UBB and template variables.
//! *   **Layout**: Word wrap, auto sizing, shrink to fit and ellipsis.
//! *   **Effects**: Outline, shadow, faux bold, italic, gradients and typing reveal.
//! *   **Thread Safety**: Fonts are shared behind internal locks.

pub mod byte_buffer;
pub mod ease;
pub mod font_registry;
pub mod font_storage;
pub mod glyph_atlas;
pub mod glyph_source;
pub mod path;
pub mod text;

// common re-exports
pub use byte_buffer::{BufferError, ByteBuffer};
pub use font_registry::FontRegistry;
pub use font_storage::FontStorage;
pub use glyph_source::{BoxGlyphSource, FontdueGlyphSource, GlyphSource, SharedGlyphSource};

// re-export dependencies
pub use fontdb;
pub use fontdue;
pub use parking_lot;
