use std::{collections::HashMap, path::PathBuf, sync::Arc};

use parking_lot::Mutex;

use crate::{
    font_storage::FontStorage,
    glyph_atlas::AtlasConfig,
    glyph_source::{self, BoxGlyphSource, FontdueGlyphSource, SharedGlyphSource},
};

/// Name under which the system sans-serif face is cached.
const SYSTEM_FONT_KEY: &str = "\u{0}sans-serif";

/// Owner of every glyph source used by text fields.
///
/// A registry is created by the host, shared behind an `Arc`, and torn down
/// with [`FontRegistry::clear`]. All methods take `&self`; state lives behind
/// `parking_lot` locks like the rest of the crate.
///
/// The storage is public for callers that need direct, lock-held access to
/// the `fontdb` database.
pub struct FontRegistry {
    pub font_storage: Mutex<FontStorage>,
    sources: Mutex<HashMap<String, SharedGlyphSource, fxhash::FxBuildHasher>>,
    default_font: Mutex<String>,
    fallback: SharedGlyphSource,
    atlas_config: AtlasConfig,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::with_atlas_config(AtlasConfig::default())
    }

    /// Atlas settings used for every face loaded from font storage.
    pub fn with_atlas_config(atlas_config: AtlasConfig) -> Self {
        Self {
            font_storage: Mutex::new(FontStorage::new()),
            sources: Mutex::new(HashMap::with_hasher(fxhash::FxBuildHasher::default())),
            default_font: Mutex::new(String::new()),
            fallback: glyph_source::share(BoxGlyphSource::new()),
            atlas_config,
        }
    }
}

/// font storage initialization
impl FontRegistry {
    pub fn load_system_fonts(&self) {
        self.font_storage.lock().load_system_fonts();
    }

    pub fn load_font_binary(&self, data: impl Into<Vec<u8>>) {
        self.font_storage.lock().load_font_binary(data);
    }

    pub fn load_font_file(&self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_storage.lock().load_font_file(path)
    }

    pub fn load_fonts_dir(&self, dir: PathBuf) {
        self.font_storage.lock().load_fonts_dir(dir)
    }

    pub fn set_sans_serif_family(&self, family: impl Into<String>) {
        self.font_storage.lock().set_sans_serif_family(family);
    }
}

/// registration and lookup
impl FontRegistry {
    /// Registers `source` under `name`, replacing any previous source.
    pub fn register(&self, name: impl Into<String>, source: SharedGlyphSource) {
        let name = name.into();
        if self.sources.lock().insert(name.clone(), source).is_some() {
            log::debug!("Font '{}' re-registered.", name);
        }
    }

    pub fn unregister(&self, name: &str) -> Option<SharedGlyphSource> {
        self.sources.lock().remove(name)
    }

    /// Name used when a format names no font or an unknown one.
    pub fn set_default_font(&self, name: impl Into<String>) {
        *self.default_font.lock() = name.into();
    }

    pub fn default_font(&self) -> String {
        self.default_font.lock().clone()
    }

    /// Resolves `name` to a glyph source. Never fails.
    ///
    /// Lookup order: registered source, face of that family in font storage,
    /// the default font, the system sans-serif face, and finally the
    /// built-in [`BoxGlyphSource`].
    pub fn get_font(&self, name: &str) -> SharedGlyphSource {
        let default_name = self.default_font();
        let name = if name.is_empty() {
            default_name.as_str()
        } else {
            name
        };

        if let Some(source) = self.lookup(name) {
            return source;
        }

        if name != default_name {
            log::warn!("Font '{}' not found, falling back to default font.", name);
            if let Some(source) = self.lookup(&default_name) {
                return source;
            }
        }

        if let Some(source) = self.system_font() {
            return source;
        }

        Arc::clone(&self.fallback)
    }

    /// The last-resort source every failed lookup ends in.
    pub fn fallback_font(&self) -> SharedGlyphSource {
        Arc::clone(&self.fallback)
    }

    /// Drops every registered and loaded source together with the font storage.
    pub fn clear(&self) {
        self.sources.lock().clear();
        self.default_font.lock().clear();
        self.font_storage.lock().clear();
    }

    fn lookup(&self, name: &str) -> Option<SharedGlyphSource> {
        if name.is_empty() {
            return None;
        }
        if let Some(source) = self.sources.lock().get(name) {
            return Some(Arc::clone(source));
        }

        let loaded = {
            let mut storage = self.font_storage.lock();
            storage
                .query_family(name, false)
                .map(|(id, font)| (storage.is_bold_face(id), font))
        };
        let (bold, font) = loaded?;
        log::debug!("Loaded font '{}' from font storage.", name);
        Some(self.cache_source(name, font, bold))
    }

    fn system_font(&self) -> Option<SharedGlyphSource> {
        if let Some(source) = self.sources.lock().get(SYSTEM_FONT_KEY) {
            return Some(Arc::clone(source));
        }

        let loaded = {
            let mut storage = self.font_storage.lock();
            storage
                .query_sans_serif(false)
                .map(|(id, font)| (storage.is_bold_face(id), font))
        };
        let (bold, font) = loaded?;
        Some(self.cache_source(SYSTEM_FONT_KEY, font, bold))
    }

    fn cache_source(&self, key: &str, font: Arc<fontdue::Font>, bold: bool) -> SharedGlyphSource {
        let source = glyph_source::share(
            FontdueGlyphSource::new(font, &self.atlas_config).with_native_bold(bold),
        );
        self.sources
            .lock()
            .entry(key.to_string())
            .or_insert(source)
            .clone()
    }
}
