use std::{collections::HashMap, path::PathBuf, sync::Arc};

/// Font database plus a cache of parsed `fontdue` faces.
///
/// `fontdb` indexes whatever was loaded (files, directories, system fonts,
/// raw binaries); faces are parsed with `fontdue` only when a text field
/// first asks for them by family name.
pub struct FontStorage {
    font_db: fontdb::Database,
    /// Parsed faces. Not every face known to `font_db` is parsed.
    loaded_font: HashMap<fontdb::ID, Arc<fontdue::Font>, fxhash::FxBuildHasher>,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    /// Creates an empty storage. Nothing is loaded, not even system fonts.
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            loaded_font: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }
}

/// Loading
impl FontStorage {
    /// Indexes every face in a font file already in memory. Data that is not
    /// a font is ignored.
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.font_db.load_font_data(data.into());
    }

    /// Indexes the faces of the font file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub fn load_font_file(&mut self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_db.load_font_file(path)
    }

    /// Indexes every font file under `dir`, recursively. Unreadable entries
    /// are skipped.
    pub fn load_fonts_dir(&mut self, dir: PathBuf) {
        self.font_db.load_fonts_dir(dir)
    }

    /// Indexes the fonts installed on the system.
    pub fn load_system_fonts(&mut self) {
        self.font_db.load_system_fonts();
    }

    /// Forgets face `id` along with its parsed copy, if any.
    pub fn remove_face(&mut self, id: fontdb::ID) {
        self.font_db.remove_face(id);
        self.loaded_font.remove(&id);
    }

    /// No face is indexed.
    pub fn is_empty(&self) -> bool {
        self.font_db.is_empty()
    }

    /// Number of indexed faces.
    pub fn len(&self) -> usize {
        self.font_db.len()
    }

    /// Family used when a text field asks for the generic sans-serif face.
    pub fn set_sans_serif_family(&mut self, family: impl Into<String>) {
        self.font_db.set_sans_serif_family(family);
    }

    /// Drops every parsed face and every indexed face.
    pub fn clear(&mut self) {
        self.font_db = fontdb::Database::new();
        self.loaded_font.clear();
    }
}

/// Face lookup
impl FontStorage {
    /// Finds a regular-weight face of `family` (case-insensitive).
    ///
    /// With `bold` the query asks for a bold weight and returns whatever
    /// `fontdb` considers the closest match.
    pub fn query_family(
        &mut self,
        family: &str,
        bold: bool,
    ) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        let name = self
            .font_db
            .faces()
            .flat_map(|face| face.families.iter())
            .find(|(name, _)| name.eq_ignore_ascii_case(family))
            .map(|(name, _)| name.clone())?;

        self.query(&fontdb::Query {
            families: &[fontdb::Family::Name(&name)],
            weight: weight_for(bold),
            ..Default::default()
        })
    }

    /// Finds the generic sans-serif face.
    pub fn query_sans_serif(&mut self, bold: bool) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        self.query(&fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            weight: weight_for(bold),
            ..Default::default()
        })
    }

    /// Runs a raw `fontdb` query and parses the matching face.
    pub fn query(&mut self, query: &fontdb::Query) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        let id = self.font_db.query(query)?;
        self.font(id).map(|font| (id, font))
    }

    /// Returns the parsed face for `id`, parsing it on first use.
    pub fn font(&mut self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        use std::collections::hash_map::Entry;

        match self.loaded_font.entry(id) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let font_result = self.font_db.with_face_data(id, |data, index| {
                    fontdue::Font::from_bytes(
                        data,
                        fontdue::FontSettings {
                            collection_index: index,
                            scale: 40.0,
                            load_substitutions: true,
                        },
                    )
                })?;

                match font_result {
                    Ok(font) => Some(Arc::clone(entry.insert(Arc::new(font)))),
                    Err(e) => {
                        log::error!("Failed to load font (id: {:?}): {}", id, e);
                        None
                    }
                }
            }
        }
    }

    /// Whether the indexed face is itself a bold face.
    pub fn is_bold_face(&self, id: fontdb::ID) -> bool {
        self.font_db
            .face(id)
            .is_some_and(|face| face.weight >= fontdb::Weight::SEMIBOLD)
    }

    /// Sorted, deduplicated family names of every indexed face.
    pub fn family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .font_db
            .faces()
            .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn weight_for(bold: bool) -> fontdb::Weight {
    if bold {
        fontdb::Weight::BOLD
    } else {
        fontdb::Weight::NORMAL
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_storage_finds_nothing() {
        let mut storage = FontStorage::new();
        assert!(storage.is_empty());
        assert!(storage.query_family("Arial", false).is_none());
        assert!(storage.query_sans_serif(false).is_none());
        assert!(storage.family_names().is_empty());
    }

    #[test]
    fn garbage_binary_is_not_indexed() {
        let mut storage = FontStorage::new();
        storage.load_font_binary(vec![0u8; 16]);
        assert!(storage.is_empty());
        storage.clear();
        assert_eq!(storage.len(), 0);
    }

    #[test]
    fn missing_paths_leave_storage_empty() {
        let mut storage = FontStorage::new();
        let missing = std::env::temp_dir().join("glyphweave-no-such-font.ttf");
        assert!(storage.load_font_file(missing.clone()).is_err());
        storage.load_fonts_dir(missing.with_extension(""));
        assert!(storage.is_empty());
        assert!(storage.query(&fontdb::Query::default()).is_none());
    }
}
