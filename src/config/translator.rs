//! Translation catalogs per locale.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::JSON_EXTENSION;

/// Errors raised while loading or querying translations.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// A requested language is not known to the [`Translator`].
    #[error("unknown language")]
    UnknownLanguage,

    /// A requested translation key is not known to a [`LanguageCatalog`].
    #[error("unknown translation key {key}")]
    UnknownKey { key: String },

    #[error("failed to read i18n folder: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk i18n folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to parse i18n file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Render the placeholder emitted for a missing translation key.
pub fn missing_key_marker(key: &str) -> String {
    format!("??{key}??")
}

/// A mapping from translation keys to their translations,
/// e.g. `"enum.country.de" => "Germany"`.
#[derive(Debug, Clone, Default)]
pub struct LanguageCatalog(HashMap<String, String>);

impl LanguageCatalog {
    /// Fetch the translation for a single key.
    pub fn translate(&self, key: &str) -> Result<&str, TranslationError> {
        self.0
            .get(key)
            .filter(|value| !value.is_empty())
            .map(String::as_str)
            .ok_or_else(|| TranslationError::UnknownKey {
                key: key.to_string(),
            })
    }

    /// All translation keys and their respective translations.
    pub fn entries(&self) -> &HashMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for LanguageCatalog {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Translates keys for different languages.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    languages: HashMap<String, LanguageCatalog>,
}

impl Translator {
    /// Build a translator from a folder. The first level of sub-folders
    /// names the locale; every JSON file inside a locale folder is merged
    /// flat into that locale's catalog (duplicate keys overwrite).
    ///
    /// ```text
    /// /folder
    /// ├── de/
    /// │   └── somefile.json
    /// └── en/
    ///     └── anotherfile.json
    /// ```
    pub fn from_folder(root: &Path) -> Result<Self, TranslationError> {
        let mut languages = HashMap::new();
        let mut min_keys: Option<usize> = None;
        let mut max_keys: Option<usize> = None;

        for folder in fs::read_dir(root)? {
            let folder = folder?;
            if !folder.file_type()?.is_dir() {
                continue;
            }

            let name = folder.file_name().to_string_lossy().into_owned();
            let catalog = load_catalog(&folder.path())?;
            let key_count = catalog.len();

            min_keys = Some(min_keys.map_or(key_count, |min| min.min(key_count)));
            max_keys = Some(max_keys.map_or(key_count, |max| max.max(key_count)));

            debug!(name = %name, keys = key_count, "assembled language");
            languages.insert(name, catalog);
        }

        info!(count = languages.len(), "loaded languages");

        if min_keys != max_keys {
            warn!("loaded languages with differing key counts - enable debug logging to identify languages");
        }

        Ok(Self { languages })
    }

    /// Build a translator from an already assembled locale → catalog map.
    pub fn from_catalogs(languages: HashMap<String, LanguageCatalog>) -> Self {
        Self { languages }
    }

    /// Shortcut for fetching a catalog and immediately translating a key.
    pub fn translate(&self, language: &str, key: &str) -> Result<&str, TranslationError> {
        self.language(language)?.translate(key)
    }

    /// Translate a key, falling back to the `??key??` marker when the key is
    /// missing. Missing keys are a warning, not a failure.
    pub fn translate_or_marker(&self, language: &str, key: &str) -> String {
        match self.translate(language, key) {
            Ok(translation) => translation.to_string(),
            Err(error) => {
                debug!(language, key, %error, "missing translation");
                missing_key_marker(key)
            }
        }
    }

    /// Retrieve a specific language catalog.
    pub fn language(&self, language: &str) -> Result<&LanguageCatalog, TranslationError> {
        self.languages
            .get(language)
            .ok_or(TranslationError::UnknownLanguage)
    }

    /// All language catalogs, in no particular order.
    pub fn languages(&self) -> impl Iterator<Item = &LanguageCatalog> {
        self.languages.values()
    }
}

fn load_catalog(path: &Path) -> Result<LanguageCatalog, TranslationError> {
    let mut catalog = HashMap::new();

    for entry in WalkDir::new(path) {
        let entry = entry?;
        let file_path = entry.path();

        if file_path.extension().and_then(|e| e.to_str()) == Some(JSON_EXTENSION) {
            let content = fs::read_to_string(file_path)?;
            let keys: HashMap<String, String> =
                serde_json::from_str(&content).map_err(|source| TranslationError::Json {
                    path: file_path.to_path_buf(),
                    source,
                })?;

            catalog.extend(keys);
        } else if entry.file_type().is_file() {
            debug!(file = %file_path.display(), "ignoring file, as not a json file");
        }
    }

    Ok(LanguageCatalog(catalog))
}
