//! Enum assets: assignments of enum keys to translation keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::JSON_EXTENSION;

/// Errors raised while loading or querying enums.
#[derive(Debug, Error)]
pub enum EnumError {
    /// A requested enum is not known to an [`EnumMapper`].
    #[error("unknown enum")]
    UnknownEnum,

    /// A requested key is not known to an [`Enum`].
    #[error("unknown enum key")]
    UnknownKey,

    #[error("failed to read enum folder: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk enum folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to parse enum file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// An assignment of enum keys to translation keys,
/// e.g. `"DE" => "enum.country.de"`.
///
/// Entries are kept in key order so that derived orderings are stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enum(BTreeMap<String, String>);

/// A tuple of an enumeration key and its translation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWithTranslation {
    pub enum_key: String,
    pub translation_key: String,
}

impl Enum {
    /// Retrieve the translation key for a single enum key.
    pub fn translation_key(&self, key: &str) -> Result<&str, EnumError> {
        self.0
            .get(key)
            .filter(|value| !value.is_empty())
            .map(String::as_str)
            .ok_or(EnumError::UnknownKey)
    }

    /// All enum keys and their respective translation keys, in key order.
    pub fn entries(&self) -> Vec<KeyWithTranslation> {
        self.0
            .iter()
            .map(|(enum_key, translation_key)| KeyWithTranslation {
                enum_key: enum_key.clone(),
                translation_key: translation_key.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Enum {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A mapper from enum names to their key/translation assignments.
#[derive(Debug, Clone, Default)]
pub struct EnumMapper {
    enums: BTreeMap<String, Enum>,
}

impl EnumMapper {
    /// Build an enum mapper from a folder, recursively loading every JSON
    /// file found in there. The enum name is the file path relative to the
    /// root (minus extension) with separators stripped; casing is preserved.
    pub fn from_folder(root: &Path) -> Result<Self, EnumError> {
        let mut enums = BTreeMap::new();

        for entry in WalkDir::new(root) {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) == Some(JSON_EXTENSION) {
                let content = fs::read_to_string(path)?;
                let keys: BTreeMap<String, String> =
                    serde_json::from_str(&content).map_err(|source| EnumError::Json {
                        path: path.to_path_buf(),
                        source,
                    })?;

                enums.insert(normalize_enum_name(path, root), Enum(keys));
            } else if entry.file_type().is_file() {
                debug!(file = %path.display(), "ignoring file, as not a json file");
            }
        }

        info!(count = enums.len(), "loaded enums");

        Ok(Self { enums })
    }

    /// Build an enum mapper from an already assembled name → enum map.
    pub fn from_enums(enums: BTreeMap<String, Enum>) -> Self {
        Self { enums }
    }

    /// Retrieve a specific enum.
    pub fn enum_for(&self, name: &str) -> Result<&Enum, EnumError> {
        self.enums.get(name).ok_or(EnumError::UnknownEnum)
    }

    /// Shortcut for fetching an enum and immediately resolving a key in it.
    pub fn translation_key_in_enum(&self, name: &str, key: &str) -> Result<&str, EnumError> {
        self.enum_for(name)?.translation_key(key)
    }

    /// All enums known to the mapper.
    pub fn enums(&self) -> impl Iterator<Item = &Enum> {
        self.enums.values()
    }
}

/// The enum name is the relative path minus extension, separators removed.
fn normalize_enum_name(enum_path: &Path, root: &Path) -> String {
    let relative = enum_path.strip_prefix(root).unwrap_or(enum_path);
    let without_ext = relative.with_extension("");

    without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .concat()
}
