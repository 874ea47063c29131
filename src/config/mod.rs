//! Configuration assets: table schemas, enums and translation catalogs.
//!
//! All assets are loaded once at startup from JSON folders and are immutable
//! afterwards, so they can be shared read-only across concurrent requests.

pub mod enumeration;
pub mod schema;
pub mod settings;
pub mod translator;

pub use enumeration::{Enum, EnumMapper, KeyWithTranslation};
pub use schema::{ResolvedTableSchema, SchemaMapper, TableSchema, TableSchemaColumn};
pub use settings::Settings;
pub use translator::{LanguageCatalog, Translator};

use thiserror::Error;

pub(crate) const JSON_EXTENSION: &str = "json";

/// Errors that can occur while loading the combined asset folders.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),

    #[error(transparent)]
    Enum(#[from] enumeration::EnumError),

    #[error(transparent)]
    Translation(#[from] translator::TranslationError),
}

/// The full set of startup assets.
#[derive(Debug, Clone)]
pub struct Assets {
    pub schemas: SchemaMapper,
    pub enums: EnumMapper,
    pub translator: Translator,
}

impl Assets {
    /// Load schemas, enums and translations from the folders named in the
    /// given settings.
    pub fn load(settings: &Settings) -> Result<Self, AssetError> {
        let schemas = SchemaMapper::from_folder(&settings.assets.schema_dir)?;
        let enums = EnumMapper::from_folder(&settings.assets.enum_dir)?;
        let translator = Translator::from_folder(&settings.assets.i18n_dir)?;

        Ok(Self {
            schemas,
            enums,
            translator,
        })
    }
}
