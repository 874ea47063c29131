//! Table schema model and resolution.
//!
//! A [`TableSchema`] is declared in config and may *extend* other schemas
//! (inlining their columns under a substitution prefix) and *exclude* column
//! paths by string prefix. Resolution flattens this into a
//! [`ResolvedTableSchema`] with an addressable column space.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::enumeration::EnumMapper;
use super::JSON_EXTENSION;

/// Errors raised while loading, resolving or validating table schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A requested schema is not known to the [`SchemaMapper`].
    #[error("unknown schema")]
    UnknownSchema,

    /// A requested column is not known to a [`ResolvedTableSchema`].
    #[error("unknown column")]
    UnknownColumn,

    /// A schema referenced by an extension could not be found.
    #[error("cannot resolve table schema {schema}")]
    Unresolvable { schema: String },

    /// Schema extensions reference each other in a cycle.
    #[error("schema extensions form a cycle at {schema}")]
    ExtensionCycle { schema: String },

    /// A column type is neither primitive nor a known enum.
    #[error("unknown column type {column_type} in column {column} of schema {schema}")]
    UnknownColumnType {
        schema: String,
        column: String,
        column_type: String,
    },

    #[error("failed to read schema folder: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk schema folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to parse schema file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

const VALID_COLUMN_TYPES: [&str; 6] = ["boolean", "integer", "long", "string", "date", "datetime"];

/// The schema for a single table, with all its meta data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Physical table name, lower-case.
    pub entity: String,

    /// References to other schemas whose columns are inlined.
    pub extensions: Vec<TableSchemaExtension>,

    /// Column path prefixes eliminated after resolution.
    pub exclusions: Vec<String>,

    pub columns: Vec<TableSchemaColumn>,
}

/// A single column of a [`TableSchema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableSchemaColumn {
    pub title: String,

    /// Descriptor-form dotted identifier; the first segment must equal the
    /// owning schema's entity.
    pub path: String,

    /// Either a primitive type or the name of a known enum.
    #[serde(rename = "type")]
    pub column_type: String,

    /// Registered filter strategy key; empty selects the default.
    pub filter: String,

    /// Registered sorter key; empty selects the default.
    pub order: String,

    /// Registered path resolver key; empty selects the default.
    pub path_resolver: String,

    /// Opaque hints passed through to frontend consumers.
    pub frontend_hints: serde_json::Map<String, serde_json::Value>,
}

impl TableSchemaColumn {
    /// A bare column carrying only a path, with every strategy defaulted.
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// An extension of one [`TableSchema`] to another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchemaExtension {
    pub title: String,

    /// Name of the extended schema, as keyed in the [`SchemaMapper`].
    pub table: String,

    /// Optional extra path segment under which the extended columns appear.
    pub key: String,
}

impl TableSchema {
    /// Check that every column type is either primitive or a known enum.
    pub fn validate_integrity(&self, enums: &EnumMapper) -> Result<(), SchemaError> {
        for column in &self.columns {
            let lowered = column.column_type.to_lowercase();
            if VALID_COLUMN_TYPES.contains(&lowered.as_str()) {
                continue;
            }

            if enums.enum_for(&column.column_type).is_err() {
                return Err(SchemaError::UnknownColumnType {
                    schema: self.entity.clone(),
                    column: column.path.clone(),
                    column_type: column.column_type.clone(),
                });
            }
        }

        Ok(())
    }
}

/// A [`TableSchema`] with all extensions resolved, exclusions applied and
/// columns addressable by path.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTableSchema {
    original_schema: TableSchema,
    columns: Vec<TableSchemaColumn>,
    columns_map: HashMap<String, TableSchemaColumn>,
}

impl ResolvedTableSchema {
    /// The original schema without extended columns.
    pub fn original_schema(&self) -> &TableSchema {
        &self.original_schema
    }

    /// Retrieve a single column by path.
    pub fn column(&self, path: &str) -> Result<&TableSchemaColumn, SchemaError> {
        self.columns_map.get(path).ok_or(SchemaError::UnknownColumn)
    }

    /// All columns in resolved order.
    pub fn columns(&self) -> &[TableSchemaColumn] {
        &self.columns
    }
}

/// Maps schema names to their plain and resolved forms.
#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    schemas: HashMap<String, TableSchema>,
    resolved_schemas: HashMap<String, ResolvedTableSchema>,
}

impl SchemaMapper {
    /// Build a schema mapper from a folder, recursively loading every JSON
    /// file found in there. The schema name is the file path relative to the
    /// root (minus extension), lower-cased, with separators normalised
    /// to `/`.
    pub fn from_folder(root: &Path) -> Result<Self, SchemaError> {
        let root = root.canonicalize()?;

        let mut schemas = HashMap::new();
        for entry in WalkDir::new(&root) {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) == Some(JSON_EXTENSION) {
                let content = fs::read_to_string(path)?;
                let schema: TableSchema =
                    serde_json::from_str(&content).map_err(|source| SchemaError::Json {
                        path: path.to_path_buf(),
                        source,
                    })?;

                schemas.insert(normalize_schema_key(path, &root), schema);
            } else if entry.file_type().is_file() {
                debug!(file = %path.display(), "ignoring file, as not a json file");
            }
        }

        info!(count = schemas.len(), "loaded table schemas");

        Self::from_schemas(schemas)
    }

    /// Build a schema mapper from an already assembled name → schema map.
    pub fn from_schemas(schemas: HashMap<String, TableSchema>) -> Result<Self, SchemaError> {
        let mut resolved_schemas = HashMap::with_capacity(schemas.len());

        for (name, schema) in &schemas {
            let columns = resolve_columns(schema, &schemas)?;

            let columns_map = columns
                .iter()
                .map(|column| (column.path.clone(), column.clone()))
                .collect();

            resolved_schemas.insert(
                name.clone(),
                ResolvedTableSchema {
                    original_schema: schema.clone(),
                    columns,
                    columns_map,
                },
            );
        }

        Ok(Self {
            schemas,
            resolved_schemas,
        })
    }

    /// Retrieve a specific schema.
    pub fn schema(&self, name: &str) -> Result<&TableSchema, SchemaError> {
        self.schemas.get(name).ok_or(SchemaError::UnknownSchema)
    }

    /// All schemas known to the mapper, in no particular order.
    pub fn schemas(&self) -> impl Iterator<Item = &TableSchema> {
        self.schemas.values()
    }

    /// Retrieve a specific resolved schema.
    pub fn resolved_schema(&self, name: &str) -> Result<&ResolvedTableSchema, SchemaError> {
        self.resolved_schemas
            .get(name)
            .ok_or(SchemaError::UnknownSchema)
    }

    /// All resolved schemas, mapped by their name.
    pub fn resolved_schemas(&self) -> &HashMap<String, ResolvedTableSchema> {
        &self.resolved_schemas
    }

    /// Check every schema known to the mapper for integrity.
    pub fn validate_integrity(&self, enums: &EnumMapper) -> Result<(), SchemaError> {
        for schema in self.schemas.values() {
            schema.validate_integrity(enums)?;
        }

        Ok(())
    }
}

/// Calculate the name of a schema from its path relative to the schema root.
fn normalize_schema_key(schema_path: &Path, root: &Path) -> String {
    let relative = schema_path.strip_prefix(root).unwrap_or(schema_path);
    let without_ext = relative.with_extension("");

    let segments: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect();

    segments.join("/")
}

fn resolve_columns(
    schema: &TableSchema,
    all_schemas: &HashMap<String, TableSchema>,
) -> Result<Vec<TableSchemaColumn>, SchemaError> {
    let mut visiting = Vec::new();
    let mut columns = resolve_columns_with_prefix(schema, all_schemas, "", &mut visiting)?;

    if !schema.exclusions.is_empty() {
        let before = columns.len();
        columns.retain(|column| {
            !schema
                .exclusions
                .iter()
                .any(|exclusion| column.path.starts_with(exclusion.as_str()))
        });

        debug!(
            columns = before - columns.len(),
            schema = %schema.entity,
            "removed excluded columns from schema"
        );
    }

    Ok(columns)
}

fn resolve_columns_with_prefix(
    schema: &TableSchema,
    all_schemas: &HashMap<String, TableSchema>,
    prefix: &str,
    visiting: &mut Vec<String>,
) -> Result<Vec<TableSchemaColumn>, SchemaError> {
    let mut columns: Vec<TableSchemaColumn> = schema
        .columns
        .iter()
        .map(|column| resolve_column_with_prefix(column, prefix))
        .collect();

    for extension in &schema.extensions {
        let target = all_schemas
            .get(&extension.table)
            .ok_or_else(|| SchemaError::Unresolvable {
                schema: extension.table.clone(),
            })?;

        if visiting.iter().any(|seen| seen == &extension.table) {
            return Err(SchemaError::ExtensionCycle {
                schema: extension.table.clone(),
            });
        }

        let mut extension_prefix = if prefix.is_empty() {
            schema.entity.clone()
        } else {
            prefix.to_string()
        };

        if !extension_prefix.is_empty() && !extension.key.is_empty() {
            extension_prefix.push('_');
            extension_prefix.push_str(&extension.key);
        } else if !extension.key.is_empty() {
            extension_prefix = extension.key.clone();
        }

        visiting.push(extension.table.clone());
        columns.extend(resolve_columns_with_prefix(
            target,
            all_schemas,
            &extension_prefix,
            visiting,
        )?);
        visiting.pop();
    }

    Ok(columns)
}

/// Replace the first path segment of a column with the substitution prefix.
fn resolve_column_with_prefix(column: &TableSchemaColumn, prefix: &str) -> TableSchemaColumn {
    if prefix.is_empty() {
        return column.clone();
    }

    let start = column.path.find('_').map_or(0, |index| index + 1);
    let path = format!("{}_{}", prefix, &column.path[start..]);

    TableSchemaColumn {
        path,
        ..column.clone()
    }
}
