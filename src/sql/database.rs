//! The database driver contract and introspection caches.
//!
//! A [`DatabaseConnector`] is characterized by the fact that it exposes
//! database-specific resolvers (which aid in establishing table relations)
//! as well as a database-specific [`QueryBuilder`], next to the raw query
//! surface itself.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use thiserror::Error;

use crate::datasource::Value;
use crate::sql::builder::QueryBuilder;
use crate::sql::keys::KeyResolver;

/// Errors surfaced by a database driver.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("cannot coerce value of column {column} with reported type {type_name}")]
    Coercion { column: String, type_name: String },
}

impl DatabaseError {
    pub fn query(message: impl Into<String>) -> Self {
        DatabaseError::Query(message.into())
    }
}

/// A table/column doublet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableColumn {
    pub table: String,
    pub column: String,
}

impl TableColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Join-relevant information about an individual column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInformation {
    pub nullable: bool,
}

/// A doublet of two tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TablePair {
    pub origin: String,
    pub target: String,
}

/// A doublet of a primary key and the foreign key referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub primary_key: String,
    pub foreign_key: String,
}

/// Maps `(table, foreign key column)` to `(referenced table, referenced
/// column)`. Ordered so that prefix scans are deterministic.
pub type ForeignKeyMap = BTreeMap<TableColumn, TableColumn>;

/// Maps a column to its join-relevant information.
pub type ColumnInformationMap = HashMap<TableColumn, ColumnInformation>;

/// Maps a table to its primary key columns.
pub type PrimaryKeyMap = HashMap<String, Vec<String>>;

/// Maps a `(origin, target)` table pair to the key pairs linking the two.
pub type RelationMap = HashMap<TablePair, Vec<KeyPair>>;

/// Build the foreign key cache from introspection rows of the shape
/// `(table, column, referenced table, referenced column)`.
pub fn foreign_key_cache(
    rows: impl IntoIterator<Item = (String, String, String, String)>,
) -> ForeignKeyMap {
    rows.into_iter()
        .map(|(table, column, referenced_table, referenced_column)| {
            (
                TableColumn::new(table, column),
                TableColumn::new(referenced_table, referenced_column),
            )
        })
        .collect()
}

/// Build the column information cache from introspection rows of the shape
/// `(table, column, is_nullable)`, where nullability is flagged by `"YES"`.
pub fn column_information_cache(
    rows: impl IntoIterator<Item = (String, String, String)>,
) -> ColumnInformationMap {
    rows.into_iter()
        .map(|(table, column, is_nullable)| {
            (
                TableColumn::new(table, column),
                ColumnInformation {
                    nullable: is_nullable == "YES",
                },
            )
        })
        .collect()
}

/// Build the primary key cache from introspection rows of the shape
/// `(table, column)`.
pub fn primary_key_cache(rows: impl IntoIterator<Item = (String, String)>) -> PrimaryKeyMap {
    let mut cache = PrimaryKeyMap::new();
    for (table, column) in rows {
        cache.entry(table).or_default().push(column);
    }

    cache
}

/// Build the relation cache from introspection rows of the shape
/// `(table, referenced table, column, referenced column)`.
pub fn relation_cache(
    rows: impl IntoIterator<Item = (String, String, String, String)>,
) -> RelationMap {
    let mut cache = RelationMap::new();
    for (table, referenced_table, column, referenced_column) in rows {
        cache
            .entry(TablePair {
                origin: table,
                target: referenced_table,
            })
            .or_default()
            .push(KeyPair {
                primary_key: referenced_column,
                foreign_key: column,
            });
    }

    cache
}

/// Metadata of a single result column as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name; for engine queries this is the aliased descriptor path.
    pub name: String,

    /// Driver-reported column type, e.g. `BIGINT` or `VARCHAR`.
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Raw result of a driver query: column metadata plus rows of raw cells.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Option<Vec<u8>>>>,
}

/// The central driver contract for SQL data sources.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// The dialect-specific query builder.
    fn query_builder(&self) -> &dyn QueryBuilder;

    /// The key resolver backed by this database's introspection caches.
    fn key_resolver(&self) -> &KeyResolver;

    /// The foreign key cache used to seed per-request join planners.
    fn foreign_keys(&self) -> &ForeignKeyMap;

    /// The server version, for startup logging.
    async fn database_version(&self) -> Result<String, DatabaseError>;

    /// Execute a query and return raw rows. `params` are bound to the
    /// dialect's placeholders in order.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError>;

    /// Execute a query returning a single unsigned count.
    async fn query_scalar(&self, sql: &str) -> Result<u64, DatabaseError>;

    /// Coerce a raw cell into a typed [`Value`] using the driver-reported
    /// column type.
    fn type_safe_value(
        &self,
        raw: Option<&[u8]>,
        column: &ColumnInfo,
    ) -> Result<Value, DatabaseError>;
}

/// Default raw-cell coercion over common information-schema type names.
/// Drivers with richer type information can implement their own mapping.
pub fn coerce_typed_bytes(raw: Option<&[u8]>, column: &ColumnInfo) -> Result<Value, DatabaseError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };

    let coercion_error = || DatabaseError::Coercion {
        column: column.name.clone(),
        type_name: column.type_name.clone(),
    };

    let text = std::str::from_utf8(raw).map_err(|_| coercion_error())?;

    match column.type_name.to_ascii_uppercase().as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => {
            text.parse::<i64>().map(Value::Int).map_err(|_| coercion_error())
        }
        "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" => {
            text.parse::<f64>().map(Value::Float).map_err(|_| coercion_error())
        }
        "BOOL" | "BOOLEAN" | "BIT" => Ok(Value::Bool(text == "1" || text.eq_ignore_ascii_case("true"))),
        _ => Ok(Value::Str(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_cache_maps_column_to_reference() {
        let cache = foreign_key_cache([(
            "person".to_string(),
            "organization_uuid".to_string(),
            "organization".to_string(),
            "uuid".to_string(),
        )]);

        let target = cache
            .get(&TableColumn::new("person", "organization_uuid"))
            .unwrap();
        assert_eq!(target, &TableColumn::new("organization", "uuid"));
    }

    #[test]
    fn relation_cache_collects_key_pairs_per_table_pair() {
        let cache = relation_cache([
            (
                "user".to_string(),
                "company".to_string(),
                "company_uuid".to_string(),
                "uuid".to_string(),
            ),
            (
                "user".to_string(),
                "company".to_string(),
                "billing_company_uuid".to_string(),
                "uuid".to_string(),
            ),
        ]);

        let pairs = cache
            .get(&TablePair {
                origin: "user".to_string(),
                target: "company".to_string(),
            })
            .unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].foreign_key, "company_uuid");
    }

    #[test]
    fn column_information_cache_parses_nullability() {
        let cache = column_information_cache([
            ("person".to_string(), "name".to_string(), "YES".to_string()),
            ("person".to_string(), "uuid".to_string(), "NO".to_string()),
        ]);

        assert!(cache[&TableColumn::new("person", "name")].nullable);
        assert!(!cache[&TableColumn::new("person", "uuid")].nullable);
    }

    #[test]
    fn coerces_common_driver_types() {
        let int = ColumnInfo::new("c", "BIGINT");
        let text = ColumnInfo::new("c", "VARCHAR");
        let boolean = ColumnInfo::new("c", "BOOLEAN");

        assert_eq!(
            coerce_typed_bytes(Some(b"42"), &int).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            coerce_typed_bytes(Some(b"hello"), &text).unwrap(),
            Value::Str("hello".to_string())
        );
        assert_eq!(
            coerce_typed_bytes(Some(b"1"), &boolean).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(coerce_typed_bytes(None, &int).unwrap(), Value::Null);
    }

    #[test]
    fn unparseable_numeric_cell_errors_instead_of_panicking() {
        let int = ColumnInfo::new("c", "BIGINT");

        assert!(matches!(
            coerce_typed_bytes(Some(b"not-a-number"), &int),
            Err(DatabaseError::Coercion { .. })
        ));
    }
}
