#![allow(dead_code)]

//! Shared fixtures: a recording mock driver plus schema/enum/translation
//! builders used across the integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tabula::config::enumeration::{Enum, EnumMapper};
use tabula::config::schema::{SchemaMapper, TableSchema, TableSchemaColumn};
use tabula::config::translator::{LanguageCatalog, Translator};
use tabula::datasource::Value;
use tabula::sql::paths::SIZE_PATH_RESOLVER;
use tabula::sql::{
    coerce_typed_bytes, foreign_key_cache, primary_key_cache, relation_cache, ColumnInfo,
    DatabaseConnector, DatabaseError, Dialect, ForeignKeyMap, KeyResolver, QueryBuilder,
    QueryOutput, SqlConnector,
};

/// A single recorded driver call.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// An in-memory driver that records every query and replays canned results.
pub struct MockDatabase {
    dialect: Dialect,
    keys: KeyResolver,
    foreign_keys: ForeignKeyMap,
    data_results: Mutex<VecDeque<QueryOutput>>,
    pub data_queries: Mutex<Vec<RecordedQuery>>,
    pub count_queries: Mutex<Vec<String>>,
    pub total_count: u64,
    pub filtered_count: u64,

    /// When set, every count query fails with a driver error.
    pub fail_counts: bool,
}

impl MockDatabase {
    pub fn new() -> Self {
        let primary_keys = primary_key_cache(
            [
                ("company", "uuid"),
                ("user", "uuid"),
                ("organization", "uuid"),
                ("person", "uuid"),
            ]
            .map(|(table, column)| (table.to_string(), column.to_string())),
        );

        let relations = relation_cache([(
            "user".to_string(),
            "company".to_string(),
            "company_uuid".to_string(),
            "uuid".to_string(),
        )]);

        let foreign_keys = foreign_key_cache(
            [
                ("organization", "assigned_person_uuid", "person", "uuid"),
                ("person", "supervisor_uuid", "person", "uuid"),
                ("person", "organization_uuid", "organization", "uuid"),
            ]
            .map(|(table, column, referenced_table, referenced_column)| {
                (
                    table.to_string(),
                    column.to_string(),
                    referenced_table.to_string(),
                    referenced_column.to_string(),
                )
            }),
        );

        Self {
            dialect: Dialect::MySql,
            keys: KeyResolver::new(primary_keys, relations),
            foreign_keys,
            data_results: Mutex::new(VecDeque::new()),
            data_queries: Mutex::new(Vec::new()),
            count_queries: Mutex::new(Vec::new()),
            total_count: 120,
            filtered_count: 12,
            fail_counts: false,
        }
    }

    /// Queue the result returned by the next data query.
    pub fn push_data(&self, output: QueryOutput) {
        self.data_results.lock().unwrap().push_back(output);
    }

    pub fn recorded_data_sql(&self) -> Vec<String> {
        self.data_queries
            .lock()
            .unwrap()
            .iter()
            .map(|query| query.sql.clone())
            .collect()
    }

    pub fn recorded_params(&self) -> Vec<Vec<Value>> {
        self.data_queries
            .lock()
            .unwrap()
            .iter()
            .map(|query| query.params.clone())
            .collect()
    }

    pub fn recorded_count_sql(&self) -> Vec<String> {
        self.count_queries.lock().unwrap().clone()
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseConnector for MockDatabase {
    fn query_builder(&self) -> &dyn QueryBuilder {
        self.dialect.query_builder()
    }

    fn key_resolver(&self) -> &KeyResolver {
        &self.keys
    }

    fn foreign_keys(&self) -> &ForeignKeyMap {
        &self.foreign_keys
    }

    async fn database_version(&self) -> Result<String, DatabaseError> {
        Ok("mock 1.0".to_string())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError> {
        self.data_queries.lock().unwrap().push(RecordedQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        Ok(self
            .data_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn query_scalar(&self, sql: &str) -> Result<u64, DatabaseError> {
        self.count_queries.lock().unwrap().push(sql.to_string());

        if self.fail_counts {
            return Err(DatabaseError::query("count query failed"));
        }

        if sql.contains(" WHERE ") {
            Ok(self.filtered_count)
        } else {
            Ok(self.total_count)
        }
    }

    fn type_safe_value(
        &self,
        raw: Option<&[u8]>,
        column: &ColumnInfo,
    ) -> Result<Value, DatabaseError> {
        coerce_typed_bytes(raw, column)
    }
}

fn column(path: &str, column_type: &str, filter: &str, order: &str) -> TableSchemaColumn {
    TableSchemaColumn {
        path: path.to_string(),
        column_type: column_type.to_string(),
        filter: filter.to_string(),
        order: order.to_string(),
        ..TableSchemaColumn::default()
    }
}

/// The `companies` schema used by most orchestrator tests: a numeric key, a
/// wildcard-capable name, an enum-typed country, a count of related users
/// and the primary key column.
pub fn company_schemas() -> SchemaMapper {
    let companies = TableSchema {
        entity: "company".to_string(),
        columns: vec![
            column("company_companyKey", "long", "NumericFilter", ""),
            column("company_name", "string", "StringRegExFilter", ""),
            column("company_country", "Country", "EnumFilter", "EnumOrder"),
            TableSchemaColumn {
                path_resolver: SIZE_PATH_RESOLVER.to_string(),
                ..column("company_user", "long", "NumericFilter", "")
            },
            column("company_uuid", "string", "StringFilter", ""),
        ],
        ..TableSchema::default()
    };

    let users = TableSchema {
        entity: "user".to_string(),
        columns: vec![column("user_uuid", "string", "StringFilter", "")],
        ..TableSchema::default()
    };

    SchemaMapper::from_schemas(
        [
            ("companies".to_string(), companies),
            ("user".to_string(), users),
        ]
        .into_iter()
        .collect(),
    )
    .unwrap()
}

/// The `organizations` schema used by join planning and deferred loading
/// tests.
pub fn organization_schemas() -> SchemaMapper {
    let organizations = TableSchema {
        entity: "organization".to_string(),
        columns: vec![
            column("organization_name", "string", "StringFilter", ""),
            column("organization_uuid", "string", "StringFilter", ""),
            // No foreign key for the boss relation exists in the cache.
            column("organization_boss_name", "string", "StringFilter", ""),
            column(
                "organization_assignedPerson_name",
                "string",
                "StringFilter",
                "",
            ),
            column(
                "organization_assignedPerson_supervisor_name",
                "string",
                "StringFilter",
                "",
            ),
        ],
        ..TableSchema::default()
    };

    SchemaMapper::from_schemas(
        [("organizations".to_string(), organizations)]
            .into_iter()
            .collect(),
    )
    .unwrap()
}

/// A `Country` enum with three keys.
pub fn country_enums() -> EnumMapper {
    let country: Enum = [
        ("DE".to_string(), "enum.country.de".to_string()),
        ("FR".to_string(), "enum.country.fr".to_string()),
        ("IT".to_string(), "enum.country.it".to_string()),
    ]
    .into_iter()
    .collect();

    EnumMapper::from_enums([("Country".to_string(), country)].into_iter().collect())
}

pub fn german_translator(entries: Vec<(&str, &str)>) -> Translator {
    let catalog: LanguageCatalog = entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    Translator::from_catalogs([("de".to_string(), catalog)].into_iter().collect())
}

/// Translations under which `Country` sorts in reverse enum-key order.
pub fn reversing_country_translator() -> Translator {
    german_translator(vec![
        ("enum.country.de", "Zeta"),
        ("enum.country.fr", "Mitte"),
        ("enum.country.it", "Alpha"),
    ])
}

pub fn connector(db: &Arc<MockDatabase>, schemas: SchemaMapper) -> SqlConnector {
    connector_with(db, schemas, country_enums(), reversing_country_translator())
}

pub fn connector_with(
    db: &Arc<MockDatabase>,
    schemas: SchemaMapper,
    enums: EnumMapper,
    translator: Translator,
) -> SqlConnector {
    let database: Arc<dyn DatabaseConnector> = db.clone();

    SqlConnector::new(database, enums, translator, schemas).unwrap()
}
