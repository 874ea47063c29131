//! The implementation-agnostic data retrieval contract.
//!
//! This module defines the request model (selected columns, filter groups,
//! orderings, pagination, locale), the typed value variant exchanged with
//! drivers, and the [`Connector`] contract between the engine core and a
//! data source implementation.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::{ResolvedTableSchema, SchemaError, TableSchemaColumn};
use crate::sql::database::DatabaseError;
use crate::sql::filter::FilterError;
use crate::sql::keys::KeyError;
use crate::sql::order::OrderError;
use crate::sql::planner::PlanError;

/// A typed value exchanged between requests, the SQL layer and drivers.
///
/// Filter values, fixed sort keys and result cells are all modeled with this
/// variant instead of runtime reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Coerce to a plain string, accepting the sort-key compatible variants
    /// (strings and integers). Other variants return `None`.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            Value::Str(value) => Some(value.clone()),
            Value::Int(value) => Some(value.to_string()),
            Value::UInt(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// The mode in which to filter a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterMode {
    Equals,
    NotEquals,
    Greater,
    GreaterEquals,
    Lesser,
    LesserEquals,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterMode::Equals => "EQUALS",
            FilterMode::NotEquals => "NOT_EQUALS",
            FilterMode::Greater => "GREATER",
            FilterMode::GreaterEquals => "GREATER_EQUALS",
            FilterMode::Lesser => "LESSER",
            FilterMode::LesserEquals => "LESSER_EQUALS",
        };
        write!(f, "{name}")
    }
}

/// A single filter mode with an applicable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub mode: FilterMode,
    pub value: Value,
}

impl Filter {
    pub fn new(mode: FilterMode, value: impl Into<Value>) -> Self {
        Self {
            mode,
            value: value.into(),
        }
    }
}

/// A path to be filtered by one or multiple [`Filter`]s.
///
/// Filters within a group are OR-joined. If multiple groups exist for one
/// path, the groups AND together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub path: String,
    pub filters: Vec<Filter>,
}

impl FilterGroup {
    pub fn new(path: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            path: path.into(),
            filters,
        }
    }

    /// Shortcut for an OR group over a single filter mode.
    pub fn with_mode(path: impl Into<String>, mode: FilterMode, values: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            filters: values
                .into_iter()
                .map(|value| Filter { mode, value })
                .collect(),
        }
    }
}

/// A direction to order a column by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn reverse(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// A path to be ordered in a certain direction. Additional sort keys may be
/// supplied to impose a fixed positional order on the column's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub path: String,
    pub direction: OrderDirection,
    pub sort_keys: Vec<Value>,
}

impl Order {
    pub fn new(path: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            path: path.into(),
            direction,
            sort_keys: Vec::new(),
        }
    }

    pub fn with_sort_keys(
        path: impl Into<String>,
        direction: OrderDirection,
        sort_keys: Vec<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            direction,
            sort_keys,
        }
    }
}

/// A single materialised result row, keyed by column path.
pub type Row = HashMap<String, Value>;

/// The page of rows together with its counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedData {
    pub rows: Vec<Row>,
    pub total_count: u64,
    pub filtered_count: u64,
}

/// A complete tabular data request.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    /// Columns to select, in output order.
    pub columns: Vec<TableSchemaColumn>,

    /// Filter groups; groups sharing a path AND together.
    pub filters: Vec<FilterGroup>,

    /// Requested orderings, most significant first.
    pub orders: Vec<Order>,

    /// Reserved for future full-text search compilation; currently passed
    /// through unused.
    pub global_search: String,

    /// Page size; `0` disables the LIMIT clause.
    pub limit: u64,

    /// Page start; only effective together with a non-zero limit.
    pub offset: u64,

    /// Locale used for enum translation ordering.
    pub locale: String,
}

impl TableQuery {
    pub fn new(columns: Vec<TableSchemaColumn>, locale: impl Into<String>) -> Self {
        Self {
            columns,
            locale: locale.into(),
            ..Self::default()
        }
    }
}

/// Errors found while validating a request, before any SQL is emitted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no columns selected")]
    NoColumns,

    #[error("unknown locale {0}")]
    UnknownLocale(String),

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("unknown path resolver {resolver} on column {column}")]
    UnknownPathResolver { resolver: String, column: String },

    #[error("unknown filter {filter} on column {column}")]
    UnknownFilter { filter: String, column: String },

    #[error("unknown order {order} on column {column}")]
    UnknownOrder { order: String, column: String },

    #[error("unknown filter column {0}")]
    UnknownFilterColumn(String),

    #[error("unknown order column {0}")]
    UnknownOrderColumn(String),
}

/// Errors surfaced by a data source while serving a request.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("count task failed: {0}")]
    CountTask(String),
}

/// Resolves a schema column to a SELECT expression.
pub trait PathResolver: Send + Sync {
    fn resolve_path_name(&self, column: &TableSchemaColumn) -> String;
}

/// The central contract between the engine core and a data source.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Validate that the implementation is able to serve the request. Any
    /// error indicates that [`Connector::fetch_data`] would fail; the primary
    /// use case is validating user-made requests.
    fn validate_request(
        &self,
        query: &TableQuery,
        schema: &ResolvedTableSchema,
    ) -> Result<(), RequestError>;

    /// Retrieve a page of data together with the total and filtered counts.
    async fn fetch_data(
        &self,
        query: &TableQuery,
        schema: &ResolvedTableSchema,
    ) -> Result<FetchedData, SourceError>;
}
