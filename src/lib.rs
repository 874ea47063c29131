//! # Tabula
//!
//! A schema-driven tabular data retrieval engine.
//!
//! Tabula takes declarative **table schemas** (columns, extensions,
//! exclusions), a user request (selected columns, filter groups, orderings,
//! pagination, locale) and a relational database introspected for its
//! primary/foreign keys, and compiles all of it into a single SELECT with
//! correct join ordering, WHERE composition and stable ORDER BY.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Config assets                        │
//! │      (TableSchemas, Enums, Translation catalogs)         │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//!                     SchemaMapper ──── resolves extensions/exclusions
//!                            │
//!                            ▼
//!    TableQuery ───► SqlConnector ───► JoinPlanner ───► QueryBuilder
//!    (columns,       (validate,        (joins +         (dialect SQL)
//!     filters,        orchestrate)      count joins)
//!     orders)               │
//!                           ▼
//!                   DatabaseConnector (driver)
//! ```
//!
//! The front end is a small path language: `person_organizationalUnit_name`
//! addresses a column of the `organizational_unit` table reached from
//! `person`. The planner turns the participating paths of a request into an
//! ordered set of LEFT JOINs (plus aggregate sub-query joins for count-valued
//! columns), and the back end renders dialect-specific SQL behind the
//! [`sql::QueryBuilder`] trait.

pub mod config;
pub mod datasource;
pub mod ident;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::enumeration::{Enum, EnumMapper, KeyWithTranslation};
    pub use crate::config::schema::{
        ResolvedTableSchema, SchemaMapper, TableSchema, TableSchemaColumn,
    };
    pub use crate::config::translator::{LanguageCatalog, Translator};
    pub use crate::datasource::{
        Connector, FetchedData, Filter, FilterGroup, FilterMode, Order, OrderDirection, Row,
        TableQuery, Value,
    };
    pub use crate::sql::dialect::Dialect;
    pub use crate::sql::{DatabaseConnector, QueryBuilder, SqlConnector};
}

pub use config::schema::{ResolvedTableSchema, SchemaMapper, TableSchema, TableSchemaColumn};
pub use datasource::{Connector, TableQuery, Value};
pub use sql::SqlConnector;
