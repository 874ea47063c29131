//! The SQL back end: join planning, dialect query building and the fetch
//! orchestrator.

pub mod builder;
pub mod connector;
pub mod database;
pub mod dialect;
pub mod filter;
pub mod join;
pub mod keys;
pub mod order;
pub mod paths;
pub mod planner;

pub use builder::QueryBuilder;
pub use connector::SqlConnector;
pub use database::{
    coerce_typed_bytes, column_information_cache, foreign_key_cache, primary_key_cache,
    relation_cache, ColumnInfo, ColumnInformation, DatabaseConnector, DatabaseError, ForeignKeyMap,
    KeyPair, PrimaryKeyMap, QueryOutput, RelationMap, TableColumn, TablePair,
};
pub use dialect::Dialect;
pub use join::{CountJoin, Join, JoinType};
pub use keys::KeyResolver;
pub use planner::JoinPlanner;
