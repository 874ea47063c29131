//! SQL dialect implementations of the [`QueryBuilder`] surface.
//!
//! The common composition (joins, CASE orderings, IN collapsing) lives in
//! the trait's default bodies; dialects only differ where SQL dialects
//! actually diverge:
//!
//! - Pagination: `LIMIT ? OFFSET ?` vs `LIMIT $1 OFFSET $2`
//! - NULL substitution: `IFNULL` vs `COALESCE`

mod mysql;
mod postgres;

pub use mysql::MySql;
pub use postgres::Postgres;

use crate::sql::builder::QueryBuilder;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
}

impl Dialect {
    /// Get the dialect's query builder implementation.
    pub fn query_builder(&self) -> &'static dyn QueryBuilder {
        match self {
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.query_builder().name())
    }
}
