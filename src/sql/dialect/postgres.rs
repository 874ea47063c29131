//! PostgreSQL dialect.

use crate::sql::builder::QueryBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl QueryBuilder for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn if_null(&self, expr: &str, fallback: &str) -> String {
        format!("COALESCE({expr}, {fallback})")
    }

    fn select_with_limit(&self, inner: &str) -> String {
        format!("SELECT {inner} LIMIT $1 OFFSET $2")
    }
}
