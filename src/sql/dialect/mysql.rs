//! MySQL / MariaDB dialect.

use crate::sql::builder::QueryBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl QueryBuilder for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn if_null(&self, expr: &str, fallback: &str) -> String {
        format!("IFNULL({expr}, {fallback})")
    }

    fn select_with_limit(&self, inner: &str) -> String {
        format!("SELECT {inner} LIMIT ? OFFSET ?")
    }
}
