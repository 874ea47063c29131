//! Join planning: from participating paths to ordered alias joins and
//! count-sub-query joins.
//!
//! The planner is deliberately stable: prefix paths are processed in
//! lexicographic order, so identical logical inputs always produce identical
//! SQL. The alias cache is per-request state; the foreign key cache it is
//! seeded with is shared and read-only.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::warn;

use crate::config::schema::{ResolvedTableSchema, SchemaError, SchemaMapper, TableSchemaColumn};
use crate::datasource::{FilterGroup, Order};
use crate::ident::descriptor_to_identifier;
use crate::sql::database::{ForeignKeyMap, TableColumn};
use crate::sql::join::{CountJoin, Join, JoinType};
use crate::sql::keys::{KeyError, KeyResolver};
use crate::sql::paths::SIZE_PATH_RESOLVER;

/// Errors raised while planning joins.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No foreign key matching the path segment exists on the source table.
    #[error("cannot find relation target for {table}.{column}")]
    NoRelationTarget { table: String, column: String },

    /// A chained join references a source alias that has not been resolved.
    #[error("unable to resolve join source table for {path}")]
    UnresolvedJoinSource { path: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// All paths participating in a request, through selection, ordering or
/// filtering.
pub fn participating_paths(
    columns: &[TableSchemaColumn],
    orders: &[Order],
    filters: &[FilterGroup],
) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();

    for column in columns {
        paths.insert(column.path.clone());
    }
    for order in orders {
        paths.insert(order.path.clone());
    }
    for filter in filters {
        paths.insert(filter.path.clone());
    }

    paths
}

/// The paths requiring joins, in lexicographic order: every non-trivial
/// prefix (length ≥ 2 segments, up to one below full length) of every
/// participating path that crosses a join.
pub fn join_paths(
    columns: &[TableSchemaColumn],
    orders: &[Order],
    filters: &[FilterGroup],
) -> Vec<String> {
    let mut joins = BTreeSet::new();

    for path in participating_paths(columns, orders, filters) {
        let parts: Vec<&str> = path.split('_').collect();

        if parts.len() > 2 {
            for upper in 2..parts.len() {
                joins.insert(parts[..upper].join("_"));
            }
        }
    }

    joins.into_iter().collect()
}

/// The participating paths denoting counts of related rows, in lexicographic
/// order.
pub fn count_join_paths(
    columns: &[TableSchemaColumn],
    orders: &[Order],
    filters: &[FilterGroup],
    schema: &ResolvedTableSchema,
) -> Vec<String> {
    participating_paths(columns, orders, filters)
        .into_iter()
        .filter(|path| {
            schema
                .column(path)
                .is_ok_and(|column| column.path_resolver == SIZE_PATH_RESOLVER)
        })
        .collect()
}

/// Resolves join paths against the foreign key cache, remembering every
/// resolved alias so that deeper paths can chain off it.
///
/// A planner instance carries per-request state and must not be shared
/// across concurrent requests.
pub struct JoinPlanner<'a> {
    foreign_keys: &'a ForeignKeyMap,
    join_path_cache: HashMap<String, Join>,
}

impl<'a> JoinPlanner<'a> {
    pub fn new(foreign_keys: &'a ForeignKeyMap) -> Self {
        Self {
            foreign_keys,
            join_path_cache: HashMap::new(),
        }
    }

    /// Resolve a join path to the [`Join`] which must be applied for the
    /// query to succeed.
    ///
    /// Paths must be resolved shallow-to-deep (the lexicographic order of
    /// [`join_paths`] guarantees this), since a deeper path looks up its
    /// parent's target table from the alias cache.
    pub fn resolve_path(&mut self, join_path: &str) -> Result<Join, PlanError> {
        let alias = descriptor_to_identifier(join_path);

        if let Some(cached) = self.join_path_cache.get(&alias) {
            return Ok(cached.clone());
        }

        let parts: Vec<&str> = join_path.split('_').collect();

        let (origin, source_table) = if parts.len() > 2 {
            let parent = descriptor_to_identifier(&parts[..parts.len() - 1].join("_"));

            let source_table = self
                .join_path_cache
                .get(&parent)
                .map(|join| join.target_table.clone())
                .ok_or_else(|| PlanError::UnresolvedJoinSource {
                    path: parent.clone(),
                })?;

            (parent, source_table)
        } else {
            let first = descriptor_to_identifier(parts[0]);
            (first.clone(), first)
        };

        let target_field = descriptor_to_identifier(parts[parts.len() - 1]);
        let (foreign_link, back_link) = self.find_relation_target(&source_table, &target_field)?;

        // The origin is the parent alias rather than the physical table, so
        // join chains keep referencing the aliased parent.
        let join = Join::new(
            origin,
            back_link.column,
            foreign_link.table,
            foreign_link.column,
            alias.clone(),
            JoinType::Left,
        );

        self.join_path_cache.insert(alias, join.clone());

        Ok(join)
    }

    /// Search the table and column matched by a foreign key column hint on
    /// the given source table.
    fn find_relation_target(
        &self,
        table: &str,
        column: &str,
    ) -> Result<(TableColumn, TableColumn), PlanError> {
        // An exact match via the uuid convention is faster than iterating
        // all possible values.
        let shortcut = TableColumn::new(table, format!("{column}_uuid"));
        if let Some(target) = self.foreign_keys.get(&shortcut) {
            return Ok((target.clone(), shortcut));
        }

        warn!(
            column,
            table, "unable to resolve column in table via lookup - using iteration approach"
        );

        for (key, target) in self.foreign_keys {
            if key.table == table && key.column.starts_with(column) {
                return Ok((target.clone(), key.clone()));
            }
        }

        Err(PlanError::NoRelationTarget {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Resolve a count-valued path into its aggregate sub-query join.
    pub fn resolve_count_join(
        &mut self,
        path: &str,
        schemas: &SchemaMapper,
        keys: &KeyResolver,
    ) -> Result<CountJoin, PlanError> {
        let parts: Vec<&str> = path.split('_').collect();

        let count_schema = schemas.schema(&parts[parts.len() - 1].to_lowercase())?;

        let origin_parts = &parts[..parts.len() - 1];
        let origin_table = origin_parts.join("_");

        let origin_join_table = if origin_parts.len() > 1 {
            // The origin is itself a join target, so resolve the preceding
            // join first to learn its physical table.
            self.resolve_path(&origin_table)?.target_table
        } else {
            origin_parts[0].to_string()
        };

        let count_entity_primary_key = keys.first_primary_key(&count_schema.entity)?.to_string();
        let relation = keys.first_relation(&count_schema.entity, &origin_join_table)?;

        Ok(CountJoin::new(
            descriptor_to_identifier(&origin_table),
            relation.primary_key.clone(),
            descriptor_to_identifier(&count_schema.entity),
            count_entity_primary_key,
            relation.foreign_key.clone(),
            descriptor_to_identifier(path),
        ))
    }
}
