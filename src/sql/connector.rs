//! The SQL fetch orchestrator.
//!
//! Validates requests, plans deferred loading, launches the count queries in
//! parallel with the data fetch and materialises typed rows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::enumeration::EnumMapper;
use crate::config::schema::{ResolvedTableSchema, SchemaError, SchemaMapper, TableSchemaColumn};
use crate::config::translator::Translator;
use crate::datasource::{
    Connector, FetchedData, FilterGroup, FilterMode, Order, OrderDirection, PathResolver,
    RequestError, Row, SourceError, TableQuery, Value,
};
use crate::ident::identifier_to_descriptor;
use crate::sql::builder::{compile_filter_groups, compile_order};
use crate::sql::database::{DatabaseConnector, DatabaseError, QueryOutput};
use crate::sql::filter::{default_filters, FilterStrategy};
use crate::sql::order::{default_sorters, Sorter};
use crate::sql::paths::{default_resolvers, SIZE_PATH_RESOLVER};
use crate::sql::planner::{count_join_paths, join_paths, JoinPlanner};

type CountHandle = JoinHandle<Result<u64, DatabaseError>>;

/// The SQL implementation of the [`Connector`] contract.
///
/// Construction validates the integrity of all schemas against the enum
/// mapper and registers the built-in path resolver, sorter and filter
/// strategies. The connector itself is immutable and shared across
/// concurrent requests; all per-request planner state lives on the stack of
/// a single fetch.
pub struct SqlConnector {
    db: Arc<dyn DatabaseConnector>,
    enums: Arc<EnumMapper>,
    schemas: SchemaMapper,
    translator: Arc<Translator>,
    resolvers: HashMap<String, Box<dyn PathResolver>>,
    sorters: HashMap<String, Box<dyn Sorter>>,
    filters: HashMap<String, Box<dyn FilterStrategy>>,
}

impl SqlConnector {
    pub fn new(
        db: Arc<dyn DatabaseConnector>,
        enums: EnumMapper,
        translator: Translator,
        schemas: SchemaMapper,
    ) -> Result<Self, SchemaError> {
        schemas.validate_integrity(&enums)?;

        let enums = Arc::new(enums);
        let translator = Arc::new(translator);

        Ok(Self {
            db,
            resolvers: default_resolvers(),
            sorters: default_sorters(&enums, &translator),
            filters: default_filters(),
            enums,
            schemas,
            translator,
        })
    }

    /// The enum mapper backing this connector.
    pub fn enums(&self) -> &EnumMapper {
        &self.enums
    }

    fn resolver_for(&self, column: &TableSchemaColumn) -> Result<&dyn PathResolver, RequestError> {
        self.resolvers
            .get(&column.path_resolver)
            .map(Box::as_ref)
            .ok_or_else(|| RequestError::UnknownPathResolver {
                resolver: column.path_resolver.clone(),
                column: column.path.clone(),
            })
    }

    /// Assemble the JOIN clause for the given participating request parts.
    fn join_clause(
        &self,
        columns: &[TableSchemaColumn],
        orders: &[Order],
        schema: &ResolvedTableSchema,
        filters: &[FilterGroup],
    ) -> Result<String, SourceError> {
        let builder = self.db.query_builder();
        let keys = self.db.key_resolver();
        let mut planner = JoinPlanner::new(self.db.foreign_keys());

        let mut fragments = Vec::new();

        for path in join_paths(columns, orders, filters) {
            let join = planner.resolve_path(&path)?;
            fragments.push(builder.join_fragment(&join));
        }

        for path in count_join_paths(columns, orders, filters, schema) {
            let count_join = planner
                .resolve_count_join(&path, &self.schemas, keys)
                .map_err(|err| {
                    error!(path = %path, "cannot resolve count join");
                    err
                })?;

            fragments.push(builder.count_join_fragment(&count_join));
        }

        Ok(fragments.join(" "))
    }

    /// Assemble the WHERE clause. Filter groups sharing a path coalesce and
    /// AND together.
    fn filter_clause(
        &self,
        filters: &[FilterGroup],
        schema: &ResolvedTableSchema,
    ) -> Result<String, SourceError> {
        let builder = self.db.query_builder();

        let mut by_path: std::collections::BTreeMap<&str, Vec<&FilterGroup>> =
            std::collections::BTreeMap::new();
        for group in filters {
            by_path.entry(group.path.as_str()).or_default().push(group);
        }

        let mut and_parts = Vec::with_capacity(by_path.len());
        for (path, groups) in by_path {
            let column = schema.column(path)?;

            let strategy = self.filters.get(&column.filter).ok_or_else(|| {
                RequestError::UnknownFilter {
                    filter: column.filter.clone(),
                    column: column.path.clone(),
                }
            })?;

            let resolved_path = self.resolver_for(column)?.resolve_path_name(column);

            and_parts.push(compile_filter_groups(
                builder,
                &resolved_path,
                strategy.as_ref(),
                &groups,
            )?);
        }

        Ok(and_parts.join(" AND "))
    }

    /// Build and execute the main SELECT for the given columns, filters and
    /// orders, returning the raw driver output.
    async fn run_data_query(
        &self,
        columns: &[TableSchemaColumn],
        filters: &[FilterGroup],
        orders: &[Order],
        schema: &ResolvedTableSchema,
        limit: u64,
        offset: u64,
        locale: &str,
    ) -> Result<QueryOutput, SourceError> {
        let builder = self.db.query_builder();
        let keys = self.db.key_resolver();
        let entity = &schema.original_schema().entity;

        let join_string = self.join_clause(columns, orders, schema, filters)?;

        let mut select_columns = Vec::with_capacity(columns.len());
        for column in columns {
            let resolved = self.resolver_for(column)?.resolve_path_name(column);
            select_columns.push(format!("{} AS {}", resolved, column.path));
        }

        // Guarantee a primary key sort, so pagination stays deterministic.
        let pk_path = format!(
            "{entity}_{}",
            identifier_to_descriptor(keys.first_primary_key(entity)?)
        );

        let mut orders = orders.to_vec();
        if !orders.iter().any(|order| order.path == pk_path) {
            info!("request does not contain order on primary key - adding order to ensure consistent results");
            orders.push(Order::new(pk_path, OrderDirection::Asc));
        }

        let mut sort_columns = Vec::with_capacity(orders.len());
        for order in &orders {
            let column = match schema.column(&order.path) {
                Ok(column) => column.clone(),
                Err(_) => {
                    warn!(
                        path = %order.path,
                        schema = %entity,
                        "ordering on column which is unknown to schema - using default path resolver"
                    );
                    TableSchemaColumn::from_path(&order.path)
                }
            };

            let sorter = self.sorters.get(&column.order).ok_or_else(|| {
                RequestError::UnknownOrder {
                    order: column.order.clone(),
                    column: column.path.clone(),
                }
            })?;

            let resolved_path = self.resolver_for(&column)?.resolve_path_name(&column);

            sort_columns.push(compile_order(
                builder,
                &resolved_path,
                &column,
                sorter.as_ref(),
                order,
                locale,
            )?);
        }

        let mut query_string = format!("{} FROM {}", select_columns.join(","), entity);
        if !join_string.is_empty() {
            query_string.push(' ');
            query_string.push_str(&join_string);
        }

        let filter_string = self.filter_clause(filters, schema)?;
        if !filter_string.is_empty() {
            query_string.push_str(" WHERE ");
            query_string.push_str(&filter_string);
        }

        query_string.push_str(" ORDER BY ");
        query_string.push_str(&sort_columns.join(","));

        let (sql, params) = if limit > 0 {
            (
                builder.select_with_limit(&query_string),
                vec![Value::UInt(limit), Value::UInt(offset)],
            )
        } else {
            (format!("SELECT {query_string}"), Vec::new())
        };

        debug!(query = %sql, "executing query");

        let start = Instant::now();
        let output = self.db.query(&sql, &params).await?;
        debug!(
            elapsed = ?start.elapsed(),
            columns = columns.len(),
            "query successfully executed for data source"
        );

        Ok(output)
    }

    /// Assemble a count query over the entity's primary key, joining only
    /// what the filters require.
    fn count_query(
        &self,
        schema: &ResolvedTableSchema,
        filters: &[FilterGroup],
    ) -> Result<String, SourceError> {
        let entity = &schema.original_schema().entity;
        let pk = self.db.key_resolver().first_primary_key(entity)?;

        let mut sql = format!("SELECT count({entity}.{pk}) FROM {entity}");

        let join_string = self.join_clause(&[], &[], schema, filters)?;
        if !join_string.is_empty() {
            sql.push(' ');
            sql.push_str(&join_string);
        }

        let filter_string = self.filter_clause(filters, schema)?;
        if !filter_string.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter_string);
        }

        Ok(sql)
    }

    fn spawn_count(&self, sql: String) -> CountHandle {
        let db = self.db.clone();

        tokio::spawn(async move {
            debug!(query = %sql, "executing count query");
            db.query_scalar(&sql).await
        })
    }

    /// Materialise driver output into typed rows. Result keys replace `.`
    /// with `_` to accommodate drivers that report qualified names.
    fn materialize_rows(&self, output: &QueryOutput) -> Result<Vec<Row>, SourceError> {
        let mut rows = Vec::with_capacity(output.rows.len());

        for raw_row in &output.rows {
            let mut row = Row::with_capacity(raw_row.len());

            for (index, cell) in raw_row.iter().enumerate() {
                let column = output.columns.get(index).ok_or_else(|| {
                    DatabaseError::query("driver reported fewer columns than cells")
                })?;

                let name = column.name.replace('.', "_");
                let value = self.db.type_safe_value(cell.as_deref(), column)?;
                row.insert(name, value);
            }

            rows.push(row);
        }

        Ok(rows)
    }
}

#[async_trait]
impl Connector for SqlConnector {
    fn validate_request(
        &self,
        query: &TableQuery,
        schema: &ResolvedTableSchema,
    ) -> Result<(), RequestError> {
        if query.columns.is_empty() {
            return Err(RequestError::NoColumns);
        }

        if self.translator.language(&query.locale).is_err() {
            return Err(RequestError::UnknownLocale(query.locale.clone()));
        }

        for column in &query.columns {
            if schema.column(&column.path).is_err() {
                return Err(RequestError::UnknownColumn(column.path.clone()));
            }

            if !self.resolvers.contains_key(&column.path_resolver) {
                return Err(RequestError::UnknownPathResolver {
                    resolver: column.path_resolver.clone(),
                    column: column.path.clone(),
                });
            }

            if !self.filters.contains_key(&column.filter) {
                return Err(RequestError::UnknownFilter {
                    filter: column.filter.clone(),
                    column: column.path.clone(),
                });
            }

            if !self.sorters.contains_key(&column.order) {
                return Err(RequestError::UnknownOrder {
                    order: column.order.clone(),
                    column: column.path.clone(),
                });
            }
        }

        for group in &query.filters {
            if schema.column(&group.path).is_err() {
                return Err(RequestError::UnknownFilterColumn(group.path.clone()));
            }
        }

        for order in &query.orders {
            if schema.column(&order.path).is_err() {
                return Err(RequestError::UnknownOrderColumn(order.path.clone()));
            }
        }

        Ok(())
    }

    async fn fetch_data(
        &self,
        query: &TableQuery,
        schema: &ResolvedTableSchema,
    ) -> Result<FetchedData, SourceError> {
        let start = Instant::now();
        let entity = &schema.original_schema().entity;

        // Kick off the result counting - it is needed at the end, so it runs
        // in parallel with the data fetch. Both statements are assembled up
        // front; no task spawns unless every count plan succeeded.
        let total_sql = self.count_query(schema, &[])?;

        // Only count filtered results if there actually are filters.
        let filtered_sql = (!query.filters.is_empty())
            .then(|| self.count_query(schema, &query.filters))
            .transpose()?;

        let total_handle = self.spawn_count(total_sql);
        let filtered_handle = filtered_sql.map(|sql| self.spawn_count(sql));

        let abort_counts = |total: &CountHandle, filtered: &Option<CountHandle>| {
            total.abort();
            if let Some(handle) = filtered {
                handle.abort();
            }
        };

        let mut filters = query.filters.clone();
        let mut orders = query.orders.clone();
        let mut limit = query.limit;
        let mut offset = query.offset;

        if advise_deferred_loading(&orders, schema) {
            // For deferred loading, only the primary key is selected in the
            // first phase.
            let pk_path = format!(
                "{entity}_{}",
                identifier_to_descriptor(match self.db.key_resolver().first_primary_key(entity) {
                    Ok(pk) => pk,
                    Err(err) => {
                        abort_counts(&total_handle, &filtered_handle);
                        return Err(err.into());
                    }
                })
            );

            let pk_columns = [TableSchemaColumn::from_path(&pk_path)];
            let output = match self
                .run_data_query(&pk_columns, &filters, &orders, schema, limit, offset, &query.locale)
                .await
            {
                Ok(output) => output,
                Err(err) => {
                    abort_counts(&total_handle, &filtered_handle);
                    return Err(err);
                }
            };

            let keys = match self.collect_primary_keys(&output) {
                Ok(keys) => keys,
                Err(err) => {
                    abort_counts(&total_handle, &filtered_handle);
                    return Err(err);
                }
            };

            // No keys? Then short-circuit to the empty response, still
            // reporting the total count.
            if keys.is_empty() {
                if let Some(handle) = &filtered_handle {
                    handle.abort();
                }
                let total_count = join_count(total_handle).await?;

                return Ok(FetchedData {
                    rows: Vec::new(),
                    total_count,
                    filtered_count: 0,
                });
            }

            // The collected keys become both the new filter and the fixed
            // order of the actual data fetch, which must no longer page.
            orders = vec![Order::with_sort_keys(
                pk_path.clone(),
                OrderDirection::Asc,
                keys.clone(),
            )];
            filters = vec![FilterGroup::with_mode(pk_path, FilterMode::Equals, keys)];
            limit = 0;
            offset = 0;
        }

        let output = match self
            .run_data_query(&query.columns, &filters, &orders, schema, limit, offset, &query.locale)
            .await
        {
            Ok(output) => output,
            Err(err) => {
                abort_counts(&total_handle, &filtered_handle);
                return Err(err);
            }
        };

        let rows = match self.materialize_rows(&output) {
            Ok(rows) => rows,
            Err(err) => {
                abort_counts(&total_handle, &filtered_handle);
                return Err(err);
            }
        };

        let total_count = match join_count(total_handle).await {
            Ok(count) => count,
            Err(err) => {
                if let Some(handle) = &filtered_handle {
                    handle.abort();
                }
                return Err(err);
            }
        };

        // The total handle is already consumed here, so a failing filtered
        // join has no sibling left to cancel.
        let filtered_count = match filtered_handle {
            Some(handle) => join_count(handle).await?,
            None => total_count,
        };

        info!(
            elapsed = ?start.elapsed(),
            total_count,
            filtered_count,
            count = rows.len(),
            "data fetched"
        );

        Ok(FetchedData {
            rows,
            total_count,
            filtered_count,
        })
    }
}

impl SqlConnector {
    /// Collect the single selected primary key column of a deferred-loading
    /// first phase into typed values.
    fn collect_primary_keys(&self, output: &QueryOutput) -> Result<Vec<Value>, SourceError> {
        let Some(column) = output.columns.first() else {
            if output.rows.is_empty() {
                return Ok(Vec::new());
            }
            return Err(DatabaseError::query("driver returned rows without column metadata").into());
        };

        let mut keys = Vec::with_capacity(output.rows.len());
        for row in &output.rows {
            let raw = row.first().and_then(|cell| cell.as_deref());
            keys.push(self.db.type_safe_value(raw, column)?);
        }

        Ok(keys)
    }
}

/// Returns true if it is advisable to fetch in two phases: once a requested
/// order path crosses a join, or orders on a count column, the single-phase
/// query becomes unusable-slow.
fn advise_deferred_loading(orders: &[Order], schema: &ResolvedTableSchema) -> bool {
    for order in orders {
        if order.path.split('_').count() > 2 {
            return true;
        }

        match schema.column(&order.path) {
            Ok(column) if column.path_resolver == SIZE_PATH_RESOLVER => return true,
            Ok(_) => {}
            Err(_) => {
                error!(column = %order.path, "unable to resolve column to advise on deferred loading");
                return false;
            }
        }
    }

    false
}

async fn join_count(handle: CountHandle) -> Result<u64, SourceError> {
    match handle.await {
        Ok(result) => result.map_err(SourceError::from),
        Err(join_error) => Err(SourceError::CountTask(join_error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TableSchema;

    fn schema_with_orders() -> ResolvedTableSchema {
        let schema = TableSchema {
            entity: "company".to_string(),
            columns: vec![
                TableSchemaColumn {
                    path: "company_name".to_string(),
                    column_type: "string".to_string(),
                    ..TableSchemaColumn::default()
                },
                TableSchemaColumn {
                    path: "company_user".to_string(),
                    column_type: "integer".to_string(),
                    path_resolver: SIZE_PATH_RESOLVER.to_string(),
                    ..TableSchemaColumn::default()
                },
            ],
            ..TableSchema::default()
        };

        let mapper = SchemaMapper::from_schemas(
            [("companies".to_string(), schema)].into_iter().collect(),
        )
        .unwrap();

        mapper.resolved_schema("companies").unwrap().clone()
    }

    #[test]
    fn deferred_loading_is_advised_for_join_crossing_orders() {
        let schema = schema_with_orders();
        let orders = vec![Order::new(
            "company_assignedPerson_name",
            OrderDirection::Asc,
        )];

        assert!(advise_deferred_loading(&orders, &schema));
    }

    #[test]
    fn deferred_loading_is_advised_for_size_orders() {
        let schema = schema_with_orders();
        let orders = vec![Order::new("company_user", OrderDirection::Desc)];

        assert!(advise_deferred_loading(&orders, &schema));
    }

    #[test]
    fn plain_orders_do_not_advise_deferred_loading() {
        let schema = schema_with_orders();
        let orders = vec![Order::new("company_name", OrderDirection::Asc)];

        assert!(!advise_deferred_loading(&orders, &schema));
    }

    #[test]
    fn unknown_order_column_does_not_advise_deferred_loading() {
        let schema = schema_with_orders();
        let orders = vec![Order::new("company_wat", OrderDirection::Asc)];

        assert!(!advise_deferred_loading(&orders, &schema));
    }
}
