//! The dialect-facing query builder and the order/filter compilation on top
//! of it.
//!
//! The trait carries common default bodies for everything that composes the
//! same way across SQL dialects; concrete dialects only override where
//! dialects actually diverge (pagination, NULL substitution).

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::schema::TableSchemaColumn;
use crate::datasource::{FilterGroup, Order, OrderDirection, Value};
use crate::sql::filter::{FilterError, FilterStrategy, Operator};
use crate::sql::join::{CountJoin, Join};
use crate::sql::order::{OrderError, Sorter};

/// Composes JOIN/WHERE/ORDER/LIMIT fragments for one SQL dialect.
pub trait QueryBuilder: Send + Sync {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Render a resolved join.
    fn join_fragment(&self, join: &Join) -> String {
        format!(
            "{} JOIN {} AS {} ON {}.{}={}.{}",
            join.join_type,
            join.target_table,
            join.alias,
            join.alias,
            join.target_column,
            join.source_table,
            join.source_column,
        )
    }

    /// Render a count join as a left-joined aggregate sub-query.
    fn count_join_fragment(&self, count: &CountJoin) -> String {
        format!(
            "LEFT JOIN (SELECT {fk}, COUNT({pk}) AS count_result FROM {entity} GROUP BY {fk}) AS {alias} ON {alias}.{fk} = {origin}.{origin_pk}",
            fk = count.count_entity_foreign_key,
            pk = count.count_entity_primary_key,
            entity = count.count_entity,
            alias = count.alias,
            origin = count.origin_entity,
            origin_pk = count.origin_entity_primary_key,
        )
    }

    /// Substitute a fallback for NULL expressions.
    fn if_null(&self, expr: &str, fallback: &str) -> String;

    /// Wrap an inner query (without the SELECT keyword) into a full SELECT
    /// with parameterised LIMIT/OFFSET.
    fn select_with_limit(&self, inner: &str) -> String;

    /// Render a plain directional ordering.
    fn order_column(&self, path: &str, direction: OrderDirection) -> String {
        format!("{path} {direction}")
    }

    /// Render a fixed positional ordering as a CASE expression.
    fn order_column_by_array(
        &self,
        path: &str,
        values: &[Value],
        direction: OrderDirection,
    ) -> String {
        let cases: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Str(text) => format!("WHEN '{text}' THEN {index}"),
                other => format!("WHEN {} THEN {index}", render_plain(other)),
            })
            .collect();

        format!("CASE {path} {} ELSE -1 END {direction}", cases.join(" "))
    }

    /// Compose a single filter expression for a path from multiple values of
    /// one operator; the values OR together. Multiple equality comparisons
    /// collapse into `IN`/`NOT IN`.
    fn filter_from_values(
        &self,
        path: &str,
        strategy: &dyn FilterStrategy,
        operator: Operator,
        values: &[Value],
    ) -> Result<String, FilterError> {
        let parsed: Vec<String> = values
            .iter()
            .map(|value| strategy.parse_value(value))
            .collect::<Result<_, _>>()?;

        if let [single] = parsed.as_slice() {
            return Ok(self.filter_from_value(path, operator, single));
        }

        match operator {
            Operator::Equal => Ok(format!("{path} IN ({})", parsed.join(","))),
            Operator::NotEqual => Ok(format!("{path} NOT IN ({})", parsed.join(","))),
            _ => {
                // No IN equivalent for these operators, so they OR-chain.
                let chained: Vec<String> = parsed
                    .iter()
                    .map(|value| self.filter_from_value(path, operator, value))
                    .collect();

                Ok(chained.join(" OR "))
            }
        }
    }

    /// Render a single comparison.
    fn filter_from_value(&self, path: &str, operator: Operator, value: &str) -> String {
        format!("{path} {operator} {value}")
    }
}

fn render_plain(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(boolean) => boolean.to_string(),
        Value::Int(number) => number.to_string(),
        Value::UInt(number) => number.to_string(),
        Value::Float(number) => number.to_string(),
        Value::Str(text) => text.clone(),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Compile one ordering into its ORDER BY fragment.
///
/// User-supplied sort keys take precedence over the column's sorter. When
/// the keys happen to already be sorted (in either direction) the CASE form
/// is skipped in favor of plain directional ordering.
pub fn compile_order(
    builder: &dyn QueryBuilder,
    path: &str,
    column: &TableSchemaColumn,
    sorter: &dyn Sorter,
    order: &Order,
    locale: &str,
) -> Result<String, OrderError> {
    if !order.sort_keys.is_empty() {
        let sanitized: Option<Vec<String>> = order
            .sort_keys
            .iter()
            .map(Value::coerce_to_string)
            .collect();

        match sanitized {
            Some(keys) => {
                let mut sorted = keys.clone();
                sorted.sort();

                if keys == sorted {
                    return Ok(builder.order_column(path, order.direction));
                }

                sorted.reverse();
                if keys == sorted {
                    return Ok(builder.order_column(path, order.direction.reverse()));
                }

                return Ok(builder.order_column_by_array(path, &order.sort_keys, order.direction));
            }
            None => {
                debug!(path = %order.path, "sort keys are not string coercible - falling back to column sorter");
            }
        }
    }

    let resolved = sorter.order_column(path, column, order.direction, locale)?;

    if resolved.sort_keys.is_empty() {
        Ok(builder.order_column(&resolved.path, resolved.direction))
    } else {
        Ok(builder.order_column_by_array(&resolved.path, &resolved.sort_keys, resolved.direction))
    }
}

/// Compile the filter groups of one path into its predicate.
///
/// Within a group, filters bucket by operator and the buckets OR together;
/// the per-group predicates AND together.
pub fn compile_filter_groups(
    builder: &dyn QueryBuilder,
    path: &str,
    strategy: &dyn FilterStrategy,
    groups: &[&FilterGroup],
) -> Result<String, FilterError> {
    let mut and_filters = Vec::with_capacity(groups.len());

    for group in groups {
        let mut buckets: BTreeMap<Operator, Vec<Value>> = BTreeMap::new();
        for filter in &group.filters {
            let operator = strategy.operator(&filter.value, filter.mode)?;
            buckets.entry(operator).or_default().push(filter.value.clone());
        }

        let or_filters: Vec<String> = buckets
            .iter()
            .map(|(operator, values)| builder.filter_from_values(path, strategy, *operator, values))
            .collect::<Result<_, _>>()?;

        and_filters.push(or_filters.join(" OR "));
    }

    Ok(and_filters.join(" AND "))
}
