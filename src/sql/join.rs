//! Logical join descriptions produced by the planner.

use std::fmt;

/// The type of join to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Inner,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Inner => write!(f, "INNER"),
        }
    }
}

/// An abstract description of a join to be applied while constructing the
/// query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Table (or join alias) from which the join originates,
    /// e.g. `person`.
    pub source_table: String,

    /// Foreign key on the join source, e.g. `organization_uuid`.
    pub source_column: String,

    /// Table which is joined in, e.g. `organization`.
    pub target_table: String,

    /// Primary key of the target table, e.g. `uuid`.
    pub target_column: String,

    /// Alias under which the target is joined,
    /// e.g. `person_organization`.
    pub alias: String,

    pub join_type: JoinType,
}

impl Join {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
        alias: impl Into<String>,
        join_type: JoinType,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
            alias: alias.into(),
            join_type,
        }
    }
}

/// All the attributes required to count the rows of an entity related to
/// another entity, materialised as a left-joined aggregate sub-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountJoin {
    /// Entity (or join alias) from which the counting originates,
    /// e.g. `user_group`.
    pub origin_entity: String,

    /// Primary key of the origin entity, e.g. `uuid`.
    pub origin_entity_primary_key: String,

    /// Entity whose rows are counted, e.g. `user`.
    pub count_entity: String,

    /// Primary key of the counted entity, e.g. `uuid`.
    pub count_entity_primary_key: String,

    /// Foreign key on the counted entity referencing the origin,
    /// e.g. `user_group_uuid`.
    pub count_entity_foreign_key: String,

    /// Alias for the aggregate sub-query.
    pub alias: String,
}

impl CountJoin {
    pub fn new(
        origin_entity: impl Into<String>,
        origin_entity_primary_key: impl Into<String>,
        count_entity: impl Into<String>,
        count_entity_primary_key: impl Into<String>,
        count_entity_foreign_key: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            origin_entity: origin_entity.into(),
            origin_entity_primary_key: origin_entity_primary_key.into(),
            count_entity: count_entity.into(),
            count_entity_primary_key: count_entity_primary_key.into(),
            count_entity_foreign_key: count_entity_foreign_key.into(),
            alias: alias.into(),
        }
    }
}
