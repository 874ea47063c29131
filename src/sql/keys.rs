//! Primary key and relation lookup over pre-loaded introspection caches.

use thiserror::Error;

use crate::ident::descriptor_to_identifier;
use crate::sql::database::{KeyPair, PrimaryKeyMap, RelationMap, TablePair};

/// Errors raised when the introspection caches cannot answer a key question.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("no primary key known for table {table}")]
    UnknownPrimaryKey { table: String },

    #[error("no relation known between {origin} and {target}")]
    UnknownRelation { origin: String, target: String },
}

/// Resolves primary and foreign keys, as well as relations between two
/// tables, from caches populated by the dialect driver.
///
/// Table names passed in are normalised through the descriptor → identifier
/// conversion, so both path segments and physical names are accepted.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    primary_keys: PrimaryKeyMap,
    relations: RelationMap,
}

impl KeyResolver {
    pub fn new(primary_keys: PrimaryKeyMap, relations: RelationMap) -> Self {
        Self {
            primary_keys,
            relations,
        }
    }

    /// The primary key columns of a table; composite keys are permitted.
    pub fn primary_key(&self, table: &str) -> Result<&[String], KeyError> {
        let identifier = descriptor_to_identifier(table);

        self.primary_keys
            .get(&identifier)
            .filter(|columns| !columns.is_empty())
            .map(Vec::as_slice)
            .ok_or(KeyError::UnknownPrimaryKey { table: identifier })
    }

    /// The first (canonical) primary key column of a table.
    pub fn first_primary_key(&self, table: &str) -> Result<&str, KeyError> {
        self.primary_key(table)
            .map(|columns| columns[0].as_str())
    }

    /// All foreign key pairs linking `origin` to `target`.
    pub fn relation(&self, origin: &str, target: &str) -> Result<&[KeyPair], KeyError> {
        let pair = TablePair {
            origin: descriptor_to_identifier(origin),
            target: descriptor_to_identifier(target),
        };

        match self.relations.get(&pair).filter(|pairs| !pairs.is_empty()) {
            Some(pairs) => Ok(pairs.as_slice()),
            None => Err(KeyError::UnknownRelation {
                origin: pair.origin,
                target: pair.target,
            }),
        }
    }

    /// The first (canonical) foreign key pair linking `origin` to `target`.
    pub fn first_relation(&self, origin: &str, target: &str) -> Result<&KeyPair, KeyError> {
        self.relation(origin, target).map(|pairs| &pairs[0])
    }
}
