//! Built-in path resolvers: schema column → SELECT expression.

use std::collections::HashMap;

use crate::config::schema::TableSchemaColumn;
use crate::datasource::PathResolver;
use crate::ident::descriptor_to_identifier;

/// Registry key of the size resolver; columns carrying it denote "count of
/// related rows".
pub const SIZE_PATH_RESOLVER: &str = "SizePathResolver";

/// Resolves a path to `<join prefix>.<column>` in identifier form.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleResolver;

impl PathResolver for SimpleResolver {
    fn resolve_path_name(&self, column: &TableSchemaColumn) -> String {
        let path = &column.path;
        let parts: Vec<&str> = path.split('_').collect();

        match parts.split_last() {
            Some((last, prefix)) if !prefix.is_empty() => {
                descriptor_to_identifier(&format!("{}.{}", prefix.join("_"), last))
            }
            _ => path.clone(),
        }
    }
}

/// Resolves a count-valued path to the `count_result` column of its
/// aggregate sub-query alias.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeResolver;

impl PathResolver for SizeResolver {
    fn resolve_path_name(&self, column: &TableSchemaColumn) -> String {
        // Just reference the alias - it is filled in via joining.
        descriptor_to_identifier(&format!("{}.count_result", column.path))
    }
}

/// The built-in path resolver registry. The empty key is the default.
pub fn default_resolvers() -> HashMap<String, Box<dyn PathResolver>> {
    let mut resolvers: HashMap<String, Box<dyn PathResolver>> = HashMap::new();
    resolvers.insert(String::new(), Box::new(SimpleResolver));
    resolvers.insert(SIZE_PATH_RESOLVER.to_string(), Box::new(SizeResolver));

    resolvers
}
