//! Per-column sorters: direct ordering and enum-translation ordering.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::enumeration::{Enum, EnumError, EnumMapper, KeyWithTranslation};
use crate::config::schema::TableSchemaColumn;
use crate::config::translator::Translator;
use crate::datasource::{OrderDirection, Value};

/// Errors raised while resolving an ordering.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Enum(#[from] EnumError),
}

/// An ordering which has been processed by a [`Sorter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOrder {
    pub path: String,
    pub direction: OrderDirection,

    /// Fixed positional order; empty means plain directional ordering.
    pub sort_keys: Vec<Value>,
}

/// The common interface for sorting a single column.
pub trait Sorter: Send + Sync {
    /// Convert a path and its column meta data into a [`ResolvedOrder`] for
    /// the given direction and locale. The given path is the resolved path
    /// for the provided column.
    fn order_column(
        &self,
        path: &str,
        column: &TableSchemaColumn,
        direction: OrderDirection,
        locale: &str,
    ) -> Result<ResolvedOrder, OrderError>;
}

/// Sorts by the given column path without further processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl Sorter for Direct {
    fn order_column(
        &self,
        path: &str,
        _column: &TableSchemaColumn,
        direction: OrderDirection,
        _locale: &str,
    ) -> Result<ResolvedOrder, OrderError> {
        Ok(ResolvedOrder {
            path: path.to_string(),
            direction,
            sort_keys: Vec::new(),
        })
    }
}

/// Sorts enum columns by their translated entries under the active locale.
///
/// When the translated order equals the enum keys' lexicographic order (or
/// its exact reverse), the sorter falls back to plain directional ordering;
/// otherwise it imposes the translated sequence as fixed sort keys.
pub struct EnumSorter {
    enums: Arc<EnumMapper>,
    translator: Arc<Translator>,

    /// Suffix appended to translation keys, e.g. `.short` or `.long`.
    translation_suffix: &'static str,
}

impl EnumSorter {
    pub fn new(enums: Arc<EnumMapper>, translator: Arc<Translator>) -> Self {
        Self {
            enums,
            translator,
            translation_suffix: "",
        }
    }

    /// Sorter variant resolving `.short` translations.
    pub fn short(enums: Arc<EnumMapper>, translator: Arc<Translator>) -> Self {
        Self {
            enums,
            translator,
            translation_suffix: ".short",
        }
    }

    /// Sorter variant resolving `.long` translations.
    pub fn long(enums: Arc<EnumMapper>, translator: Arc<Translator>) -> Self {
        Self {
            enums,
            translator,
            translation_suffix: ".long",
        }
    }

    fn entries_sorted_by_translation(
        &self,
        source: &Enum,
        locale: &str,
        reverse: bool,
    ) -> Vec<KeyWithTranslation> {
        let mut entries = source.entries();

        entries.sort_by(|a, b| {
            let left = self.translator.translate_or_marker(
                locale,
                &format!("{}{}", a.translation_key, self.translation_suffix),
            );
            let right = self.translator.translate_or_marker(
                locale,
                &format!("{}{}", b.translation_key, self.translation_suffix),
            );

            let ordering = left.cmp(&right);
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });

        entries
    }
}

impl Sorter for EnumSorter {
    fn order_column(
        &self,
        path: &str,
        column: &TableSchemaColumn,
        direction: OrderDirection,
        locale: &str,
    ) -> Result<ResolvedOrder, OrderError> {
        let source = self.enums.enum_for(&column.column_type)?;

        // Entries in enum key order, against which the translated order is
        // compared.
        let original_entries = source.entries();

        let sorted_entries = self.entries_sorted_by_translation(source, locale, false);
        if original_entries == sorted_entries {
            return Ok(ResolvedOrder {
                path: path.to_string(),
                direction,
                sort_keys: Vec::new(),
            });
        }

        if original_entries == self.entries_sorted_by_translation(source, locale, true) {
            return Ok(ResolvedOrder {
                path: path.to_string(),
                direction: direction.reverse(),
                sort_keys: Vec::new(),
            });
        }

        let sort_keys = sorted_entries
            .into_iter()
            .map(|entry| Value::Str(entry.enum_key))
            .collect();

        Ok(ResolvedOrder {
            path: path.to_string(),
            direction,
            sort_keys,
        })
    }
}

/// The built-in sorter registry. The empty key is the default.
pub fn default_sorters(
    enums: &Arc<EnumMapper>,
    translator: &Arc<Translator>,
) -> HashMap<String, Box<dyn Sorter>> {
    let mut sorters: HashMap<String, Box<dyn Sorter>> = HashMap::new();
    sorters.insert(String::new(), Box::new(Direct));
    sorters.insert(
        "EnumOrder".to_string(),
        Box::new(EnumSorter::new(enums.clone(), translator.clone())),
    );
    sorters.insert(
        "ShortEnumOrder".to_string(),
        Box::new(EnumSorter::short(enums.clone(), translator.clone())),
    );
    sorters.insert(
        "LongEnumOrder".to_string(),
        Box::new(EnumSorter::long(enums.clone(), translator.clone())),
    );

    sorters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::translator::LanguageCatalog;

    fn enum_column(column_type: &str) -> TableSchemaColumn {
        TableSchemaColumn {
            path: "person_salutation".to_string(),
            column_type: column_type.to_string(),
            order: "EnumOrder".to_string(),
            ..TableSchemaColumn::default()
        }
    }

    fn fixtures(translations: Vec<(&str, &str)>) -> (Arc<EnumMapper>, Arc<Translator>) {
        let salutation: Enum = [
            ("MR".to_string(), "enum.salutation.mr".to_string()),
            ("MRS".to_string(), "enum.salutation.mrs".to_string()),
            ("OTHER".to_string(), "enum.salutation.other".to_string()),
        ]
        .into_iter()
        .collect();

        let enums = EnumMapper::from_enums(
            [("Salutation".to_string(), salutation)].into_iter().collect(),
        );

        let catalog: LanguageCatalog = translations
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let translator = Translator::from_catalogs([("de".to_string(), catalog)].into_iter().collect());

        (Arc::new(enums), Arc::new(translator))
    }

    #[test]
    fn reversed_translation_order_flips_direction() {
        let (enums, translator) = fixtures(vec![
            ("enum.salutation.mr", "Herr"),
            ("enum.salutation.mrs", "Frau"),
            ("enum.salutation.other", "Divers"),
        ]);
        // Translated order: Divers, Frau, Herr -> OTHER, MRS, MR (reversed).

        let sorter = EnumSorter::new(enums, translator);
        let resolved = sorter
            .order_column(
                "person.salutation",
                &enum_column("Salutation"),
                OrderDirection::Asc,
                "de",
            )
            .unwrap();

        assert_eq!(resolved.direction, OrderDirection::Desc);
        assert!(resolved.sort_keys.is_empty());
    }

    #[test]
    fn non_linear_translation_order_imposes_sort_keys() {
        let (enums, translator) = fixtures(vec![
            ("enum.salutation.mr", "Herr"),
            ("enum.salutation.mrs", "Anrede Frau"),
            ("enum.salutation.other", "Divers"),
        ]);
        // Translated order: Anrede Frau, Divers, Herr -> MRS, OTHER, MR.

        let sorter = EnumSorter::new(enums, translator);
        let resolved = sorter
            .order_column(
                "person.salutation",
                &enum_column("Salutation"),
                OrderDirection::Asc,
                "de",
            )
            .unwrap();

        assert_eq!(
            resolved.sort_keys,
            vec![
                Value::Str("MRS".to_string()),
                Value::Str("OTHER".to_string()),
                Value::Str("MR".to_string()),
            ]
        );
    }

    #[test]
    fn identity_translation_order_stays_direct_ascending() {
        let (enums, translator) = fixtures(vec![
            ("enum.salutation.mr", "Mr"),
            ("enum.salutation.mrs", "Mrs"),
            ("enum.salutation.other", "Other"),
        ]);

        let sorter = EnumSorter::new(enums, translator);
        let resolved = sorter
            .order_column(
                "person.salutation",
                &enum_column("Salutation"),
                OrderDirection::Asc,
                "de",
            )
            .unwrap();

        assert_eq!(resolved.direction, OrderDirection::Asc);
        assert!(resolved.sort_keys.is_empty());
    }

    #[test]
    fn unknown_enum_errors() {
        let (enums, translator) = fixtures(vec![]);
        let sorter = EnumSorter::new(enums, translator);

        let result = sorter.order_column(
            "person.salutation",
            &enum_column("DoesNotExist"),
            OrderDirection::Asc,
            "de",
        );

        assert!(matches!(result, Err(OrderError::Enum(_))));
    }

    #[test]
    fn short_variant_resolves_suffixed_translations() {
        let (enums, translator) = fixtures(vec![
            ("enum.salutation.mr.short", "Hr."),
            ("enum.salutation.mrs.short", "Fr."),
            ("enum.salutation.other.short", "Dv."),
        ]);
        // Short translated order: Dv., Fr., Hr. -> OTHER, MRS, MR (reversed).

        let sorter = EnumSorter::short(enums, translator);
        let resolved = sorter
            .order_column(
                "person.salutation",
                &enum_column("Salutation"),
                OrderDirection::Desc,
                "de",
            )
            .unwrap();

        assert_eq!(resolved.direction, OrderDirection::Asc);
        assert!(resolved.sort_keys.is_empty());
    }
}
