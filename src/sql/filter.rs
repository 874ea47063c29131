//! Per-column-type filter strategies: value parsing and operator selection.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::datasource::{FilterMode, Value};

/// Errors raised while compiling filter values.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("cannot parse {value:?} as {expected}")]
    CannotParse {
        expected: &'static str,
        value: Value,
    },
}

/// A SQL comparison operator selected for a filter.
///
/// Ordered so that operator buckets compile in a deterministic sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterEquals,
    Lesser,
    LesserEquals,
    Like,
    NotLike,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterEquals => ">=",
            Operator::Lesser => "<",
            Operator::LesserEquals => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        };
        write!(f, "{symbol}")
    }
}

/// Map a filter mode to its SQL operator.
pub fn default_operator(mode: FilterMode) -> Operator {
    match mode {
        FilterMode::Equals => Operator::Equal,
        FilterMode::NotEquals => Operator::NotEqual,
        FilterMode::Greater => Operator::Greater,
        FilterMode::GreaterEquals => Operator::GreaterEquals,
        FilterMode::Lesser => Operator::Lesser,
        FilterMode::LesserEquals => Operator::LesserEquals,
    }
}

/// A per-column-type filter strategy.
pub trait FilterStrategy: Send + Sync {
    /// Serialise a filter value into SQL literal text.
    fn parse_value(&self, value: &Value) -> Result<String, FilterError>;

    /// Select the operator for a value and mode.
    fn operator(&self, value: &Value, mode: FilterMode) -> Result<Operator, FilterError> {
        let _ = value;
        Ok(default_operator(mode))
    }
}

/// Boolean columns. Strings `"1"` and `"true"` (case-insensitive) are truthy;
/// any other string is false.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl FilterStrategy for Boolean {
    fn parse_value(&self, value: &Value) -> Result<String, FilterError> {
        let truthy = match value {
            Value::Bool(boolean) => *boolean,
            Value::Str(text) => text == "1" || text.eq_ignore_ascii_case("true"),
            _ => {
                return Err(FilterError::CannotParse {
                    expected: "boolean",
                    value: value.clone(),
                })
            }
        };

        Ok(if truthy { "true" } else { "false" }.to_string())
    }
}

/// Numeric columns. Strings are parsed as signed integers; parse failures
/// coerce to `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Numeric;

impl FilterStrategy for Numeric {
    fn parse_value(&self, value: &Value) -> Result<String, FilterError> {
        match value {
            Value::Int(number) => Ok(number.to_string()),
            Value::UInt(number) => Ok(number.to_string()),
            Value::Str(text) => Ok(text.parse::<i64>().unwrap_or(0).to_string()),
            _ => Err(FilterError::CannotParse {
                expected: "number",
                value: value.clone(),
            }),
        }
    }
}

/// String columns; values are single-quoted verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainString;

impl FilterStrategy for PlainString {
    fn parse_value(&self, value: &Value) -> Result<String, FilterError> {
        match value {
            Value::Str(text) => Ok(format!("'{text}'")),
            _ => Err(FilterError::CannotParse {
                expected: "string",
                value: value.clone(),
            }),
        }
    }
}

/// String columns supporting `.*` wildcards, which compile to `LIKE`
/// patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexString;

impl FilterStrategy for RegexString {
    fn parse_value(&self, value: &Value) -> Result<String, FilterError> {
        match value {
            Value::Str(text) => Ok(format!("'{}'", text.replace(".*", "%"))),
            _ => Err(FilterError::CannotParse {
                expected: "string",
                value: value.clone(),
            }),
        }
    }

    fn operator(&self, value: &Value, mode: FilterMode) -> Result<Operator, FilterError> {
        let Value::Str(text) = value else {
            return Err(FilterError::CannotParse {
                expected: "string",
                value: value.clone(),
            });
        };

        if text.contains(".*") {
            match mode {
                FilterMode::Equals => return Ok(Operator::Like),
                FilterMode::NotEquals => return Ok(Operator::NotLike),
                _ => {}
            }
        }

        Ok(default_operator(mode))
    }
}

/// The built-in filter strategy registry. The empty key is the default.
pub fn default_filters() -> HashMap<String, Box<dyn FilterStrategy>> {
    let mut filters: HashMap<String, Box<dyn FilterStrategy>> = HashMap::new();
    filters.insert(String::new(), Box::new(PlainString));
    filters.insert("BooleanFilter".to_string(), Box::new(Boolean));
    filters.insert("StringFilter".to_string(), Box::new(PlainString));
    filters.insert("StringRegExFilter".to_string(), Box::new(RegexString));
    filters.insert("EnumFilter".to_string(), Box::new(PlainString));
    filters.insert("NumericFilter".to_string(), Box::new(Numeric));
    filters.insert("DateFilter".to_string(), Box::new(PlainString));
    filters.insert("DateTimeFilter".to_string(), Box::new(PlainString));

    filters
}
