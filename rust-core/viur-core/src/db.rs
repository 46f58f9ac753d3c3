//! # Storage Collaborator
//!
//! The minimal surface the bone layer needs from the document store:
//! a property value type, an entity to read from and write into, and a
//! query that collects filter constraints.
//!
//! Transport, transactions and indexes live in the storage engine, not here.
//! Everything stored through these types is locale-neutral: datetimes are
//! always UTC.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A property value as held by the document store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    Text(String),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// Repeated value
    List(Vec<DbValue>),
    /// Embedded mapping (per-language values, `{val, idx}` pairs)
    Map(BTreeMap<String, DbValue>),
}

impl DbValue {
    /// Check for `Null`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as text if `Text` variant
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the entries of a `List`
    #[must_use]
    pub fn as_list(&self) -> Option<&[DbValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// Get the entries of a `Map`
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, DbValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short type name for diagnostics
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

/// A stored document: named properties plus per-property index flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    properties: BTreeMap<String, DbValue>,
    unindexed: BTreeSet<String>,
}

impl Entity {
    /// Create an empty entity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property, `None` if it is absent
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DbValue> {
        self.properties.get(name)
    }

    /// Get a property or `default` if it is absent
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a DbValue) -> &'a DbValue {
        self.properties.get(name).unwrap_or(default)
    }

    /// Set a property and whether it should be indexed
    pub fn set(&mut self, name: impl Into<String>, value: DbValue, indexed: bool) {
        let name = name.into();
        if indexed {
            self.unindexed.remove(&name);
        } else {
            self.unindexed.insert(name.clone());
        }
        self.properties.insert(name, value);
    }

    /// Check whether a property exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Whether a present property is indexed
    #[must_use]
    pub fn is_indexed(&self, name: &str) -> bool {
        self.contains(name) && !self.unindexed.contains(name)
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DbValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the entity has no properties
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Comparison operator of a filter constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterOp {
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
}

impl FilterOp {
    /// Map a raw filter key suffix (`$lt`, `$gt`, ...) to an operator
    ///
    /// An empty suffix means equality. `$lk` is bone-specific and not
    /// handled here.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" => Some(Self::Eq),
            "$lt" => Some(Self::Lt),
            "$gt" => Some(Self::Gt),
            "$le" => Some(Self::Le),
            "$ge" => Some(Self::Ge),
            _ => None,
        }
    }

    /// Operator symbol
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One `(field, operator, value)` constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    /// Property name
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Value to compare against (storage representation)
    pub value: DbValue,
}

/// A query under construction for one kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    /// Entity kind
    pub kind: String,
    /// Accumulated constraints
    pub filters: Vec<Filter>,
}

impl Query {
    /// Start a query over `kind`
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
        }
    }

    /// Append a constraint
    pub fn filter(&mut self, field: impl Into<String>, op: FilterOp, value: DbValue) -> &mut Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Number of constraints
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if no constraint has been added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_set_get() {
        let mut entity = Entity::new();
        entity.set("name", DbValue::Text("Alice".to_string()), true);
        entity.set("bio", DbValue::Text("long".to_string()), false);

        assert!(entity.contains("name"));
        assert_eq!(entity.get("name").and_then(DbValue::as_text), Some("Alice"));
        assert!(entity.is_indexed("name"));
        assert!(!entity.is_indexed("bio"));
        assert!(!entity.is_indexed("missing"));
        assert_eq!(entity.get_or("missing", &DbValue::Null), &DbValue::Null);
    }

    #[test]
    fn test_reindexing_a_property() {
        let mut entity = Entity::new();
        entity.set("name", DbValue::Null, false);
        entity.set("name", DbValue::Null, true);
        assert!(entity.is_indexed("name"));
        assert_eq!(entity.len(), 1);
    }

    #[test]
    fn test_filter_suffixes() {
        assert_eq!(FilterOp::from_suffix(""), Some(FilterOp::Eq));
        assert_eq!(FilterOp::from_suffix("$lt"), Some(FilterOp::Lt));
        assert_eq!(FilterOp::from_suffix("$ge"), Some(FilterOp::Ge));
        assert_eq!(FilterOp::from_suffix("$lk"), None);
        assert_eq!(FilterOp::Le.to_string(), "<=");
    }

    #[test]
    fn test_query_filter() {
        let mut query = Query::new("user");
        assert!(query.is_empty());
        query
            .filter("age", FilterOp::Gt, DbValue::Int(18))
            .filter("name", FilterOp::Eq, DbValue::Text("Bob".to_string()));
        assert_eq!(query.len(), 2);
        assert_eq!(query.filters[0].field, "age");
    }

    #[test]
    fn test_db_value_serializes_untagged() {
        let value = DbValue::List(vec![DbValue::Int(1), DbValue::Null]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1,null]");
        assert_eq!(DbValue::Bool(true).type_name(), "bool");
    }
}
