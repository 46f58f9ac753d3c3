//! Free text bone.

use super::ValueCodec;
use crate::context::RequestContext;
use crate::db::{DbValue, FilterOp, Query};
use crate::error::{Error, Result};
use crate::render::BoneParams;
use crate::types::Scalar;
use std::collections::BTreeMap;

/// Default maximum length in characters
pub const DEFAULT_MAX_LENGTH: usize = 254;

/// Message used when a value is longer than `max_length`
pub const TOO_LONG: &str = "Maximum length exceeded";

/// Upper bound appended to a prefix for `$lk` range filters
const PREFIX_UPPER_BOUND: char = '\u{fffd}';

/// Free text
///
/// Case-insensitive bones store `{val, idx}` with a lower-cased `idx` so
/// they can be queried without regard to case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringBone {
    max_length: usize,
    case_sensitive: bool,
}

impl Default for StringBone {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            case_sensitive: true,
        }
    }
}

impl StringBone {
    /// Case-sensitive text of at most 254 characters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the length in characters
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Compare and filter without regard to case
    #[must_use]
    pub const fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Whether comparisons respect case
    #[must_use]
    pub const fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::configuration("str", "max_length must be positive"));
        }
        Ok(())
    }

    pub(super) fn check_length(&self, value: &str) -> std::result::Result<(), String> {
        if value.chars().count() > self.max_length {
            Err(TOO_LONG.to_string())
        } else {
            Ok(())
        }
    }

    pub(super) fn store_text(&self, value: &Scalar, indexed: bool) -> DbValue {
        let Some(text) = value.as_str() else {
            return DbValue::Null;
        };
        if indexed && !self.case_sensitive {
            let mut map = BTreeMap::new();
            map.insert("val".to_string(), DbValue::Text(text.to_string()));
            map.insert("idx".to_string(), DbValue::Text(text.to_lowercase()));
            DbValue::Map(map)
        } else {
            DbValue::Text(text.to_string())
        }
    }

    pub(super) fn filter_text(
        &self,
        query: &mut Query,
        field: &str,
        suffix: &str,
        value: &Scalar,
    ) -> bool {
        let Some(text) = value.as_str() else {
            return false;
        };
        let (field, text) = if self.case_sensitive {
            (field.to_string(), text.to_string())
        } else {
            (format!("{field}.idx"), text.to_lowercase())
        };
        if suffix == "$lk" {
            let upper = format!("{text}{PREFIX_UPPER_BOUND}");
            query
                .filter(field.clone(), FilterOp::Ge, DbValue::Text(text))
                .filter(field, FilterOp::Lt, DbValue::Text(upper));
            return true;
        }
        let Some(op) = FilterOp::from_suffix(suffix) else {
            return false;
        };
        query.filter(field, op, DbValue::Text(text));
        true
    }
}

/// Rebuild text from any stored form
///
/// Accepts plain text, `{val, ...}` maps and null (empty string). Other
/// scalars are stringified.
pub(super) fn load_text(stored: &DbValue) -> Option<Scalar> {
    match stored {
        DbValue::Null => Some(Scalar::from("")),
        DbValue::Text(text) => Some(Scalar::from(text.as_str())),
        DbValue::Map(map) => match map.get("val")? {
            DbValue::Text(text) => Some(Scalar::from(text.as_str())),
            DbValue::Null => Some(Scalar::from("")),
            _ => None,
        },
        DbValue::Bool(b) => Some(Scalar::from(b.to_string())),
        DbValue::Int(i) => Some(Scalar::from(i.to_string())),
        DbValue::Float(f) => Some(Scalar::from(f.to_string())),
        DbValue::DateTime(_) | DbValue::List(_) => None,
    }
}

impl ValueCodec for StringBone {
    fn type_name(&self) -> &'static str {
        "str"
    }

    fn parse(&self, raw: &str, _ctx: &RequestContext) -> std::result::Result<Scalar, String> {
        self.check_length(raw)?;
        Ok(Scalar::from(raw))
    }

    fn empty_value(&self) -> Option<Scalar> {
        Some(Scalar::from(""))
    }

    fn to_storage(&self, value: &Scalar, indexed: bool, _ctx: &RequestContext) -> DbValue {
        self.store_text(value, indexed)
    }

    fn from_storage(&self, stored: &DbValue, _ctx: &RequestContext) -> Option<Scalar> {
        load_text(stored)
    }

    fn append_filter(
        &self,
        query: &mut Query,
        field: &str,
        suffix: &str,
        value: &Scalar,
        _ctx: &RequestContext,
    ) -> bool {
        self.filter_text(query, field, suffix, value)
    }

    fn render(&self, value: &Scalar) -> serde_json::Value {
        value
            .as_str()
            .map_or(serde_json::Value::Null, serde_json::Value::from)
    }

    fn params(&self) -> BoneParams {
        BoneParams::Str {
            max_length: self.max_length,
            case_sensitive: self.case_sensitive,
        }
    }
}
