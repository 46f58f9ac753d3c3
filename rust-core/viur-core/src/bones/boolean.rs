//! Flag bone.

use super::ValueCodec;
use crate::context::RequestContext;
use crate::db::{DbValue, FilterOp, Query};
use crate::render::BoneParams;
use crate::types::Scalar;

const TRUTHY: [&str; 3] = ["true", "yes", "1"];

/// Interpret client or stored text as a flag
///
/// Matching is case-insensitive and ignores surrounding whitespace; anything
/// that isn't truthy is `false`.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&value.as_str())
}

/// A flag; parsing never fails
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanBone {
    default_value: bool,
}

impl BooleanBone {
    /// Flag defaulting to `false`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value used when nothing was submitted or stored
    #[must_use]
    pub const fn default_value(mut self, value: bool) -> Self {
        self.default_value = value;
        self
    }
}

impl ValueCodec for BooleanBone {
    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn parse(&self, raw: &str, _ctx: &RequestContext) -> Result<Scalar, String> {
        Ok(Scalar::Bool(parse_bool(raw)))
    }

    fn empty_value(&self) -> Option<Scalar> {
        Some(Scalar::Bool(self.default_value))
    }

    fn is_empty(&self, value: &Scalar) -> bool {
        value.as_bool() != Some(true)
    }

    fn to_storage(&self, value: &Scalar, _indexed: bool, _ctx: &RequestContext) -> DbValue {
        value.as_bool().map_or(DbValue::Null, DbValue::Bool)
    }

    fn from_storage(&self, stored: &DbValue, _ctx: &RequestContext) -> Option<Scalar> {
        let value = match stored {
            DbValue::Bool(b) => *b,
            DbValue::Null => self.default_value,
            DbValue::Int(i) => *i == 1,
            DbValue::Text(text) => parse_bool(text),
            DbValue::Float(_) | DbValue::DateTime(_) | DbValue::List(_) | DbValue::Map(_) => {
                return None;
            }
        };
        Some(Scalar::Bool(value))
    }

    fn append_filter(
        &self,
        query: &mut Query,
        field: &str,
        suffix: &str,
        value: &Scalar,
        _ctx: &RequestContext,
    ) -> bool {
        let (Some(flag), "") = (value.as_bool(), suffix) else {
            return false;
        };
        query.filter(field, FilterOp::Eq, DbValue::Bool(flag));
        true
    }

    fn render(&self, value: &Scalar) -> serde_json::Value {
        value
            .as_bool()
            .map_or(serde_json::Value::Null, serde_json::Value::Bool)
    }

    fn params(&self) -> BoneParams {
        BoneParams::Bool {
            default_value: self.default_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bones::Bone;
    use crate::config::Conf;
    use crate::db::Entity;
    use crate::i18n::Translations;
    use crate::request::RequestData;
    use crate::types::{BoneValue, ValueCache};
    use crate::validation::ErrorSeverity;
    use std::sync::Arc;

    fn ctx() -> RequestContext {
        RequestContext::detached(Arc::new(Conf::default()), Arc::new(Translations::new()))
    }

    #[test]
    fn test_parse_bool() {
        for truthy in ["True", "true", "1", "yes", " YES "] {
            assert!(parse_bool(truthy), "{truthy}");
        }
        for falsy in ["False", "0", "no", "", "on"] {
            assert!(!parse_bool(falsy), "{falsy}");
        }
    }

    #[test]
    fn test_from_client_never_fails() {
        let bone = Bone::builder(BooleanBone::new()).build().unwrap();
        let mut cache = ValueCache::new();
        let mut data = RequestData::new();
        data.push("active", "whatever");
        bone.from_client(&mut cache, "active", &data, &ctx()).unwrap();
        assert_eq!(cache.get("active"), Some(&BoneValue::Single(Some(Scalar::Bool(false)))));

        bone.from_client(&mut cache, "active", &RequestData::new(), &ctx())
            .unwrap();
        assert_eq!(cache.get("active"), Some(&BoneValue::Single(Some(Scalar::Bool(false)))));
    }

    #[test]
    fn test_required_false_is_empty() {
        let bone = Bone::builder(BooleanBone::new()).required().build().unwrap();
        let mut cache = ValueCache::new();
        let mut data = RequestData::new();
        data.push("accepted", "0");
        let errors = bone.from_client(&mut cache, "accepted", &data, &ctx()).unwrap_err();
        assert_eq!(errors.errors[0].severity, ErrorSeverity::Empty);
    }

    #[test]
    fn test_unserialize_coerces_foreign_types() {
        let bone = Bone::builder(BooleanBone::new()).build().unwrap();
        let mut cache = ValueCache::new();
        for (stored, expected) in [
            (DbValue::Bool(true), Some(true)),
            (DbValue::Text("yes".into()), Some(true)),
            (DbValue::Int(1), Some(true)),
            (DbValue::Int(0), Some(false)),
            (DbValue::Null, Some(false)),
            (DbValue::List(Vec::new()), None),
        ] {
            let mut entity = Entity::new();
            entity.set("active", stored, true);
            bone.unserialize(&mut cache, "active", &entity, &ctx());
            assert_eq!(
                cache.get("active"),
                Some(&BoneValue::Single(expected.map(Scalar::Bool)))
            );
        }
    }

    #[test]
    fn test_filter_equality_only() {
        let bone = Bone::builder(BooleanBone::new()).build().unwrap();
        let mut query = Query::new("user");
        let mut raw = RequestData::new();
        raw.push("active", "1");
        raw.push("active$gt", "1");
        bone.build_filter("active", &mut query, &raw, &ctx());
        assert_eq!(query.len(), 1);
        assert_eq!(query.filters[0].value, DbValue::Bool(true));
    }
}
