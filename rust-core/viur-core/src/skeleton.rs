//! # Skeletons
//!
//! A skeleton is a named, ordered set of bones describing one entity kind.
//! It runs each bone's lifecycle operation over a shared [`ValueCache`] and
//! collects the results; client errors of every bone are reported together.

use crate::bones::Bone;
use crate::context::RequestContext;
use crate::db::{Entity, Query};
use crate::error::{Error, Result};
use crate::render::{render_value, BoneStructure};
use crate::request::RequestData;
use crate::types::{Scalar, ValueCache};
use crate::validation::{ValidationErrors, ValidationResult};
use tracing::debug;

/// Schema of one entity kind
#[derive(Debug, Clone)]
pub struct Skeleton {
    kind: String,
    bones: Vec<(String, Bone)>,
}

impl Skeleton {
    /// Start an empty schema for `kind`
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bones: Vec::new(),
        }
    }

    /// Add a bone
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateBone` if the name is taken, and
    /// `Error::Configuration` if it is empty or contains `.` or `$`, which
    /// are reserved for language and filter suffixes.
    pub fn add(mut self, name: impl Into<String>, bone: Bone) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['.', '$']) {
            return Err(Error::configuration(
                bone.type_name(),
                format!("invalid bone name {name:?}"),
            ));
        }
        if self.bone(&name).is_some() {
            return Err(Error::DuplicateBone {
                skeleton: self.kind,
                bone: name,
            });
        }
        self.bones.push((name, bone));
        Ok(self)
    }

    /// Entity kind
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Look up a bone by name
    #[must_use]
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones
            .iter()
            .find(|(bone_name, _)| bone_name == name)
            .map(|(_, bone)| bone)
    }

    /// Bones in definition order
    pub fn bones(&self) -> impl Iterator<Item = (&str, &Bone)> {
        self.bones.iter().map(|(name, bone)| (name.as_str(), bone))
    }

    /// A cache holding every bone's empty value
    #[must_use]
    pub fn empty_values(&self) -> ValueCache {
        let mut cache = ValueCache::new();
        for (name, bone) in &self.bones {
            cache.set(name.as_str(), bone.empty_value());
        }
        cache
    }

    /// Read every writable bone from client data
    ///
    /// Read-only bones are left untouched. All bones are processed even
    /// after an error.
    ///
    /// # Errors
    ///
    /// Returns the errors of all bones that rejected their input.
    pub fn from_client(
        &self,
        cache: &mut ValueCache,
        data: &RequestData,
        ctx: &RequestContext,
    ) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        for (name, bone) in self.bones.iter().filter(|(_, bone)| !bone.is_readonly()) {
            if let Err(bone_errors) = bone.from_client(cache, name, data, ctx) {
                errors.merge(bone_errors);
            }
        }
        if !errors.is_empty() {
            debug!(kind = %self.kind, errors = errors.len(), "Client data rejected");
        }
        errors.into_result()
    }

    /// Write every bone into a new entity
    #[must_use]
    pub fn serialize(&self, cache: &ValueCache, ctx: &RequestContext) -> Entity {
        let mut entity = Entity::new();
        for (name, bone) in &self.bones {
            bone.serialize(cache, name, &mut entity, ctx);
        }
        entity
    }

    /// Apply magic, then write every bone into a new entity
    ///
    /// `is_add` marks the first save of an entity.
    pub fn to_entity(&self, cache: &mut ValueCache, is_add: bool, ctx: &RequestContext) -> Entity {
        for (name, bone) in &self.bones {
            bone.perform_magic(cache, name, is_add, ctx);
        }
        self.serialize(cache, ctx)
    }

    /// Rebuild every bone from a stored entity
    #[must_use]
    pub fn unserialize(&self, entity: &Entity, ctx: &RequestContext) -> ValueCache {
        let mut cache = ValueCache::new();
        for (name, bone) in &self.bones {
            bone.unserialize(&mut cache, name, entity, ctx);
        }
        cache
    }

    /// Build a query over this kind from raw filter parameters
    ///
    /// Parameters that don't address a bone or don't parse are ignored.
    #[must_use]
    pub fn build_query(&self, raw_filter: &RequestData, ctx: &RequestContext) -> Query {
        let mut query = Query::new(self.kind.as_str());
        for (name, bone) in &self.bones {
            bone.build_filter(name, &mut query, raw_filter, ctx);
        }
        query
    }

    /// Set one bone's value directly
    ///
    /// Returns `false` for unknown bones and misuse (see
    /// [`Bone::set_bone_value`]).
    pub fn set_bone_value(
        &self,
        cache: &mut ValueCache,
        name: &str,
        value: Scalar,
        append: bool,
        language: Option<&str>,
    ) -> bool {
        self.bone(name)
            .is_some_and(|bone| bone.set_bone_value(cache, name, value, append, language))
    }

    /// Descriptions of all bones as `[name, structure]` pairs
    #[must_use]
    pub fn structure(&self) -> Vec<(String, BoneStructure)> {
        self.bones
            .iter()
            .map(|(name, bone)| (name.clone(), bone.describe()))
            .collect()
    }

    /// Display forms of all bone values
    #[must_use]
    pub fn render_values(&self, cache: &ValueCache) -> serde_json::Map<String, serde_json::Value> {
        self.bones
            .iter()
            .map(|(name, bone)| (name.clone(), render_value(bone, cache.get(name))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bones::{BooleanBone, DateBone, EmailBone, StringBone};
    use crate::config::Conf;
    use crate::db::{DbValue, FilterOp};
    use crate::i18n::Translations;
    use crate::types::BoneValue;
    use crate::validation::ErrorSeverity;
    use std::sync::Arc;

    fn ctx() -> RequestContext {
        RequestContext::detached(Arc::new(Conf::default()), Arc::new(Translations::with_builtin()))
    }

    fn user_skel() -> Skeleton {
        Skeleton::new("user")
            .add("name", Bone::builder(StringBone::new()).required().build().unwrap())
            .unwrap()
            .add("email", Bone::builder(EmailBone::new()).required().build().unwrap())
            .unwrap()
            .add("birthday", Bone::builder(DateBone::date_only()).build().unwrap())
            .unwrap()
            .add("active", Bone::builder(BooleanBone::new()).build().unwrap())
            .unwrap()
            .add(
                "creationdate",
                Bone::builder(DateBone::new().creation_magic()).build().unwrap(),
            )
            .unwrap()
            .add(
                "bio",
                Bone::builder(StringBone::new())
                    .languages(["en", "de"])
                    .build()
                    .unwrap(),
            )
            .unwrap()
    }

    fn data(pairs: &[(&str, &str)]) -> RequestData {
        let mut data = RequestData::new();
        for (key, value) in pairs {
            data.push(*key, *value);
        }
        data
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let result = Skeleton::new("user")
            .add("name", Bone::builder(StringBone::new()).build().unwrap())
            .unwrap()
            .add("name", Bone::builder(StringBone::new()).build().unwrap());
        assert!(matches!(result, Err(Error::DuplicateBone { .. })));

        let result = Skeleton::new("user")
            .add("name.de", Bone::builder(StringBone::new()).build().unwrap());
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_from_client_collects_all_errors() {
        let skel = user_skel();
        let mut cache = skel.empty_values();
        let data = data(&[("email", "broken"), ("birthday", "31.02.2020")]);

        let errors = skel.from_client(&mut cache, &data, &ctx()).unwrap_err();
        let by_field = errors.by_field();
        assert_eq!(by_field["name"][0].severity, ErrorSeverity::NotSet);
        assert_eq!(by_field["email"][0].message, "Invalid email entered");
        assert_eq!(by_field["birthday"][0].severity, ErrorSeverity::Invalid);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_from_client_skips_readonly() {
        let skel = user_skel();
        let mut cache = skel.empty_values();
        let data = data(&[
            ("name", "Ada"),
            ("email", "ada@example.com"),
            ("creationdate", "01.01.2000"),
            ("bio.de", "Mathematikerin"),
        ]);
        skel.from_client(&mut cache, &data, &ctx()).unwrap();

        assert_eq!(cache.get("creationdate"), Some(&BoneValue::Single(None)));
        let bio = cache.get("bio").unwrap();
        assert_eq!(bio.language("de"), Some(&Scalar::from("Mathematikerin")));
        assert_eq!(bio.language_keys(), vec!["de", "en"]);
    }

    #[test]
    fn test_to_entity_runs_magic_on_add_only() {
        let skel = user_skel();
        let mut cache = skel.empty_values();
        skel.set_bone_value(&mut cache, "name", Scalar::from("Ada"), false, None);

        let entity = skel.to_entity(&mut cache, true, &ctx());
        assert!(matches!(entity.get("creationdate"), Some(DbValue::DateTime(_))));
        assert_eq!(entity.get("name"), Some(&DbValue::Text("Ada".into())));
        assert_eq!(entity.get("active"), Some(&DbValue::Bool(false)));

        let mut later = skel.empty_values();
        let entity = skel.to_entity(&mut later, false, &ctx());
        assert_eq!(entity.get("creationdate"), Some(&DbValue::Null));
    }

    #[test]
    fn test_unserialize_round_trip() {
        let skel = user_skel();
        let mut cache = skel.empty_values();
        let data = data(&[
            ("name", "Ada"),
            ("email", "ada@example.com"),
            ("birthday", "10.12.1990"),
            ("active", "yes"),
        ]);
        skel.from_client(&mut cache, &data, &ctx()).unwrap();

        let entity = skel.serialize(&cache, &ctx());
        let restored = skel.unserialize(&entity, &ctx());
        for name in ["name", "email", "birthday", "active"] {
            assert_eq!(restored.get(name), cache.get(name), "{name}");
        }
    }

    #[test]
    fn test_unserialize_missing_properties() {
        let skel = user_skel();
        let restored = skel.unserialize(&Entity::new(), &ctx());
        assert_eq!(restored.len(), 6);
        assert_eq!(restored.get("bio").unwrap().language_keys(), vec!["de", "en"]);
    }

    #[test]
    fn test_build_query_ignores_bad_values() {
        let skel = user_skel();
        let raw = data(&[
            ("name", "Ada"),
            ("birthday$gt", "garbage"),
            ("active", "1"),
            ("unknown", "x"),
        ]);
        let query = skel.build_query(&raw, &ctx());
        assert_eq!(query.kind, "user");
        assert_eq!(query.len(), 2);
        assert!(query
            .filters
            .iter()
            .all(|f| f.op == FilterOp::Eq && (f.field == "name" || f.field == "active")));
    }

    #[test]
    fn test_set_bone_value_unknown_bone() {
        let skel = user_skel();
        let mut cache = skel.empty_values();
        assert!(!skel.set_bone_value(&mut cache, "missing", Scalar::from("x"), false, None));
        assert!(skel.set_bone_value(&mut cache, "bio", Scalar::from("x"), false, Some("en")));
    }

    #[test]
    fn test_structure_and_values() {
        let skel = user_skel();
        let mut cache = skel.empty_values();
        skel.set_bone_value(&mut cache, "name", Scalar::from("Ada"), false, None);

        let structure = skel.structure();
        assert_eq!(structure[0].0, "name");
        assert_eq!(structure[1].1.type_name, "str.email");
        let creation = &structure[4].1;
        assert!(creation.readonly && !creation.visible);

        let values = skel.render_values(&cache);
        assert_eq!(values["name"], "Ada");
        assert_eq!(values["bio"], serde_json::json!({"en": null, "de": null}));
        assert_eq!(values["active"], false);

        let json = crate::render::to_json(&structure).unwrap();
        assert!(json.starts_with(r#"[["name",{"#));
    }
}
