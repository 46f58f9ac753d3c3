//! # Bones
//!
//! A bone describes one field of a skeleton: how a single value is parsed
//! from client input, validated, written to storage and read back.
//!
//! The type-specific part lives in a [`ValueCodec`] (one per bone type).
//! [`Bone`] adds the type-independent configuration (multiplicity,
//! languages, flags) and exposes the lifecycle operations. Those are
//! implemented once for every codec in the `multiplicity` module, which
//! lifts single-value logic into the four layouts
//! {single, multiple} x {unlocalized, per-language}.
//!
//! Bones are built once when a skeleton is defined and are immutable
//! afterwards.

pub mod boolean;
pub mod date;
pub mod email;
pub mod string;

mod multiplicity;

pub use boolean::BooleanBone;
pub use date::DateBone;
pub use email::{validate_email, EmailBone};
pub use string::StringBone;

use crate::context::RequestContext;
use crate::db::{DbValue, Entity, FilterOp, Query};
use crate::error::{Error, Result};
use crate::render::BoneParams;
use crate::request::RequestData;
use crate::types::{BoneValue, Scalar, ValueCache};
use crate::validation::ValidationResult;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Type-specific handling of one scalar value
pub trait ValueCodec: fmt::Debug + Send + Sync {
    /// Type tag, e.g. `"date"` or `"str.email"`
    fn type_name(&self) -> &'static str;

    /// Parse one non-blank client value
    ///
    /// # Errors
    ///
    /// Returns the user-visible message if the value is malformed.
    fn parse(&self, raw: &str, ctx: &RequestContext) -> std::result::Result<Scalar, String>;

    /// Value of a single bone that holds nothing
    fn empty_value(&self) -> Option<Scalar> {
        None
    }

    /// Whether a parsed value counts as "no value" for `required` checks
    fn is_empty(&self, value: &Scalar) -> bool {
        matches!(value, Scalar::Str(s) if s.trim().is_empty())
    }

    /// Storage representation of one value
    fn to_storage(&self, value: &Scalar, indexed: bool, ctx: &RequestContext) -> DbValue;

    /// Rebuild one value from storage; `None` for null or unrecognized input
    fn from_storage(&self, stored: &DbValue, ctx: &RequestContext) -> Option<Scalar>;

    /// Append the constraint for one parsed filter value
    ///
    /// `suffix` is the operator part of the filter key (`""`, `"$lt"`, ...).
    /// Returns `false` if the suffix isn't supported by this type.
    fn append_filter(
        &self,
        query: &mut Query,
        field: &str,
        suffix: &str,
        value: &Scalar,
        ctx: &RequestContext,
    ) -> bool {
        let Some(op) = FilterOp::from_suffix(suffix) else {
            return false;
        };
        query.filter(field, op, self.to_storage(value, false, ctx));
        true
    }

    /// Display form of one value for renderers
    fn render(&self, value: &Scalar) -> serde_json::Value;

    /// Type-specific part of the bone structure
    fn params(&self) -> BoneParams;

    /// Value to force on save, if this codec is configured for it
    fn magic_value(&self, _is_add: bool, _ctx: &RequestContext) -> Option<Scalar> {
        None
    }

    /// Whether this codec sets its value itself on save
    fn has_magic(&self) -> bool {
        false
    }
}

/// The bone types known to the framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoneKind {
    /// Date, time or date+time
    Date(DateBone),
    /// Free text
    Str(StringBone),
    /// E-mail address
    Email(EmailBone),
    /// Flag
    Bool(BooleanBone),
}

impl BoneKind {
    /// The codec behind this kind
    #[must_use]
    pub fn codec(&self) -> &dyn ValueCodec {
        match self {
            Self::Date(bone) => bone,
            Self::Str(bone) => bone,
            Self::Email(bone) => bone,
            Self::Bool(bone) => bone,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Date(bone) => bone.validate(),
            Self::Str(bone) => bone.validate(),
            Self::Email(bone) => bone.validate(),
            Self::Bool(_) => Ok(()),
        }
    }
}

impl From<DateBone> for BoneKind {
    fn from(bone: DateBone) -> Self {
        Self::Date(bone)
    }
}

impl From<StringBone> for BoneKind {
    fn from(bone: StringBone) -> Self {
        Self::Str(bone)
    }
}

impl From<EmailBone> for BoneKind {
    fn from(bone: EmailBone) -> Self {
        Self::Email(bone)
    }
}

impl From<BooleanBone> for BoneKind {
    fn from(bone: BooleanBone) -> Self {
        Self::Bool(bone)
    }
}

type ValidatorFn = dyn Fn(&Scalar) -> Option<String> + Send + Sync;

/// Extra validation run on every parsed value
///
/// The function returns an error message for invalid values.
#[derive(Clone)]
pub struct Validator(Arc<ValidatorFn>);

impl Validator {
    fn check(&self, value: &Scalar) -> Option<String> {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// A field descriptor of a skeleton
#[derive(Debug, Clone)]
pub struct Bone {
    kind: BoneKind,
    descr: String,
    required: bool,
    readonly: bool,
    visible: bool,
    indexed: bool,
    multiple: bool,
    languages: Option<Vec<String>>,
    validator: Option<Validator>,
}

impl Bone {
    /// Start building a bone of the given kind
    pub fn builder(kind: impl Into<BoneKind>) -> BoneBuilder {
        BoneBuilder {
            bone: Self {
                kind: kind.into(),
                descr: String::new(),
                required: false,
                readonly: false,
                visible: true,
                indexed: true,
                multiple: false,
                languages: None,
                validator: None,
            },
        }
    }

    /// Bone kind
    #[must_use]
    pub const fn kind(&self) -> &BoneKind {
        &self.kind
    }

    /// Codec of the bone kind
    #[must_use]
    pub fn codec(&self) -> &dyn ValueCodec {
        self.kind.codec()
    }

    /// Type tag
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.codec().type_name()
    }

    /// Human-readable description
    #[must_use]
    pub fn descr(&self) -> &str {
        &self.descr
    }

    /// Whether an empty value is an error
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Whether client input is ignored for this bone
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Whether the bone is shown in input forms
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the stored value is indexed
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether the bone holds a sequence of values
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Configured languages, `None` for unlocalized bones
    #[must_use]
    pub fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    /// The value this bone holds when nothing was set
    ///
    /// Localized bones carry every configured language key.
    #[must_use]
    pub fn empty_value(&self) -> BoneValue {
        match (&self.languages, self.multiple) {
            (None, false) => BoneValue::Single(self.codec().empty_value()),
            (None, true) => BoneValue::Multiple(Vec::new()),
            (Some(languages), false) => BoneValue::Languages(
                languages.iter().map(|l| (l.clone(), None)).collect(),
            ),
            (Some(languages), true) => BoneValue::MultipleLanguages(
                languages.iter().map(|l| (l.clone(), Vec::new())).collect(),
            ),
        }
    }

    /// Read this bone's value from client data into `cache`
    ///
    /// On success `cache[name]` holds the parsed value. On failure it is
    /// reset to [`Bone::empty_value`] (the previous value is discarded) and
    /// every problem found is returned.
    ///
    /// # Errors
    ///
    /// Returns the per-field errors if any submitted value is invalid or a
    /// required value is missing.
    pub fn from_client(
        &self,
        cache: &mut ValueCache,
        name: &str,
        data: &RequestData,
        ctx: &RequestContext,
    ) -> ValidationResult<()> {
        multiplicity::from_client(self, cache, name, data, ctx)
    }

    /// Write this bone's value from `cache` into `entity`
    pub fn serialize(
        &self,
        cache: &ValueCache,
        name: &str,
        entity: &mut Entity,
        ctx: &RequestContext,
    ) {
        let value = multiplicity::serialize(self, cache.get(name), name, ctx);
        entity.set(name, value, self.indexed);
    }

    /// Rebuild this bone's value from `entity` into `cache`
    ///
    /// Unrecognized stored values become "no value"; this never fails.
    pub fn unserialize(
        &self,
        cache: &mut ValueCache,
        name: &str,
        entity: &Entity,
        ctx: &RequestContext,
    ) {
        let value = multiplicity::unserialize(self, entity.get(name), name, ctx);
        cache.set(name, value);
    }

    /// Append constraints for every filter key addressing this bone
    ///
    /// Keys are `name`, `name$op`, and for localized bones `name.lang` and
    /// `name.lang$op`. Values that don't parse are skipped; the query is
    /// never left half-modified by a bad value.
    pub fn build_filter(
        &self,
        name: &str,
        query: &mut Query,
        raw_filter: &RequestData,
        ctx: &RequestContext,
    ) {
        multiplicity::build_filter(self, name, query, raw_filter, ctx);
    }

    /// Apply creation/update magic before saving
    ///
    /// Returns `true` if the value was replaced.
    pub fn perform_magic(
        &self,
        cache: &mut ValueCache,
        name: &str,
        is_add: bool,
        ctx: &RequestContext,
    ) -> bool {
        match self.codec().magic_value(is_add, ctx) {
            Some(value) => {
                cache.set(name, BoneValue::Single(Some(value)));
                true
            }
            None => false,
        }
    }

    /// Set a value directly, bypassing client parsing
    ///
    /// `append` adds to a multiple bone instead of replacing it. `language`
    /// must name one of the configured languages on localized bones and must
    /// be `None` otherwise. Returns `false` (leaving `cache` untouched) on
    /// misuse.
    pub fn set_bone_value(
        &self,
        cache: &mut ValueCache,
        name: &str,
        value: Scalar,
        append: bool,
        language: Option<&str>,
    ) -> bool {
        if append && !self.multiple {
            return false;
        }
        match (&self.languages, language) {
            (None, Some(_)) | (Some(_), None) => return false,
            (Some(languages), Some(lang)) if !languages.iter().any(|l| l == lang) => {
                return false;
            }
            _ => {}
        }

        let mut current = cache
            .get(name)
            .filter(|v| self.has_layout(v))
            .cloned()
            .unwrap_or_else(|| self.empty_value());
        match (&mut current, language) {
            (BoneValue::Single(slot), None) => *slot = Some(value),
            (BoneValue::Multiple(values), None) => {
                if !append {
                    values.clear();
                }
                values.push(value);
            }
            (BoneValue::Languages(map), Some(lang)) => {
                map.insert(lang.to_string(), Some(value));
            }
            (BoneValue::MultipleLanguages(map), Some(lang)) => {
                let values = map.entry(lang.to_string()).or_default();
                if !append {
                    values.clear();
                }
                values.push(value);
            }
            _ => return false,
        }
        cache.set(name, current);
        true
    }

    /// Whether `value` is laid out the way this bone expects
    #[must_use]
    pub fn has_layout(&self, value: &BoneValue) -> bool {
        matches!(
            (value, self.multiple, self.languages.is_some()),
            (BoneValue::Single(_), false, false)
                | (BoneValue::Multiple(_), true, false)
                | (BoneValue::Languages(_), false, true)
                | (BoneValue::MultipleLanguages(_), true, true)
        )
    }

    fn validate_value(&self, value: &Scalar) -> Option<String> {
        self.validator.as_ref().and_then(|v| v.check(value))
    }
}

/// Builder for [`Bone`]; configuration is checked in [`BoneBuilder::build`]
#[derive(Debug, Clone)]
#[must_use]
pub struct BoneBuilder {
    bone: Bone,
}

impl BoneBuilder {
    /// Set the description
    pub fn descr(mut self, descr: impl Into<String>) -> Self {
        self.bone.descr = descr.into();
        self
    }

    /// Require a non-empty value
    pub const fn required(mut self) -> Self {
        self.bone.required = true;
        self
    }

    /// Ignore client input for this bone
    pub const fn readonly(mut self) -> Self {
        self.bone.readonly = true;
        self
    }

    /// Hide the bone from input forms
    pub const fn hidden(mut self) -> Self {
        self.bone.visible = false;
        self
    }

    /// Don't index the stored value
    pub const fn unindexed(mut self) -> Self {
        self.bone.indexed = false;
        self
    }

    /// Hold a sequence of values
    pub const fn multiple(mut self) -> Self {
        self.bone.multiple = true;
        self
    }

    /// Hold one value per language
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bone.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    /// Run an extra check on every parsed value
    pub fn validator<F>(mut self, check: F) -> Self
    where
        F: Fn(&Scalar) -> Option<String> + Send + Sync + 'static,
    {
        self.bone.validator = Some(Validator(Arc::new(check)));
        self
    }

    /// Check the configuration and produce the bone
    ///
    /// Magic bones are forced to read-only and hidden.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for invalid type options, an empty or
    /// duplicated language list, or magic on a multiple/localized bone.
    pub fn build(self) -> Result<Bone> {
        let mut bone = self.bone;
        bone.kind.validate()?;
        let type_name = bone.type_name();

        if let Some(languages) = &bone.languages {
            if languages.is_empty() {
                return Err(Error::configuration(type_name, "languages must not be empty"));
            }
            let mut seen = BTreeSet::new();
            for lang in languages {
                if !seen.insert(lang.as_str()) {
                    return Err(Error::configuration(
                        type_name,
                        format!("language {lang} is listed twice"),
                    ));
                }
            }
        }

        if bone.codec().has_magic() {
            if bone.multiple || bone.languages.is_some() {
                return Err(Error::configuration(
                    type_name,
                    "magic bones can't be multiple or localized",
                ));
            }
            bone.readonly = true;
            bone.visible = false;
        }
        Ok(bone)
    }
}
