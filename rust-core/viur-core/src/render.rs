//! # Rendering
//!
//! Structured descriptions of bones and display forms of their values.
//!
//! Each bone kind describes itself through [`BoneParams`], a tagged variant
//! renderers match on instead of inspecting concrete bone types. Values are
//! rendered to `serde_json::Value` following the bone's layout.

use crate::bones::Bone;
use crate::error::Result;
use crate::i18n::Translations;
use crate::types::{BoneValue, Scalar};
use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// Language used when a format constant is missing in the requested one
const FALLBACK_LANGUAGE: &str = "en";

/// Type-specific part of a bone description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BoneParams {
    /// Date bones
    Date {
        /// Holds a date part
        date: bool,
        /// Holds a time part
        time: bool,
        /// Converted to the requester's timezone
        localize: bool,
        /// Set on creation
        #[serde(rename = "creationMagic")]
        creation_magic: bool,
        /// Set on every save
        #[serde(rename = "updateMagic")]
        update_magic: bool,
    },
    /// String and e-mail bones
    Str {
        /// Maximum length in characters
        #[serde(rename = "maxLength")]
        max_length: usize,
        /// Whether comparisons respect case
        #[serde(rename = "caseSensitive")]
        case_sensitive: bool,
    },
    /// Boolean bones
    Bool {
        /// Value used when nothing was set
        #[serde(rename = "defaultValue")]
        default_value: bool,
    },
}

/// Full description of one bone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoneStructure {
    /// Human-readable description
    pub descr: String,
    /// Type tag
    #[serde(rename = "type")]
    pub type_name: &'static str,
    /// Whether an empty value is an error
    pub required: bool,
    /// Whether the bone is shown in input forms
    pub visible: bool,
    /// Whether client input is ignored
    pub readonly: bool,
    /// Whether the bone holds a sequence of values
    pub multiple: bool,
    /// Configured languages
    pub languages: Option<Vec<String>>,
    /// Whether the stored value is indexed
    pub indexed: bool,
    /// Type-specific attributes
    #[serde(flatten)]
    pub params: BoneParams,
}

impl Bone {
    /// Describe this bone for renderers
    #[must_use]
    pub fn describe(&self) -> BoneStructure {
        BoneStructure {
            descr: self.descr().to_string(),
            type_name: self.type_name(),
            required: self.is_required(),
            visible: self.is_visible(),
            readonly: self.is_readonly(),
            multiple: self.is_multiple(),
            languages: self.languages().map(<[String]>::to_vec),
            indexed: self.is_indexed(),
            params: self.codec().params(),
        }
    }
}

/// Display form of one value
#[must_use]
pub fn render_single_value(bone: &Bone, value: &Scalar) -> Value {
    bone.codec().render(value)
}

/// Display form of a bone's value following its layout
///
/// Localized values render every configured language; missing ones are
/// `null` (single) or `[]` (multiple).
#[must_use]
pub fn render_value(bone: &Bone, value: Option<&BoneValue>) -> Value {
    let empty;
    let value = match value {
        Some(value) if bone.has_layout(value) => value,
        _ => {
            empty = bone.empty_value();
            &empty
        }
    };
    let render_all = |values: &[Scalar]| {
        Value::Array(values.iter().map(|v| render_single_value(bone, v)).collect())
    };
    let languages = bone.languages().unwrap_or_default();

    match value {
        BoneValue::Single(value) => value
            .as_ref()
            .map_or(Value::Null, |v| render_single_value(bone, v)),
        BoneValue::Multiple(values) => render_all(values),
        BoneValue::Languages(map) => Value::Object(
            languages
                .iter()
                .map(|lang| {
                    let rendered = map
                        .get(lang)
                        .and_then(Option::as_ref)
                        .map_or(Value::Null, |v| render_single_value(bone, v));
                    (lang.clone(), rendered)
                })
                .collect(),
        ),
        BoneValue::MultipleLanguages(map) => Value::Object(
            languages
                .iter()
                .map(|lang| {
                    let values = map.get(lang).map_or(&[][..], Vec::as_slice);
                    (lang.clone(), render_all(values))
                })
                .collect(),
        ),
    }
}

fn constant<'a>(translations: &'a Translations, key: &str, lang: &str) -> Option<&'a str> {
    translations
        .get(key, lang)
        .or_else(|| translations.get(key, FALLBACK_LANGUAGE))
}

/// Format `value` like strftime with translated names
///
/// `%c`, `%x` and `%X` are first replaced with the language's date/time
/// patterns, then `%a`, `%A`, `%b` and `%B` with translated day and month
/// names. Missing translations fall back to English, then to chrono's own
/// output. An invalid pattern is returned unchanged.
#[must_use]
pub fn localized_format(
    value: &NaiveDateTime,
    pattern: &str,
    translations: &Translations,
    lang: &str,
) -> String {
    let mut pattern = pattern.to_string();
    for (directive, key) in [
        ("%c", "const_datetimeformat"),
        ("%x", "const_dateformat"),
        ("%X", "const_timeformat"),
    ] {
        if pattern.contains(directive) {
            if let Some(replacement) = constant(translations, key, lang) {
                pattern = pattern.replace(directive, replacement);
            }
        }
    }

    let weekday = value.weekday().num_days_from_sunday();
    let month = value.month();
    for (directive, key) in [
        ("%a", format!("const_day_{weekday}_short")),
        ("%A", format!("const_day_{weekday}_long")),
        ("%b", format!("const_month_{month}_short")),
        ("%B", format!("const_month_{month}_long")),
    ] {
        if pattern.contains(directive) {
            if let Some(name) = constant(translations, &key, lang) {
                pattern = pattern.replace(directive, &name.replace('%', "%%"));
            }
        }
    }

    let mut out = String::new();
    if write!(out, "{}", value.format(&pattern)).is_err() {
        return pattern;
    }
    out
}

/// Serialize a rendered document
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    crate::json::to_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bones::{BooleanBone, DateBone, EmailBone, StringBone};
    use chrono::NaiveDate;

    fn value() -> NaiveDateTime {
        // A Tuesday
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 15)
            .unwrap()
    }

    #[test]
    fn test_describe_date_bone() {
        let bone = Bone::builder(DateBone::new().localized())
            .descr("Start")
            .required()
            .build()
            .unwrap();
        let json = serde_json::to_value(bone.describe()).unwrap();
        assert_eq!(json["type"], "date");
        assert_eq!(json["descr"], "Start");
        assert_eq!(json["required"], true);
        assert_eq!(json["localize"], true);
        assert_eq!(json["date"], true);
        assert_eq!(json["languages"], Value::Null);
    }

    #[test]
    fn test_describe_matches_on_kind() {
        let bone = Bone::builder(EmailBone::new()).build().unwrap();
        let described = bone.describe();
        assert_eq!(described.type_name, "str.email");
        assert!(matches!(
            described.params,
            BoneParams::Str { max_length: 254, .. }
        ));

        let bone = Bone::builder(BooleanBone::new().default_value(true)).build().unwrap();
        assert_eq!(
            bone.describe().params,
            BoneParams::Bool { default_value: true }
        );
    }

    #[test]
    fn test_render_localized_values() {
        let bone = Bone::builder(StringBone::new())
            .languages(["en", "de"])
            .multiple()
            .build()
            .unwrap();
        let mut cache = crate::types::ValueCache::new();
        bone.set_bone_value(&mut cache, "tags", Scalar::from("a"), true, Some("de"));

        let rendered = render_value(&bone, cache.get("tags"));
        assert_eq!(rendered, serde_json::json!({"en": [], "de": ["a"]}));
    }

    #[test]
    fn test_render_missing_value() {
        let bone = Bone::builder(DateBone::new()).build().unwrap();
        assert_eq!(render_value(&bone, None), Value::Null);

        let bone = Bone::builder(StringBone::new()).languages(["en"]).build().unwrap();
        assert_eq!(render_value(&bone, None), serde_json::json!({"en": null}));
    }

    #[test]
    fn test_localized_format_names() {
        let translations = Translations::with_builtin();
        assert_eq!(
            localized_format(&value(), "%A, %d. %B %Y", &translations, "de"),
            "Dienstag, 05. März 2024"
        );
        assert_eq!(
            localized_format(&value(), "%a %b", &translations, "en"),
            "Tue Mar"
        );
    }

    #[test]
    fn test_localized_format_patterns() {
        let translations = Translations::with_builtin();
        assert_eq!(localized_format(&value(), "%x", &translations, "de"), "05.03.2024");
        assert_eq!(localized_format(&value(), "%x", &translations, "en"), "03/05/2024");
        assert_eq!(
            localized_format(&value(), "%c", &translations, "de"),
            "Di, 05. Mär 2024 14:30:15"
        );
        // Unknown languages use English
        assert_eq!(localized_format(&value(), "%X", &translations, "fr"), "14:30:15");
    }

    #[test]
    fn test_localized_format_without_translations() {
        let translations = Translations::new();
        assert_eq!(localized_format(&value(), "%a", &translations, "de"), "Tue");
    }
}
