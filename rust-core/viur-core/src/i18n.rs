//! # Internationalization
//!
//! Translation lookup and language resolution.
//!
//! [`Translations`] is the process-wide translation table. It is assembled
//! once at startup (built-in constants plus whatever the application loads)
//! and shared read-only through every request context.

use crate::context::RequestContext;
use crate::error::Result;
use crate::types::Scalar;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Pseudo-language holding the fallback text of a key
pub const DEFAULT_TEXT_KEY: &str = "_default_text_";

const DAYS_EN: [(&str, &str); 7] = [
    ("Sun", "Sunday"),
    ("Mon", "Monday"),
    ("Tue", "Tuesday"),
    ("Wed", "Wednesday"),
    ("Thu", "Thursday"),
    ("Fri", "Friday"),
    ("Sat", "Saturday"),
];

const DAYS_DE: [(&str, &str); 7] = [
    ("So", "Sonntag"),
    ("Mo", "Montag"),
    ("Di", "Dienstag"),
    ("Mi", "Mittwoch"),
    ("Do", "Donnerstag"),
    ("Fr", "Freitag"),
    ("Sa", "Samstag"),
];

const MONTHS_EN: [(&str, &str); 12] = [
    ("Jan", "January"),
    ("Feb", "February"),
    ("Mar", "March"),
    ("Apr", "April"),
    ("May", "May"),
    ("Jun", "June"),
    ("Jul", "July"),
    ("Aug", "August"),
    ("Sep", "September"),
    ("Oct", "October"),
    ("Nov", "November"),
    ("Dec", "December"),
];

const MONTHS_DE: [(&str, &str); 12] = [
    ("Jan", "Januar"),
    ("Feb", "Februar"),
    ("Mär", "März"),
    ("Apr", "April"),
    ("Mai", "Mai"),
    ("Jun", "Juni"),
    ("Jul", "Juli"),
    ("Aug", "August"),
    ("Sep", "September"),
    ("Okt", "Oktober"),
    ("Nov", "November"),
    ("Dez", "Dezember"),
];

/// Translation table: key -> language -> text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translations {
    entries: HashMap<String, HashMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawTranslations(HashMap<String, HashMap<String, String>>);

impl Translations {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table seeded with the built-in English and German constants
    ///
    /// Covers day and month names (`const_day_<0-6>_short|long` with 0 being
    /// Sunday, `const_month_<1-12>_short|long`) and the `%c`/`%x`/`%X`
    /// replacements (`const_datetimeformat`, `const_dateformat`,
    /// `const_timeformat`).
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut table = Self::new();
        for (lang, days, months) in [("en", DAYS_EN, MONTHS_EN), ("de", DAYS_DE, MONTHS_DE)] {
            for (i, (short, long)) in days.iter().enumerate() {
                table.insert(format!("const_day_{i}_short"), lang, *short);
                table.insert(format!("const_day_{i}_long"), lang, *long);
            }
            for (i, (short, long)) in months.iter().enumerate() {
                table.insert(format!("const_month_{}_short", i + 1), lang, *short);
                table.insert(format!("const_month_{}_long", i + 1), lang, *long);
            }
        }
        table.insert("const_datetimeformat", "en", "%a %b %d %H:%M:%S %Y");
        table.insert("const_dateformat", "en", "%m/%d/%Y");
        table.insert("const_timeformat", "en", "%H:%M:%S");
        table.insert("const_datetimeformat", "de", "%a, %d. %b %Y %H:%M:%S");
        table.insert("const_dateformat", "de", "%d.%m.%Y");
        table.insert("const_timeformat", "de", "%H:%M:%S");
        table
    }

    /// Built-in table extended by a JSON document `{"key": {"lang": "text"}}`
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let RawTranslations(raw) = serde_json::from_str(json)?;
        let mut table = Self::with_builtin();
        for (key, texts) in raw {
            for (lang, text) in texts {
                table.insert(key.as_str(), lang, text);
            }
        }
        Ok(table)
    }

    /// Add or replace one translation; keys are case-insensitive
    pub fn insert(
        &mut self,
        key: impl AsRef<str>,
        lang: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.entries
            .entry(key.as_ref().to_lowercase())
            .or_default()
            .insert(lang.into(), text.into());
    }

    /// Raw lookup of one key in exactly one language
    #[must_use]
    pub fn get(&self, key: &str, lang: &str) -> Option<&str> {
        self.entries
            .get(&key.to_lowercase())
            .and_then(|texts| texts.get(lang))
            .map(String::as_str)
    }

    /// Check if a key has any translation
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Translate `key` for the request's language
///
/// Tries the request language, then its alias target, then the stored
/// default text, then `default`, and finally the key itself.
pub fn translate(key: &str, default: Option<&str>, ctx: &RequestContext) -> String {
    let table = ctx.translations();
    let lang = ctx.language();
    let alias = ctx.conf().resolve_alias(lang);
    table
        .get(key, lang)
        .or_else(|| table.get(key, alias))
        .or_else(|| table.get(key, DEFAULT_TEXT_KEY))
        .or(default)
        .unwrap_or(key)
        .to_string()
}

/// Replace `{{name}}` placeholders with the given values
#[must_use]
pub fn substitute_vars(text: &str, vars: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

fn is_blank(value: &Scalar) -> bool {
    value.as_str().is_some_and(|s| s.trim().is_empty())
}

/// Pick the best value of a per-language mapping for this request
///
/// The request language (through the alias map) wins if it holds a
/// non-blank value; otherwise the first non-blank value in `languages`
/// order is used.
pub fn resolve_language_value<'a>(
    values: &'a BTreeMap<String, Option<Scalar>>,
    languages: &[String],
    ctx: &RequestContext,
) -> Option<&'a Scalar> {
    let lang = ctx.conf().resolve_alias(ctx.language());
    let usable = |l: &str| values.get(l).and_then(Option::as_ref).filter(|v| !is_blank(v));
    usable(lang).or_else(|| languages.iter().find_map(|l| usable(l.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Conf;
    use std::sync::Arc;

    fn ctx(lang: &str) -> RequestContext {
        let mut conf = Conf {
            available_languages: vec!["en".to_string(), "de".to_string()],
            ..Conf::default()
        };
        conf.language_alias_map
            .insert("at".to_string(), "de".to_string());
        RequestContext::detached(Arc::new(conf), Arc::new(Translations::with_builtin()))
            .with_language(lang)
    }

    #[test]
    fn test_builtin_constants() {
        let table = Translations::with_builtin();
        assert_eq!(table.get("const_day_0_short", "en"), Some("Sun"));
        assert_eq!(table.get("const_month_3_long", "de"), Some("März"));
        assert_eq!(table.get("CONST_DATEFORMAT", "de"), Some("%d.%m.%Y"));
    }

    #[test]
    fn test_translate_uses_alias() {
        let ctx = ctx("at");
        assert_eq!(translate("const_day_1_long", None, &ctx), "Montag");
    }

    #[test]
    fn test_translate_fallbacks() {
        let ctx = ctx("en");
        assert_eq!(translate("unknown.key", Some("Hello"), &ctx), "Hello");
        assert_eq!(translate("unknown.key", None, &ctx), "unknown.key");
    }

    #[test]
    fn test_from_json_merges_over_builtin() {
        let table =
            Translations::from_json_str(r#"{"Greeting": {"en": "Hi {{name}}", "_default_text_": "Hey"}}"#)
                .unwrap();
        assert_eq!(table.get("greeting", "en"), Some("Hi {{name}}"));
        assert!(table.contains_key("const_timeformat"));
    }

    #[test]
    fn test_substitute_vars() {
        assert_eq!(
            substitute_vars("Hello {{name}}!", &[("name", "ViUR")]),
            "Hello ViUR!"
        );
    }

    #[test]
    fn test_resolve_language_value() {
        let languages = vec!["en".to_string(), "de".to_string()];
        let mut values = BTreeMap::new();
        values.insert("en".to_string(), Some(Scalar::from("  ")));
        values.insert("de".to_string(), Some(Scalar::from("Hallo")));

        let resolved = resolve_language_value(&values, &languages, &ctx("en"));
        assert_eq!(resolved, Some(&Scalar::from("Hallo")));

        values.insert("en".to_string(), Some(Scalar::from("Hello")));
        let resolved = resolve_language_value(&values, &languages, &ctx("en"));
        assert_eq!(resolved, Some(&Scalar::from("Hello")));

        let empty: BTreeMap<String, Option<Scalar>> = BTreeMap::new();
        assert_eq!(resolve_language_value(&empty, &languages, &ctx("en")), None);
    }
}
