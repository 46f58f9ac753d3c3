//! # Configuration
//!
//! Explicit, load-once configuration for the bone layer.
//!
//! A [`Conf`] is built at startup (usually from a JSON document), validated,
//! and then shared read-only through every [`crate::context::RequestContext`]
//! as an `Arc<Conf>`. Nothing mutates it afterwards; a reload means building a
//! new `Conf` and handing it to new requests.

use crate::error::{Error, Result};
use crate::logging::LogFormat;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Header carrying the requester's ISO country code
pub const DEFAULT_COUNTRY_HEADER: &str = "X-Appengine-Country";

/// Zone used for US requests, where the country alone is ambiguous
pub const DEFAULT_US_ZONE: &str = "EST";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// Languages the application serves
    pub available_languages: Vec<String>,
    /// Language used when a request does not select one
    pub default_language: String,
    /// Languages that reuse another language's texts (e.g. `"at" -> "de"`)
    pub language_alias_map: HashMap<String, String>,
    /// Geolocation header used to guess the requester's timezone
    pub country_header: String,
    /// Zone used for requests from the US
    pub us_fallback_zone: String,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Output format of the tracing subscriber
    pub log_format: LogFormat,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            available_languages: vec!["en".to_string()],
            default_language: "en".to_string(),
            language_alias_map: HashMap::new(),
            country_header: DEFAULT_COUNTRY_HEADER.to_string(),
            us_fallback_zone: DEFAULT_US_ZONE.to_string(),
            max_body_size: 1024 * 1024,
            log_format: LogFormat::default(),
        }
    }
}

impl Conf {
    /// Parse and validate a configuration from JSON
    ///
    /// Missing keys take their default value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` for malformed documents and
    /// `Error::Configuration` / `Error::UnknownTimeZone` if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let conf: Self = serde_json::from_str(json)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Read, parse and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file can't be read, otherwise see
    /// [`Conf::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check the configuration for internal consistency
    ///
    /// # Errors
    ///
    /// Returns an error if no languages are configured, the default language
    /// isn't one of them, or the US fallback zone is unknown.
    pub fn validate(&self) -> Result<()> {
        if self.available_languages.is_empty() {
            return Err(Error::configuration(
                "conf",
                "available_languages must not be empty",
            ));
        }
        if !self.available_languages.contains(&self.default_language) {
            return Err(Error::configuration(
                "conf",
                format!(
                    "default_language {} is not an available language",
                    self.default_language
                ),
            ));
        }
        self.us_fallback_zone
            .parse::<Tz>()
            .map_err(|_| Error::UnknownTimeZone {
                zone: self.us_fallback_zone.clone(),
            })?;
        Ok(())
    }

    /// Map a language through the alias table
    #[must_use]
    pub fn resolve_alias<'a>(&'a self, lang: &'a str) -> &'a str {
        self.language_alias_map
            .get(lang)
            .map_or(lang, String::as_str)
    }

    /// Whether a language (or its alias target) is served
    #[must_use]
    pub fn is_available(&self, lang: &str) -> bool {
        let lang = self.resolve_alias(lang);
        self.available_languages.iter().any(|l| l == lang)
    }
}
