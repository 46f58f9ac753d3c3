//! # Request Context
//!
//! Everything a bone may consult while handling one request: the shared
//! configuration and translation table, the request headers, the selected
//! language and the request-local [`RequestScope`].
//!
//! A context is created per request and dropped with it. Deferred work
//! (task queues, cron jobs) uses [`RequestContext::detached`], which has no
//! headers and is marked non-interactive.

use crate::config::Conf;
use crate::i18n::Translations;
use crate::state::RequestScope;
use chrono::{NaiveDateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-request view of the application
#[derive(Debug)]
pub struct RequestContext {
    conf: Arc<Conf>,
    translations: Arc<Translations>,
    /// Header names are stored lower-cased
    headers: HashMap<String, String>,
    language: String,
    interactive: bool,
    scope: RequestScope,
}

impl RequestContext {
    /// Create the context of an interactive (client) request
    pub fn new(
        conf: Arc<Conf>,
        translations: Arc<Translations>,
        headers: HashMap<String, String>,
    ) -> Self {
        let language = conf.default_language.clone();
        Self {
            conf,
            translations,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            language,
            interactive: true,
            scope: RequestScope::new(),
        }
    }

    /// Create a context for work that isn't driven by a client request
    pub fn detached(conf: Arc<Conf>, translations: Arc<Translations>) -> Self {
        let mut ctx = Self::new(conf, translations, HashMap::new());
        ctx.interactive = false;
        ctx
    }

    /// Select the request language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Shared configuration
    #[must_use]
    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    /// Shared translation table
    #[must_use]
    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Selected language (may be an alias)
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Look up a header case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether this context belongs to a client request
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Request-local storage
    #[must_use]
    pub const fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Current instant as naive UTC
    #[must_use]
    pub fn now_utc(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> (Arc<Conf>, Arc<Translations>) {
        (Arc::new(Conf::default()), Arc::new(Translations::with_builtin()))
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let (conf, translations) = shared();
        let mut headers = HashMap::new();
        headers.insert("X-Appengine-Country".to_string(), "DE".to_string());
        let ctx = RequestContext::new(conf, translations, headers);

        assert_eq!(ctx.header("x-appengine-country"), Some("DE"));
        assert_eq!(ctx.header("X-APPENGINE-COUNTRY"), Some("DE"));
        assert!(ctx.is_interactive());
    }

    #[test]
    fn test_detached_context() {
        let (conf, translations) = shared();
        let ctx = RequestContext::detached(conf, translations).with_language("de");
        assert!(!ctx.is_interactive());
        assert_eq!(ctx.language(), "de");
        assert_eq!(ctx.header("anything"), None);
    }

    #[test]
    fn test_scopes_are_not_shared() {
        let (conf, translations) = shared();
        let first = RequestContext::detached(conf.clone(), translations.clone());
        let second = RequestContext::detached(conf, translations);
        first.scope().set("timeZone", "Europe/Berlin".to_string());
        assert!(!second.scope().contains("timeZone"));
    }
}
