//! # Client Request
//!
//! Turns an incoming HTTP request into the flat field map the bones read
//! from, and into the [`RequestContext`] they run in.
//!
//! Query string, urlencoded form bodies and JSON bodies are all folded into
//! one [`RequestData`]. Repeated keys become lists. Nested JSON objects are
//! flattened with dots, so `{"name": {"de": "x"}}` arrives as `name.de`.

use crate::config::Conf;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::i18n::Translations;
use crate::json::parse_json_bytes;
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use url::form_urlencoded;

/// One submitted value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientValue {
    /// A single value
    Text(String),
    /// A key submitted more than once
    List(Vec<String>),
}

impl ClientValue {
    /// All submitted strings, in order
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Text(value) => vec![value.as_str()],
            Self::List(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ClientValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ClientValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ClientValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// Field name (possibly `name.lang`) to submitted value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestData {
    values: BTreeMap<String, ClientValue>,
}

impl RequestData {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an urlencoded string (`a=1&b=2&a=3`)
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut data = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            data.push(key.into_owned(), value.into_owned());
        }
        data
    }

    /// Flatten a JSON object into field values
    ///
    /// Numbers and booleans are submitted as their text, `null` is skipped,
    /// arrays of scalars become lists and nested objects are joined with
    /// dots.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequestBody` if `value` isn't an object or an
    /// array holds objects or arrays.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(Error::InvalidRequestBody {
                reason: "JSON body must be an object".to_string(),
            });
        };
        let mut data = Self::new();
        data.flatten_object("", object)?;
        Ok(data)
    }

    fn flatten_object(&mut self, prefix: &str, object: &serde_json::Map<String, Value>) -> Result<()> {
        for (key, value) in object {
            let key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Null => {}
                Value::Object(nested) => self.flatten_object(&key, nested)?,
                Value::Array(items) => {
                    let values = items
                        .iter()
                        .filter(|item| !item.is_null())
                        .map(|item| {
                            json_scalar(item).ok_or_else(|| Error::InvalidRequestBody {
                                reason: format!("unsupported nested value in {key}"),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    self.values.insert(key, ClientValue::List(values));
                }
                scalar => {
                    if let Some(text) = json_scalar(scalar) {
                        self.values.insert(key, ClientValue::Text(text));
                    }
                }
            }
        }
        Ok(())
    }

    /// Set a value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ClientValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Add a value; a key seen before turns into a list
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.values.entry(name.into()) {
            Entry::Vacant(entry) => {
                entry.insert(ClientValue::Text(value));
            }
            Entry::Occupied(mut entry) => {
                let current = entry.get_mut();
                match current {
                    ClientValue::List(values) => values.push(value),
                    ClientValue::Text(first) => {
                        let first = std::mem::take(first);
                        *current = ClientValue::List(vec![first, value]);
                    }
                }
            }
        }
    }

    /// Add every value of `other`
    pub fn merge(&mut self, other: Self) {
        for (key, value) in other.values {
            match value {
                ClientValue::Text(text) => self.push(key, text),
                ClientValue::List(values) => {
                    for text in values {
                        self.push(key.clone(), text);
                    }
                }
            }
        }
    }

    /// Get the value submitted for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClientValue> {
        self.values.get(name)
    }

    /// Get a single text value
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            ClientValue::Text(value) => Some(value),
            ClientValue::List(_) => None,
        }
    }

    /// Check if `name` was submitted
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over all values, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClientValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of submitted keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing was submitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// An incoming request with its body collected
#[derive(Clone)]
pub struct ClientRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    query_string: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query_string", &self.query_string)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .finish_non_exhaustive()
    }
}

impl ClientRequest {
    /// Create a request manually (for testing/internal use)
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            query_string,
            headers,
            body,
        }
    }

    /// Create from a hyper request, collecting at most `max_body_size` bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` if the declared or actual body size
    /// exceeds the limit, and `Error::InvalidRequestBody` if the body can't
    /// be read.
    pub async fn from_hyper_with_limit<B>(req: Request<B>, max_body_size: usize) -> Result<Self>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query_string = req.uri().query().map(String::from);
        let headers = req.headers().clone();

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(actual) = declared.filter(|len| *len > max_body_size) {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual,
            });
        }

        let bytes = req
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::InvalidRequestBody {
                reason: format!("failed to read body: {e}"),
            })?
            .to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            method,
            path,
            query_string,
            headers,
            body: (!bytes.is_empty()).then_some(bytes),
        })
    }

    /// Create from a hyper request using the configured body limit
    ///
    /// # Errors
    ///
    /// See [`ClientRequest::from_hyper_with_limit`].
    pub async fn from_hyper<B>(req: Request<B>, conf: &Conf) -> Result<Self>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        Self::from_hyper_with_limit(req, conf.max_body_size).await
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get all readable headers as a map
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect()
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Query parameters only
    #[must_use]
    pub fn query(&self) -> RequestData {
        self.query_string
            .as_deref()
            .map(RequestData::from_query)
            .unwrap_or_default()
    }

    /// Query parameters and body fields combined
    ///
    /// The body is read according to its content type: JSON or urlencoded
    /// form data. Other content types contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequestBody` for malformed JSON bodies.
    pub fn data(&self) -> Result<RequestData> {
        let mut data = self.query();
        let Some(body) = self.body.as_ref() else {
            return Ok(data);
        };
        let content_type = self
            .header(CONTENT_TYPE.as_str())
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_default();

        match content_type.as_str() {
            "application/json" => {
                let mut bytes = body.to_vec();
                let value: Value = parse_json_bytes(&mut bytes)?;
                data.merge(RequestData::from_json(&value)?);
            }
            "application/x-www-form-urlencoded" => {
                let text = std::str::from_utf8(body).map_err(|e| Error::InvalidRequestBody {
                    reason: format!("form body is not UTF-8: {e}"),
                })?;
                data.merge(RequestData::from_query(text));
            }
            _ => {}
        }
        Ok(data)
    }

    /// Pick the request language
    ///
    /// An explicit `language` query parameter wins, then the first
    /// `Accept-Language` entry; both must be available (directly or through
    /// an alias). Otherwise the default language is used.
    #[must_use]
    pub fn language(&self, conf: &Conf) -> String {
        let usable = |lang: &str| conf.is_available(conf.resolve_alias(lang));
        let from_query = self
            .query()
            .text("language")
            .map(str::to_ascii_lowercase)
            .filter(|lang| usable(lang.as_str()));
        let from_header = || {
            self.header(ACCEPT_LANGUAGE.as_str())
                .and_then(|header| header.split(',').next())
                .and_then(|tag| tag.split(';').next())
                .and_then(|tag| tag.trim().split('-').next())
                .map(str::to_ascii_lowercase)
                .filter(|lang| usable(lang.as_str()))
        };
        from_query
            .or_else(from_header)
            .unwrap_or_else(|| conf.default_language.clone())
    }

    /// Build the context bones run in for this request
    #[must_use]
    pub fn context(&self, conf: Arc<Conf>, translations: Arc<Translations>) -> RequestContext {
        let language = self.language(&conf);
        RequestContext::new(conf, translations, self.headers_map()).with_language(language)
    }
}
