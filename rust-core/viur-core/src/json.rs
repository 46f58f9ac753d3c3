//! # JSON Module
//!
//! JSON parsing with simd-json for request bodies, serde_json for output.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string into a typed value using simd-json
///
/// # Errors
///
/// Returns `Error::InvalidRequestBody` if parsing fails
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes into a typed value using simd-json
///
/// simd-json parses in place, hence the mutable slice.
///
/// # Errors
///
/// Returns `Error::InvalidRequestBody` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::InvalidRequestBody {
        reason: format!("JSON parse error: {e}"),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value can't be represented as JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_json_map() {
        let json = r#"{"name": "foo", "created": "now"}"#;
        let map: HashMap<String, String> = parse_json(json).unwrap();
        assert_eq!(map.get("created"), Some(&"now".to_string()));
    }

    #[test]
    fn test_parse_json_value() {
        let mut bytes = br#"{"tags": ["a", "b"], "age": 3}"#.to_vec();
        let value: serde_json::Value = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(value["tags"][1], "b");
        assert_eq!(value["age"], 3);
    }

    #[test]
    fn test_to_json() {
        let mut map = HashMap::new();
        map.insert("name", "Bob");
        let json = to_json(&map).unwrap();
        assert_eq!(json, r#"{"name":"Bob"}"#);
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<serde_json::Value> = parse_json("not valid json");
        assert!(matches!(result, Err(Error::InvalidRequestBody { .. })));
    }
}
