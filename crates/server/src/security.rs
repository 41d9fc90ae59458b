//! Limits applied to key documents before they enter a report.
//!
//! Key documents come from arbitrary servers and are embedded verbatim, so
//! they are bounded in size and shape before being accepted.

use crate::response::KeyDocument;
use serde_json::Value;
use serde_json::value::RawValue;

#[derive(Debug, Clone)]
pub struct KeyDocumentLimits {
    max_size: usize,
    max_depth: usize,
    max_string_length: usize,
    max_array_length: usize,
    max_object_keys: usize,
}

impl Default for KeyDocumentLimits {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024,
            max_depth: 32,
            max_string_length: 64 * 1024,
            max_array_length: 10_000,
            max_object_keys: 1_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JsonSecurityError {
    #[error("JSON too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
    #[error("JSON too deep: {depth} levels (max: {max})")]
    TooDeep { depth: usize, max: usize },
    #[error("String too long: {length} chars (max: {max})")]
    StringTooLong { length: usize, max: usize },
    #[error("Array too large: {length} elements (max: {max})")]
    ArrayTooLarge { length: usize, max: usize },
    #[error("Object has too many keys: {count} (max: {max})")]
    TooManyKeys { count: usize, max: usize },
    #[error("Key document is not a JSON object")]
    NotAnObject,
    #[error("JSON parsing error: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl KeyDocumentLimits {
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validate `data` and keep it as an untouched raw value plus typed keys.
    pub fn parse(&self, data: &[u8]) -> Result<KeyDocument, JsonSecurityError> {
        if data.len() > self.max_size {
            return Err(JsonSecurityError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let value: Value = serde_json::from_slice(data)?;
        if !value.is_object() {
            return Err(JsonSecurityError::NotAnObject);
        }
        self.validate_structure(&value, 0)?;

        let raw: Box<RawValue> = serde_json::from_slice(data)?;
        Ok(KeyDocument::from_raw(raw)?)
    }

    fn validate_structure(&self, value: &Value, depth: usize) -> Result<(), JsonSecurityError> {
        if depth > self.max_depth {
            return Err(JsonSecurityError::TooDeep {
                depth,
                max: self.max_depth,
            });
        }

        match value {
            Value::String(s) => self.check_string(s)?,
            Value::Array(arr) => {
                if arr.len() > self.max_array_length {
                    return Err(JsonSecurityError::ArrayTooLarge {
                        length: arr.len(),
                        max: self.max_array_length,
                    });
                }
                for item in arr {
                    self.validate_structure(item, depth + 1)?;
                }
            }
            Value::Object(obj) => {
                if obj.len() > self.max_object_keys {
                    return Err(JsonSecurityError::TooManyKeys {
                        count: obj.len(),
                        max: self.max_object_keys,
                    });
                }
                for (key, val) in obj {
                    self.check_string(key)?;
                    self.validate_structure(val, depth + 1)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn check_string(&self, s: &str) -> Result<(), JsonSecurityError> {
        if s.len() > self.max_string_length {
            return Err(JsonSecurityError::StringTooLong {
                length: s.len(),
                max: self.max_string_length,
            });
        }
        Ok(())
    }
}

pub fn parse_key_document(data: &[u8]) -> Result<KeyDocument, JsonSecurityError> {
    KeyDocumentLimits::default().parse(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit() {
        let large_json = "{\"a\":\"".to_string() + &"a".repeat(2 * 1024 * 1024) + "\"}";
        let result = parse_key_document(large_json.as_bytes());
        assert!(matches!(result, Err(JsonSecurityError::TooLarge { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let mut deep_json = String::new();
        for _ in 0..50 {
            deep_json.push_str("{\"a\":");
        }
        deep_json.push('1');
        for _ in 0..50 {
            deep_json.push('}');
        }

        let result = parse_key_document(deep_json.as_bytes());
        assert!(matches!(result, Err(JsonSecurityError::TooDeep { .. })));
    }

    #[test]
    fn test_rejects_non_object() {
        let result = parse_key_document(b"[1, 2, 3]");
        assert!(matches!(result, Err(JsonSecurityError::NotAnObject)));
    }

    #[test]
    fn test_raw_bytes_are_kept() {
        let body =
            r#"{ "server_name" : "example.org", "valid_until_ts": 1, "extra": {"b": [1, 2]} }"#;
        let doc = parse_key_document(body.as_bytes()).unwrap();
        assert_eq!(doc.raw.get(), body);
        assert_eq!(doc.keys.server_name, "example.org");
        assert_eq!(doc.keys.valid_until_ts, 1);
    }
}
