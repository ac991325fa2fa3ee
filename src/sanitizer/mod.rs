//! Payload sanitization.
//!
//! [`Sanitizer::sanitize`] first breaks reference cycles (see [`decycle`]) and
//! then redacts every mapping key whose alphabetic-only, lowercased form is in
//! the sensitive-key set. [`Sanitizer::sanitize_value`] is the second half on
//! its own, for input that is already a finite tree.

mod decycle;

pub use decycle::{REF_KEY, decycle};

use crate::domain::Payload;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Replacement written in place of a sensitive value.
pub const REDACTED_MARKER: &str = "[filtered]";

/// Lowercases `key` and strips every non-alphabetic character,
/// so `Auth-Token`, `auth_token` and `AUTHTOKEN` all become `authtoken`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    sensitive_keys: HashSet<String>,
}

impl Sanitizer {
    pub fn new<I, S>(sensitive_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sensitive_keys: sensitive_keys
                .into_iter()
                .map(|key| normalize_key(key.as_ref()))
                .filter(|key| !key.is_empty())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive_keys.contains(&normalize_key(key))
    }

    pub fn sensitive_keys(&self) -> impl Iterator<Item = &str> {
        self.sensitive_keys.iter().map(String::as_str)
    }

    /// Decycles then redacts. Total over any payload graph.
    pub fn sanitize(&self, payload: &Payload) -> Value {
        self.sanitize_value(&decycle(payload))
    }

    /// Redacts a tree that is already known to be finite.
    pub fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize_map(map)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.sanitize_value(item)).collect())
            }
            other => other.clone(),
        }
    }

    pub fn sanitize_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| {
                let clean = if self.is_sensitive(key) {
                    Value::String(REDACTED_MARKER.to_string())
                } else {
                    self.sanitize_value(value)
                };
                (key.clone(), clean)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(["authorization", "authtoken", "password"])
    }

    #[test]
    fn test_normalize_key_strips_punctuation_and_case() {
        assert_eq!(normalize_key("Auth-Token"), "authtoken");
        assert_eq!(normalize_key("auth_token"), "authtoken");
        assert_eq!(normalize_key("AUTHTOKEN"), "authtoken");
        assert_eq!(normalize_key("x-api-key-2"), "xapikey");
    }

    #[test]
    fn test_redacts_equivalent_key_spellings() {
        let payload = Payload::from(json!({
            "Authorization": "Bearer abc",
            "auth_token": "t1",
            "AUTHTOKEN": "t2",
            "user": "alice"
        }));

        let out = sanitizer().sanitize(&payload);
        assert_eq!(
            out,
            json!({
                "Authorization": REDACTED_MARKER,
                "auth_token": REDACTED_MARKER,
                "AUTHTOKEN": REDACTED_MARKER,
                "user": "alice"
            })
        );
    }

    #[test]
    fn test_redacts_whole_subtree_under_sensitive_key() {
        let payload = Payload::from(json!({"password": {"old": "a", "new": "b"}}));
        assert_eq!(
            sanitizer().sanitize(&payload),
            json!({"password": REDACTED_MARKER})
        );
    }

    #[test]
    fn test_recurses_into_arrays_of_objects() {
        let payload = Payload::from(json!({"users": [{"name": "a", "password": "x"}, 3]}));
        assert_eq!(
            sanitizer().sanitize(&payload),
            json!({"users": [{"name": "a", "password": REDACTED_MARKER}, 3]})
        );
    }

    #[test]
    fn test_drops_undefined_keys() {
        let payload = Payload::object()
            .with("present", 1)
            .with("missing", Payload::Undefined);
        let out = sanitizer().sanitize(&payload);
        assert_eq!(out, json!({"present": 1}));
        assert!(out.get("missing").is_none());
    }

    #[test]
    fn test_non_object_passes_through() {
        assert_eq!(sanitizer().sanitize(&Payload::from(42)), json!(42));
        assert_eq!(sanitizer().sanitize_value(&json!("text")), json!("text"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let payload = Payload::from(json!({"a": {"Password": "p", "b": [1, {"auth-token": 2}]}}));
        let once = sanitizer().sanitize(&payload);
        let twice = sanitizer().sanitize_value(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_self_referencing_payload_terminates() {
        let root = Payload::object().with("password", "p");
        let child = Payload::object().with("up", root.clone());
        root.insert("child", child);

        let out = sanitizer().sanitize(&root);
        assert_eq!(
            out,
            json!({"password": REDACTED_MARKER, "child": {"up": {"$ref": "$"}}})
        );
    }

    #[test]
    fn test_empty_keys_are_not_sensitive() {
        let sanitizer = Sanitizer::new(["--", "token"]);
        assert_eq!(sanitizer.sensitive_keys().count(), 1);
        assert!(!sanitizer.is_sensitive("123"));
    }
}
