//! Validator contract.
//!
//! Each cache instance carries one pure predicate over its decoded payload,
//! run on the read path only. Validation is intentionally shallow: it is a
//! defense against gross structural drift from another writer running stale
//! code, not schema conformance. A validator must not panic on well-formed
//! but unexpected values, and must accept empty collections: absence of
//! data is a legitimate state, not corruption.

use std::sync::Arc;

use serde_json::Value;

/// Pure predicate over a decoded payload.
pub type Validator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Accept every decoded payload.
pub fn accept_all<T>() -> Validator<T> {
    Arc::new(|_| true)
}

/// Build a validator from a plain function or closure.
pub fn from_fn<T, F>(predicate: F) -> Validator<T>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

/// The typical shallow check for JSON list payloads: the value must be an
/// array, and when non-empty its first element must carry every field in
/// `required`. An empty array passes.
pub fn array_with_fields(required: &'static [&'static str]) -> Validator<Value> {
    Arc::new(move |value| match value.as_array() {
        None => false,
        Some(items) => match items.first() {
            None => true,
            Some(first) => required.iter().all(|field| first.get(field).is_some()),
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accept_all_passes_anything() {
        let validator = accept_all::<Value>();
        assert!(validator(&json!(null)));
        assert!(validator(&json!({"weird": true})));
    }

    #[test]
    fn array_with_fields_checks_first_element() {
        let validator = array_with_fields(&["id", "ts"]);

        assert!(validator(&json!([{"id": "a", "ts": 1, "extra": true}])));
        assert!(!validator(&json!([{"id": "a"}])));
        assert!(!validator(&json!({"id": "a"})));
        assert!(!validator(&json!("not-a-list")));
    }

    #[test]
    fn empty_collections_are_valid() {
        let validator = array_with_fields(&["id"]);
        assert!(validator(&json!([])));
    }

    #[test]
    fn typed_validator_over_structs() {
        #[derive(Debug)]
        struct Entry {
            id: String,
        }

        let validator = from_fn(|entries: &Vec<Entry>| {
            entries.first().is_none_or(|first| !first.id.is_empty())
        });

        assert!(validator(&Vec::new()));
        assert!(validator(&vec![Entry {
            id: "a".to_string()
        }]));
        assert!(!validator(&vec![Entry { id: String::new() }]));
    }
}
