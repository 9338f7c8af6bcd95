//! Section content helpers.
//!
//! Section content is an arbitrary JSON object whose shape is owned by the
//! component type. Resolution only ever works on the top level: merges are
//! shallow and the schema fence compares top-level keys against the default
//! content of the component type.

use crate::error::{Result, SiteError};
use serde_json::{Map, Value};

/// A section content object.
pub type Content = Map<String, Value>;

/// Interpret a JSON value as a content object.
///
/// # Errors
/// Returns [`SiteError::InvalidContent`] for anything other than a JSON object.
pub fn as_object(value: Value) -> Result<Content> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SiteError::InvalidContent(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

/// Shallow merge: keys of `over` replace keys of `base`.
#[must_use]
pub fn merge(base: &Content, over: &Content) -> Content {
    let mut merged = base.clone();
    merge_into(&mut merged, over);
    merged
}

/// In-place shallow merge of `over` into `target`.
pub fn merge_into(target: &mut Content, over: &Content) {
    for (key, value) in over {
        target.insert(key.clone(), value.clone());
    }
}

/// Drop every top-level key of `candidate` that `schema` does not define.
#[must_use]
pub fn fence(candidate: &Content, schema: &Content) -> Content {
    candidate
        .iter()
        .filter(|(key, _)| schema.contains_key(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Keys defined by `schema` that `content` lacks.
#[must_use]
pub fn missing_keys<'a>(content: &Content, schema: &'a Content) -> Vec<&'a str> {
    schema
        .keys()
        .filter(|key| !content.contains_key(key.as_str()))
        .map(String::as_str)
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Content {
        as_object(value).expect("object")
    }

    #[test]
    fn test_as_object_rejects_non_objects() {
        assert!(as_object(json!({"a": 1})).is_ok());
        let err = as_object(json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "invalid content: expected a JSON object, got an array");
        assert!(as_object(Value::Null).is_err());
    }

    #[test]
    fn test_merge_later_wins() {
        let defaults = obj(json!({"title": "A", "color": "x"}));
        let fetched = obj(json!({"title": "B"}));
        assert_eq!(merge(&defaults, &fetched), obj(json!({"title": "B", "color": "x"})));
    }

    #[test]
    fn test_merge_is_shallow() {
        let base = obj(json!({"cta": {"text": "Go", "url": "/go"}}));
        let over = obj(json!({"cta": {"text": "Stop"}}));
        assert_eq!(merge(&base, &over)["cta"], json!({"text": "Stop"}));
    }

    #[test]
    fn test_fence_drops_unknown_keys() {
        let schema = obj(json!({"title": "", "items": []}));
        let stale = obj(json!({"title": "New", "legacyField": true}));
        assert_eq!(fence(&stale, &schema), obj(json!({"title": "New"})));
    }

    #[test]
    fn test_missing_keys() {
        let schema = obj(json!({"title": "", "subtitle": "", "items": []}));
        let old_record = obj(json!({"title": "Old"}));
        let mut missing = missing_keys(&old_record, &schema);
        missing.sort_unstable();
        assert_eq!(missing, vec!["items", "subtitle"]);
        assert!(missing_keys(&merge(&schema, &old_record), &schema).is_empty());
    }
}
