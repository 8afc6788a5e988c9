use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diff::UpdateSet;
use crate::error::CoreError;

/// A controller object as stored remotely: an open field mapping,
/// identified by a server-assigned `id` once it exists.
///
/// Observations are never edited in place; projections such as
/// [`merged`](Self::merged) return a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Map<String, Value>);

impl Resource {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a decoded response body, which must be a JSON object.
    pub fn from_value(value: Value, path: &str) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::UnexpectedResponse {
                path: path.to_owned(),
                message: format!("expected a JSON object, got {other}"),
            }),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Look up a dotted path such as `encryption.passphrase`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.0, path)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// A copy with every field of `update` replacing the observed value.
    pub fn merged(&self, update: &UpdateSet) -> Self {
        let mut out = self.0.clone();
        for (key, value) in update.iter() {
            out.insert(key.clone(), value.clone());
        }
        Self(out)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Resource {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Walk a dotted path through nested objects.
pub(crate) fn lookup_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Replace the value at a dotted path if it exists.
pub(crate) fn replace_path(map: &mut Map<String, Value>, path: &str, value: &Value) {
    match path.split_once('.') {
        None => {
            if let Some(slot) = map.get_mut(path) {
                *slot = value.clone();
            }
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = map.get_mut(head) {
                replace_path(inner, rest, value);
            }
        }
    }
}

/// Remove the value at a dotted path if it exists.
pub(crate) fn remove_path(map: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            map.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = map.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(value: Value) -> Resource {
        Resource::from_value(value, "test").expect("object")
    }

    #[test]
    fn get_path_walks_nested_objects() {
        let r = resource(json!({ "encryption": { "method": "WPA2", "passphrase": "x" } }));
        assert_eq!(r.get_path("encryption.method"), Some(&json!("WPA2")));
        assert_eq!(r.get_path("encryption.missing"), None);
        assert_eq!(r.get_path("nothing.here"), None);
    }

    #[test]
    fn merged_replaces_top_level_fields_only() {
        let r = resource(json!({ "id": "z1", "name": "A", "description": "old" }));
        let mut update = UpdateSet::default();
        update.insert("description", json!("new"));

        let merged = r.merged(&update);
        assert_eq!(merged.get("description"), Some(&json!("new")));
        assert_eq!(r.get("description"), Some(&json!("old")));
        assert_eq!(merged.id(), Some("z1"));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(Resource::from_value(json!([1]), "rkszones").is_err());
    }

    #[test]
    fn replace_and_remove_path() {
        let mut map = resource(json!({ "a": { "b": 1, "c": 2 } })).fields().clone();
        replace_path(&mut map, "a.b", &json!("masked"));
        remove_path(&mut map, "a.c");
        replace_path(&mut map, "a.zz", &json!("ignored"));
        assert_eq!(Value::Object(map), json!({ "a": { "b": "masked" } }));
    }
}
