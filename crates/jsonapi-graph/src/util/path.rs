//! Dot-path access into JSON objects.
//!
//! Paths are `.`-separated object keys (`address.city`). Array indices are
//! not addressed; a path stops at the first non-object value.

use serde_json::{Map, Value};

/// Returns the value at `path`, or `None` if any segment is missing.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Sets `value` at `path`, creating intermediate objects as needed.
///
/// A non-object value sitting on an intermediate segment is replaced.
pub fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Recursively merges `overlay` into `base`.
///
/// Objects merge key by key; any other value in `overlay` replaces the one
/// in `base`.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path() {
        let value = json!({"address": {"city": {"id": 10}}, "name": "x"});
        assert_eq!(get_path(&value, "name"), Some(&json!("x")));
        assert_eq!(get_path(&value, "address.city.id"), Some(&json!(10)));
        assert_eq!(get_path(&value, "address.state"), None);
        assert_eq!(get_path(&value, "name.first"), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut map = Map::new();
        set_path(&mut map, "phone.cell", json!("555"));
        set_path(&mut map, "phone.work", json!("556"));
        set_path(&mut map, "first", json!("tim"));
        assert_eq!(
            Value::Object(map),
            json!({"phone": {"cell": "555", "work": "556"}, "first": "tim"})
        );
    }

    #[test]
    fn test_deep_merge() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "list": [1, 2]})
            .as_object()
            .cloned()
            .unwrap_or_default();
        let overlay = json!({"a": {"c": 3}, "list": [9]});
        deep_merge(&mut base, overlay.as_object().unwrap());
        assert_eq!(
            Value::Object(base),
            json!({"a": {"b": 1, "c": 3}, "list": [9]})
        );
    }
}
