//! Edits on a JSON document tree with realtime-database semantics: writing
//! `null` deletes, and objects left empty disappear.

use serde_json::{Map, Value};

use super::StorePath;

/// Drop `null` members and empty objects, recursively. Returns `Null` if
/// nothing is left.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.into_iter().map(normalize).collect();
            if cleaned.iter().all(Value::is_null) {
                Value::Null
            } else {
                Value::Array(cleaned)
            }
        }
        other => other,
    }
}

/// Value at `path`, or `Null`.
pub fn get_at(root: &Value, path: &StorePath) -> Value {
    let mut node = root;
    for segment in path.segments() {
        node = match child(node, segment) {
            Some(next) => next,
            None => return Value::Null,
        };
    }
    node.clone()
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Write `value` at `path`, creating parents as needed. `Null` deletes and
/// prunes parents that become empty.
pub fn set_at(root: &mut Value, path: &StorePath, value: Value) {
    let value = normalize(value);
    set_segments(root, path.segments(), value);
    if is_empty_container(root) {
        *root = Value::Null;
    }
}

fn set_segments(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if value.is_null() && !node.is_object() && !node.is_array() {
        return;
    }

    // Arrays are addressed by index keys; the database itself stores them as
    // objects, so convert on write.
    if let Value::Array(items) = node {
        let map: Map<String, Value> = std::mem::take(items)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(map);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }

    let Value::Object(map) = node else {
        return;
    };

    if value.is_null() && rest.is_empty() {
        map.shift_remove(head);
        return;
    }

    let entry = map.entry(head.clone()).or_insert(Value::Null);
    set_segments(entry, rest, value);
    if entry.is_null() || is_empty_container(entry) {
        map.shift_remove(head);
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Apply each `key: value` of `partial` below `path`. Keys may themselves be
/// slash-separated relative paths.
pub fn merge_at(root: &mut Value, path: &StorePath, partial: &Map<String, Value>) {
    for (key, value) in partial {
        let target = key
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(path.segments().to_vec(), |mut acc, seg| {
                acc.push(seg.to_string());
                acc
            });
        let target = StorePath::from_segments(target);
        set_at(root, &target, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    #[test]
    fn set_creates_parents() {
        let mut root = Value::Null;
        set_at(&mut root, &p("todos/u/t1"), json!({ "text": "a" }));
        assert_eq!(get_at(&root, &p("todos/u/t1/text")), json!("a"));
    }

    #[test]
    fn null_deletes_and_prunes() {
        let mut root = json!({ "todos": { "u": { "t1": { "text": "a" } } }, "users": { "u": 1 } });
        set_at(&mut root, &p("todos/u/t1"), Value::Null);
        assert_eq!(root, json!({ "users": { "u": 1 } }));
        set_at(&mut root, &p("users/u"), Value::Null);
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn empty_objects_vanish_on_write() {
        let mut root = Value::Null;
        set_at(&mut root, &p("hobbies/u/h"), json!({ "name": "Run", "days": {} }));
        assert_eq!(get_at(&root, &p("hobbies/u/h")), json!({ "name": "Run" }));
    }

    #[test]
    fn merge_touches_only_given_keys() {
        let mut root = json!({ "t": { "text": "a", "completed": false } });
        let partial = json!({ "completed": true, "lastCompletedDate": "x" });
        merge_at(&mut root, &p("t"), partial.as_object().unwrap());
        assert_eq!(
            root,
            json!({ "t": { "text": "a", "completed": true, "lastCompletedDate": "x" } })
        );
    }

    #[test]
    fn merge_accepts_nested_keys() {
        let mut root = json!({ "h": { "name": "Run" } });
        let partial = json!({ "days/Wed": true });
        merge_at(&mut root, &p("h"), partial.as_object().unwrap());
        assert_eq!(get_at(&root, &p("h/days/Wed")), json!(true));
    }

    #[test]
    fn arrays_are_indexable() {
        let mut root = json!({ "todos": [{ "id": 1 }, { "id": 2 }] });
        assert_eq!(get_at(&root, &p("todos/1/id")), json!(2));
        set_at(&mut root, &p("todos/0/completed"), json!(true));
        assert_eq!(get_at(&root, &p("todos/0/completed")), json!(true));
        assert_eq!(get_at(&root, &p("todos/1/id")), json!(2));
    }
}
