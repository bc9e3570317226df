//! Helpers for walking and merging settings trees.
//!
//! A settings tree is a `serde_json::Value::Object` whose leaves are
//! booleans, numbers, strings or lists of strings. Paths are dotted key
//! sequences such as `kubernetes.version`.

use serde_json::{Map, Value};

/// Split a dotted path into its segments. An empty path has no segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Join a prefix and a key into a dotted path.
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Look up the value at `path`. The empty path returns the tree itself.
pub fn get_path<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(tree, |node, seg| node.as_object()?.get(seg))
}

/// Look up `path` inside a map. The empty path yields `None`.
pub fn get_in<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = segments(path);
    let first = map.get(parts.next()?)?;
    parts.try_fold(first, |node, seg| node.as_object()?.get(seg))
}

pub fn has_path(tree: &Value, path: &str) -> bool {
    get_path(tree, path).is_some()
}

/// Assign `value` at `path`, creating (or replacing non-object) intermediate
/// nodes as needed.
pub fn set_path(tree: &mut Map<String, Value>, path: &str, value: Value) {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut node = tree;
    for seg in parents {
        let entry = node
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(m) => m,
            _ => unreachable!("entry was just made an object"),
        };
    }
    node.insert(last.to_string(), value);
}

/// Remove and return the value at `path`, if present.
pub fn remove_path(tree: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(path).collect();
    let (last, parents) = parts.split_last()?;
    let mut node = tree;
    for seg in parents {
        node = node.get_mut(*seg)?.as_object_mut()?;
    }
    node.remove(*last)
}

/// Move the value at `from` to `to` if `from` exists. Returns whether a value moved.
pub fn move_path(tree: &mut Map<String, Value>, from: &str, to: &str) -> bool {
    match remove_path(tree, from) {
        Some(value) => {
            set_path(tree, to, value);
            true
        }
        None => false,
    }
}

/// Recursively merge `source` into `target`.
///
/// Objects merge key by key; every other value (lists included) replaces
/// the target wholesale.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(this), Value::Object(other)) => {
            for (k, v) in other {
                match this.get_mut(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        this.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (this, other) => *this = other.clone(),
    }
}

/// Merge `changes` into `target`, treating `null` as "remove this key".
///
/// At every level where both sides are objects, keys whose proposed value
/// is `null` are dropped from `changes` and from `target`. Lists are
/// replaced wholesale, never merged element-wise.
pub fn merge_removing_nulls(target: &mut Map<String, Value>, changes: &mut Map<String, Value>) {
    changes.retain(|k, v| {
        if v.is_null() {
            target.remove(k);
            false
        } else {
            true
        }
    });
    for (k, v) in changes.iter_mut() {
        if let Value::Object(incoming) = v {
            if let Some(Value::Object(existing)) = target.get_mut(k) {
                merge_removing_nulls(existing, incoming);
                continue;
            }
            strip_nulls(incoming);
        }
        target.insert(k.clone(), v.clone());
    }
}

fn strip_nulls(map: &mut Map<String, Value>) {
    map.retain(|_, v| !v.is_null());
    for v in map.values_mut() {
        if let Value::Object(inner) = v {
            strip_nulls(inner);
        }
    }
}

/// Deep equality that treats numerically equal numbers as equal (`2 == 2.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Keep only the parts of `tree` whose paths also exist in `shape`.
///
/// Object-valued entries of `shape` that hold open mappings (empty objects in
/// the shape) accept any keys.
pub fn project(tree: &Value, shape: &Value) -> Value {
    match (tree, shape) {
        (Value::Object(t), Value::Object(s)) if !s.is_empty() => Value::Object(
            t.iter()
                .filter_map(|(k, v)| s.get(k).map(|sv| (k.clone(), project(v, sv))))
                .collect(),
        ),
        _ => tree.clone(),
    }
}

/// Render a value the way it appears in validation messages.
pub fn render(value: &Value) -> String {
    value.to_string()
}
