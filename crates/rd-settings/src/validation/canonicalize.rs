//! Pre-validation rewriting of proposed values into canonical form.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

use crate::tree::join;

/// A path and the rewrite applied to proposed values at that path.
pub(crate) type Synonym = (&'static str, fn(&mut Value));

pub(crate) const SETTINGS_SYNONYMS: &[Synonym] = &[
    ("containerEngine.name", canonicalize_container_engine),
    ("kubernetes.version", canonicalize_kubernetes_version),
];

static RE_K8S_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+\.\d+\.\d+)(?:\+k3s\d+)?$").unwrap());

fn canonicalize_container_engine(value: &mut Value) {
    if value.as_str() == Some("docker") {
        *value = Value::from("moby");
    }
}

fn canonicalize_kubernetes_version(value: &mut Value) {
    let Some(version) = value.as_str() else {
        return;
    };
    if let Some(bare) = RE_K8S_VERSION.captures(version).and_then(|c| c.get(1)) {
        *value = Value::from(bare.as_str());
    }
}

/// Walk `proposed` alongside `defaults`, applying synonyms and coercing
/// `"true"`/`"false"` and numeric strings where the default has that type.
pub(crate) fn canonicalize(proposed: &mut Value, defaults: &Value, synonyms: &[Synonym], prefix: &str) {
    let Value::Object(entries) = proposed else {
        return;
    };
    let absent = Value::Null;
    for (key, value) in entries.iter_mut() {
        let path = join(prefix, key);
        if let Some((_, rewrite)) = synonyms.iter().find(|(p, _)| *p == path) {
            rewrite(value);
            continue;
        }
        // Synonyms apply anywhere; coercion only where a default exists.
        let default = defaults.get(key.as_str()).unwrap_or(&absent);
        if value.is_object() {
            canonicalize(value, default, synonyms, &path);
            continue;
        }
        let coerced = match (default, value.as_str()) {
            (Value::Bool(_), Some("true")) => Some(Value::Bool(true)),
            (Value::Bool(_), Some("false")) => Some(Value::Bool(false)),
            (Value::Number(_), Some(s)) => parse_number(s).map(Value::Number),
            _ => None,
        };
        if let Some(coerced) = coerced {
            *value = coerced;
        }
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}
