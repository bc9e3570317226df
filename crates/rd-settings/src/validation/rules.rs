//! Reusable rule combinators.
//!
//! Leaf rules only run when the proposed value differs from the current
//! one, so a rule that accepts its input reports `modified: true`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use super::{Rule, RuleContext, ValidationResult};
use crate::host::Os;
use crate::tree::{render, values_equal};

/// Wrap a closure as a [`Rule`].
pub fn rule<F>(f: F) -> Rule
where
    F: Fn(&RuleContext<'_>, &Value, &Value, &str) -> ValidationResult + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn invalid_value(path: &str, value: &Value) -> String {
    format!("Invalid value for \"{path}\": <{}>", render(value))
}

pub fn check_boolean() -> Rule {
    rule(|_, _, proposed, path| {
        if proposed.is_boolean() {
            ValidationResult::accepted(true)
        } else {
            ValidationResult::rejected(invalid_value(path, proposed))
        }
    })
}

pub fn check_string() -> Rule {
    rule(|_, _, proposed, path| {
        if proposed.is_string() {
            ValidationResult::accepted(true)
        } else {
            ValidationResult::rejected(invalid_value(path, proposed))
        }
    })
}

/// Accept numbers in `min..=max`.
pub fn check_number(min: f64, max: f64) -> Rule {
    rule(move |_, _, proposed, path| match proposed.as_f64() {
        Some(n) if (min..=max).contains(&n) => ValidationResult::accepted(true),
        _ => ValidationResult::rejected(format!(
            "{}; must be between {min} and {max}",
            invalid_value(path, proposed)
        )),
    })
}

/// Accept one of `values`. Anything else is a fatal error.
pub fn check_enum(values: &'static [&'static str]) -> Rule {
    rule(move |_, _, proposed, path| {
        if proposed.as_str().is_some_and(|s| values.contains(&s)) {
            ValidationResult::accepted(true)
        } else {
            ValidationResult::fatal(format!(
                "{}; must be one of {}",
                invalid_value(path, proposed),
                Value::from(values.to_vec())
            ))
        }
    })
}

/// The field can never be changed.
pub fn check_unchanged() -> Rule {
    rule(|_, _, _, path| {
        ValidationResult::rejected(format!(
            "Changing field \"{path}\" via the API isn't supported."
        ))
    })
}

/// Run `inner` only on the listed platforms; elsewhere the change is fatal.
pub fn check_platform(platforms: &'static [Os], inner: Rule) -> Rule {
    rule(move |ctx, current, proposed, path| {
        if platforms.contains(&ctx.host.os) {
            inner(ctx, current, proposed, path)
        } else {
            ValidationResult::fatal(format!(
                "Changing field \"{path}\" is not supported on {}.",
                ctx.host.os
            ))
        }
    })
}

/// Platforms that run the VM on macOS and Linux.
pub fn check_lima(inner: Rule) -> Rule {
    check_platform(&[Os::Darwin, Os::Linux], inner)
}

/// Run every rule and merge their results.
pub fn check_multi(rules: Vec<Rule>) -> Rule {
    rule(move |ctx, current, proposed, path| {
        let mut result = ValidationResult::default();
        for r in &rules {
            result.merge(r(ctx, current, proposed, path));
        }
        if !result.is_ok() {
            result.modified = false;
        }
        result
    })
}

/// A list of strings without duplicates.
pub fn check_unique_string_array() -> Rule {
    rule(|_, _, proposed, path| {
        let Some(list) = proposed
            .as_array()
            .and_then(|items| items.iter().map(Value::as_str).collect::<Option<Vec<_>>>())
        else {
            return ValidationResult::rejected(invalid_value(path, proposed));
        };
        let mut duplicates = find_duplicates(&list);
        if duplicates.is_empty() {
            return ValidationResult::accepted(true);
        }
        duplicates.sort_by(|a, b| collate(a, b));
        ValidationResult::rejected(format!(
            "field \"{path}\" has duplicate entries: \"{}\"",
            duplicates.join("\", \"")
        ))
    })
}

/// Entries that occur more than once, followed by whitespace-only entries.
///
/// Whitespace-only entries are all reported when there are several of them;
/// a single one is tolerated.
pub fn find_duplicates(list: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    let mut blanks: Vec<String> = Vec::new();
    for item in list {
        if item.trim().is_empty() {
            blanks.push(item.to_string());
        } else if !seen.insert(*item) && !duplicates.iter().any(|d| d.as_str() == *item) {
            duplicates.push(item.to_string());
        }
    }
    if blanks.len() > 1 {
        duplicates.extend(blanks);
    }
    duplicates
}

/// Case-insensitive ordering; strings differing only in case put lowercase first.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// An open mapping of names to booleans; `null` entries request removal.
pub fn check_boolean_mapping() -> Rule {
    check_mapping(Value::is_boolean)
}

/// An open mapping of names to strings; `null` entries request removal.
pub fn check_string_mapping() -> Rule {
    check_mapping(Value::is_string)
}

fn check_mapping(accepts: fn(&Value) -> bool) -> Rule {
    rule(move |_, current, proposed, path| {
        let Some(entries) = proposed.as_object() else {
            return ValidationResult::rejected(format!(
                "Proposed field \"{path}\" should be an object, but got <{}>.",
                render(proposed)
            ));
        };
        let mut result = ValidationResult::default();
        for (key, value) in entries {
            if !value.is_null() && !accepts(value) {
                result
                    .errors
                    .push(invalid_value(&format!("{path}.{key}"), value));
            }
        }
        if result.is_ok() {
            result.modified = !values_equal(current, proposed);
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostInfo;
    use serde_json::json;

    fn host(os: Os) -> HostInfo {
        HostInfo {
            os,
            arm64: false,
            under_translation: false,
            total_memory_gb: 8.0,
            cpu_count: 4,
        }
    }

    fn run(r: &Rule, os: Os, current: Value, proposed: Value) -> ValidationResult {
        let host = host(os);
        let merged = json!({});
        let ctx = RuleContext {
            merged: &merged,
            host: &host,
            kubernetes_versions: &[],
        };
        r(&ctx, &current, &proposed, "some.field")
    }

    #[test]
    fn duplicates_are_reported_once() {
        assert_eq!(find_duplicates(&["a", "b", "a"]), vec!["a"]);
        assert_eq!(find_duplicates(&["a", "a", "a"]), vec!["a"]);
    }

    #[test]
    fn whitespace_entries_are_duplicates_only_when_repeated() {
        assert_eq!(find_duplicates(&["a", " ", "b", "\t"]), vec![" ", "\t"]);
        assert!(find_duplicates(&["a", " ", "b"]).is_empty());
    }

    #[test]
    fn unique_array_rejects_duplicates_sorted() {
        let r = check_unique_string_array();
        let result = run(&r, Os::Linux, json!([]), json!(["b", "a", "b", "a"]));
        assert_eq!(
            result.errors,
            vec![r#"field "some.field" has duplicate entries: "a", "b""#]
        );
        assert!(!result.fatal);
    }

    #[test]
    fn duplicates_sort_lowercase_before_uppercase() {
        let r = check_unique_string_array();
        let result = run(&r, Os::Linux, json!([]), json!(["B", "A", "a", "b", "A", "a", "B", "b"]));
        assert_eq!(
            result.errors,
            vec![r#"field "some.field" has duplicate entries: "a", "A", "b", "B""#]
        );
    }

    #[test]
    fn unique_array_rejects_non_strings() {
        let r = check_unique_string_array();
        let result = run(&r, Os::Linux, json!([]), json!(["a", 1]));
        assert_eq!(result.errors, vec![r#"Invalid value for "some.field": <["a",1]>"#]);
    }

    #[test]
    fn enum_rejection_is_fatal() {
        let r = check_enum(&["one", "two"]);
        let result = run(&r, Os::Linux, json!("one"), json!("three"));
        assert!(result.fatal);
        assert_eq!(
            result.errors,
            vec![r#"Invalid value for "some.field": <"three">; must be one of ["one","two"]"#]
        );
    }

    #[test]
    fn number_range_is_inclusive() {
        let r = check_number(1.0, 4.0);
        assert!(run(&r, Os::Linux, json!(2), json!(4)).is_ok());
        let result = run(&r, Os::Linux, json!(2), json!(5));
        assert_eq!(
            result.errors,
            vec![r#"Invalid value for "some.field": <5>; must be between 1 and 4"#]
        );
        assert!(!result.fatal);
    }

    #[test]
    fn platform_rule_rejects_other_hosts() {
        let r = check_platform(&[Os::Windows], check_boolean());
        let result = run(&r, Os::Linux, json!(false), json!(true));
        assert!(result.fatal);
        assert!(run(&r, Os::Windows, json!(false), json!(true)).is_ok());
    }

    #[test]
    fn multi_collects_all_errors() {
        let r = check_multi(vec![check_boolean(), check_unchanged()]);
        let result = run(&r, Os::Linux, json!(false), json!("x"));
        assert_eq!(result.errors.len(), 2);
        assert!(!result.modified);
    }

    #[test]
    fn boolean_mapping_flags_non_booleans() {
        let r = check_boolean_mapping();
        let result = run(&r, Os::Linux, json!({}), json!({"a": true, "b": "yes", "c": null}));
        assert_eq!(result.errors, vec![r#"Invalid value for "some.field.b": <"yes">"#]);

        let result = run(&r, Os::Linux, json!({"a": true}), json!({"a": false}));
        assert!(result.modified);
        assert!(result.is_ok());
    }
}
